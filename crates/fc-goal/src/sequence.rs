// sequence.rs — Step-at-a-time Fibonacci computation.
//
// The executor never asks for "the whole sequence". It seeds the state and
// then calls `advance()` once per step, so it can check for cancellation and
// publish feedback between steps.

use serde::{Deserialize, Serialize};

/// The seed every computation starts from.
pub const SEED: [u64; 2] = [0, 1];

/// Largest order whose last element still fits in a `u64`.
pub const MAX_REPRESENTABLE_ORDER: u32 = 94;

/// A Fibonacci sequence under construction, targeting a given order.
///
/// The finished sequence has `order` elements, except that orders below two
/// still produce the two-element seed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FibonacciSequence {
    order: u32,
    values: Vec<u64>,
}

impl FibonacciSequence {
    /// Seed a new sequence targeting `order`.
    pub fn seeded(order: u32) -> Self {
        let mut values = Vec::with_capacity((order as usize).max(SEED.len()));
        values.extend_from_slice(&SEED);
        Self { order, values }
    }

    /// Number of `advance()` calls needed to finish.
    pub fn total_steps(order: u32) -> usize {
        (order as usize).saturating_sub(SEED.len())
    }

    /// Whether the target length has been reached.
    pub fn is_complete(&self) -> bool {
        self.values.len() >= self.order as usize
    }

    /// Number of elements appended beyond the seed.
    pub fn steps_taken(&self) -> usize {
        self.values.len() - SEED.len()
    }

    /// Append the next element and return it, or `None` once complete.
    ///
    /// Returns `None` as well if the next element would overflow a `u64`,
    /// which cannot happen for orders up to [`MAX_REPRESENTABLE_ORDER`].
    pub fn advance(&mut self) -> Option<u64> {
        if self.is_complete() {
            return None;
        }
        let n = self.values.len();
        let next = self.values[n - 1].checked_add(self.values[n - 2])?;
        self.values.push(next);
        Some(next)
    }

    pub fn as_slice(&self) -> &[u64] {
        &self.values
    }

    pub fn into_vec(self) -> Vec<u64> {
        self.values
    }
}
