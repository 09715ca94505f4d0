// error.rs — Error types for the admission policy.

use thiserror::Error;

/// Errors that can occur while building an admission policy.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// The largest admissible order would overflow the sequence type.
    #[error("max_order {max_order} exceeds the representable limit {limit}")]
    OrderLimitTooLarge { max_order: u32, limit: u32 },

    /// No admissible goal could ever be canceled, which is almost certainly a typo.
    #[error(
        "min_cancelable_order {min_cancelable_order} is above max_order {max_order} + 1"
    )]
    CancelThresholdUnreachable {
        min_cancelable_order: u32,
        max_order: u32,
    },
}
