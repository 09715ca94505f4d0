// transport.rs — Newline-delimited JSON transport for the goal server.
//
// One JSON object per line in each direction. Requests are tagged by "op":
//   {"op":"send_goal","order":5}
//   {"op":"cancel_goal","goal_id":"<uuid>"}
//   {"op":"goal_status","goal_id":"<uuid>"}
// Replies are tagged by "type": goal_response, cancel_response, feedback,
// result, status, error.
//
// Replies for one goal keep their order: its goal_response comes first,
// then each feedback in step order, then its result. Replies for different
// goals interleave freely.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use uuid::Uuid;

use fc_goal::{GoalRequest, GoalStatus};
use fc_policy::CancelResponse;

use crate::error::ServerError;
use crate::handle::{GoalSubscription, GoalUpdate};
use crate::registry::{GoalServer, Submission};

/// A request line from the client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ClientRequest {
    SendGoal { order: u32 },
    CancelGoal { goal_id: Uuid },
    GoalStatus { goal_id: Uuid },
}

/// A reply line to the client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerReply {
    GoalResponse {
        order: u32,
        accepted: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        goal_id: Option<Uuid>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    CancelResponse {
        goal_id: Uuid,
        accepted: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    Feedback {
        goal_id: Uuid,
        partial_sequence: Vec<u64>,
    },
    Result {
        goal_id: Uuid,
        status: GoalStatus,
        sequence: Vec<u64>,
    },
    Status {
        goal_id: Uuid,
        status: GoalStatus,
    },
    Error {
        message: String,
    },
}

impl From<GoalUpdate> for ServerReply {
    fn from(update: GoalUpdate) -> Self {
        match update {
            GoalUpdate::Feedback(msg) => ServerReply::Feedback {
                goal_id: msg.goal_id,
                partial_sequence: msg.partial_sequence,
            },
            GoalUpdate::Result(msg) => ServerReply::Result {
                goal_id: msg.goal_id,
                status: msg.status,
                sequence: msg.sequence,
            },
        }
    }
}

/// Serve one client connection until its input ends.
///
/// After end of input, replies for goals already admitted keep flowing until
/// each of them has delivered its result (or been abandoned by shutdown).
pub async fn serve<R, W>(server: Arc<GoalServer>, reader: R, writer: W) -> Result<(), ServerError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (reply_tx, reply_rx) = mpsc::unbounded_channel::<ServerReply>();
    let writer_task = tokio::spawn(write_replies(writer, reply_rx));
    let mut forwarders = JoinSet::new();

    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let request = match serde_json::from_str::<ClientRequest>(line) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!("malformed request line: {}", e);
                send(&reply_tx, ServerReply::Error {
                    message: format!("malformed request: {}", e),
                });
                continue;
            }
        };

        if let Some(subscription) = dispatch(&server, request, &reply_tx) {
            forwarders.spawn(forward_updates(subscription, reply_tx.clone()));
        }
    }

    tracing::debug!(pending = forwarders.len(), "input closed, draining goal updates");
    while forwarders.join_next().await.is_some() {}
    drop(reply_tx);

    match writer_task.await {
        Ok(result) => result,
        Err(e) => Err(ServerError::Io(std::io::Error::other(e))),
    }
}

/// Handle one request, returning the subscription of a newly admitted goal.
fn dispatch(
    server: &GoalServer,
    request: ClientRequest,
    replies: &mpsc::UnboundedSender<ServerReply>,
) -> Option<GoalSubscription> {
    match request {
        ClientRequest::SendGoal { order } => match server.submit(GoalRequest::new(order)) {
            Ok(Submission::Accepted(subscription)) => {
                send(replies, ServerReply::GoalResponse {
                    order,
                    accepted: true,
                    goal_id: Some(subscription.goal_id()),
                    reason: None,
                });
                Some(subscription)
            }
            Ok(Submission::Rejected { reason }) => {
                send(replies, ServerReply::GoalResponse {
                    order,
                    accepted: false,
                    goal_id: None,
                    reason: Some(reason),
                });
                None
            }
            Err(e) => {
                send(replies, ServerReply::Error {
                    message: e.to_string(),
                });
                None
            }
        },
        ClientRequest::CancelGoal { goal_id } => {
            let reply = match server.cancel(goal_id) {
                Ok(CancelResponse::Accept) => ServerReply::CancelResponse {
                    goal_id,
                    accepted: true,
                    reason: None,
                },
                Ok(CancelResponse::Reject { reason }) => ServerReply::CancelResponse {
                    goal_id,
                    accepted: false,
                    reason: Some(reason),
                },
                Err(e) => ServerReply::Error {
                    message: e.to_string(),
                },
            };
            send(replies, reply);
            None
        }
        ClientRequest::GoalStatus { goal_id } => {
            let reply = match server.status(goal_id) {
                Ok(status) => ServerReply::Status { goal_id, status },
                Err(e) => ServerReply::Error {
                    message: e.to_string(),
                },
            };
            send(replies, reply);
            None
        }
    }
}

async fn forward_updates(
    mut subscription: GoalSubscription,
    replies: mpsc::UnboundedSender<ServerReply>,
) {
    while let Some(update) = subscription.next().await {
        send(&replies, update.into());
    }
}

async fn write_replies<W>(
    mut writer: W,
    mut replies: mpsc::UnboundedReceiver<ServerReply>,
) -> Result<(), ServerError>
where
    W: AsyncWrite + Unpin,
{
    while let Some(reply) = replies.recv().await {
        let mut line = serde_json::to_string(&reply)?;
        line.push('\n');
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
    }
    writer.shutdown().await?;
    Ok(())
}

fn send(replies: &mpsc::UnboundedSender<ServerReply>, reply: ServerReply) {
    // Only fails once the writer has died, which `serve` reports on its own.
    let _ = replies.send(reply);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_parse_from_wire_shape() {
        let request: ClientRequest = serde_json::from_str(r#"{"op":"send_goal","order":5}"#).unwrap();
        assert_eq!(request, ClientRequest::SendGoal { order: 5 });

        let id = Uuid::new_v4();
        let line = format!(r#"{{"op":"cancel_goal","goal_id":"{id}"}}"#);
        let request: ClientRequest = serde_json::from_str(&line).unwrap();
        assert_eq!(request, ClientRequest::CancelGoal { goal_id: id });
    }

    #[test]
    fn unknown_op_is_an_error() {
        assert!(serde_json::from_str::<ClientRequest>(r#"{"op":"launch","order":5}"#).is_err());
    }

    #[test]
    fn rejected_goal_response_omits_goal_id() {
        let reply = ServerReply::GoalResponse {
            order: 30,
            accepted: false,
            goal_id: None,
            reason: Some("too big".to_string()),
        };
        let json = serde_json::to_string(&reply).unwrap();
        assert!(json.contains("\"type\":\"goal_response\""));
        assert!(!json.contains("goal_id"));
    }

    #[test]
    fn result_reply_carries_status_and_sequence() {
        let id = Uuid::new_v4();
        let reply: ServerReply = GoalUpdate::Result(fc_goal::ResultMessage {
            goal_id: id,
            status: GoalStatus::Canceled,
            sequence: vec![0, 1, 1],
        })
        .into();
        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["type"], "result");
        assert_eq!(json["status"], "canceled");
        assert_eq!(json["sequence"], serde_json::json!([0, 1, 1]));
    }
}
