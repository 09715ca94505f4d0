// transport_flow.rs — JSON-lines transport driven through an in-memory pipe.
//
// The client side writes request lines into one end of a duplex stream and
// reads reply lines from another, exactly as the daemon's stdio would.

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines};

use fc_server::transport::serve;
use fc_server::{GoalServer, ServerConfig, ServerError};

struct Client {
    requests: DuplexStream,
    replies: Lines<BufReader<DuplexStream>>,
    server_task: tokio::task::JoinHandle<Result<(), ServerError>>,
}

impl Client {
    fn start(server: Arc<GoalServer>) -> Self {
        let (requests, server_in) = tokio::io::duplex(4096);
        let (server_out, replies) = tokio::io::duplex(4096);
        let server_task = tokio::spawn(serve(server, BufReader::new(server_in), server_out));
        Self {
            requests,
            replies: BufReader::new(replies).lines(),
            server_task,
        }
    }

    async fn send(&mut self, request: Value) {
        let mut line = request.to_string();
        line.push('\n');
        self.requests.write_all(line.as_bytes()).await.unwrap();
    }

    async fn send_raw(&mut self, line: &str) {
        self.requests.write_all(line.as_bytes()).await.unwrap();
    }

    async fn recv(&mut self) -> Value {
        let line = self.replies.next_line().await.unwrap().expect("reply stream closed");
        serde_json::from_str(&line).unwrap()
    }

    async fn finish(mut self) -> Vec<Value> {
        self.requests.shutdown().await.unwrap();
        drop(self.requests);
        let mut rest = Vec::new();
        while let Some(line) = self.replies.next_line().await.unwrap() {
            rest.push(serde_json::from_str(&line).unwrap());
        }
        self.server_task.await.unwrap().unwrap();
        rest
    }
}

fn fast_server() -> Arc<GoalServer> {
    let config = ServerConfig {
        step_interval_ms: 100,
        ..ServerConfig::default()
    };
    Arc::new(GoalServer::new(&config).unwrap())
}

#[tokio::test(start_paused = true)]
async fn goal_round_trip_over_json_lines() {
    let mut client = Client::start(fast_server());
    client.send(json!({"op": "send_goal", "order": 5})).await;

    let response = client.recv().await;
    assert_eq!(response["type"], "goal_response");
    assert_eq!(response["accepted"], true);
    let goal_id = response["goal_id"].as_str().unwrap().to_string();

    let rest = client.finish().await;
    let sequences: Vec<&Value> = rest
        .iter()
        .filter(|r| r["type"] == "feedback")
        .map(|r| &r["partial_sequence"])
        .collect();
    assert_eq!(
        sequences,
        vec![&json!([0, 1, 1]), &json!([0, 1, 1, 2]), &json!([0, 1, 1, 2, 3])]
    );

    let last = rest.last().unwrap();
    assert_eq!(last["type"], "result");
    assert_eq!(last["goal_id"], goal_id.as_str());
    assert_eq!(last["status"], "succeeded");
    assert_eq!(last["sequence"], json!([0, 1, 1, 2, 3]));
}

#[tokio::test(start_paused = true)]
async fn rejection_and_bad_input_get_replies() {
    let mut client = Client::start(fast_server());

    client.send(json!({"op": "send_goal", "order": 21})).await;
    let response = client.recv().await;
    assert_eq!(response["type"], "goal_response");
    assert_eq!(response["accepted"], false);
    assert!(response.get("goal_id").is_none());

    client.send_raw("this is not json\n").await;
    assert_eq!(client.recv().await["type"], "error");

    client
        .send(json!({"op": "cancel_goal", "goal_id": "00000000-0000-0000-0000-000000000000"}))
        .await;
    let reply = client.recv().await;
    assert_eq!(reply["type"], "error");
    assert!(reply["message"].as_str().unwrap().contains("not found"));

    assert!(client.finish().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn cancel_and_status_over_the_wire() {
    let mut client = Client::start(fast_server());
    client.send(json!({"op": "send_goal", "order": 14})).await;
    let goal_id = client.recv().await["goal_id"].as_str().unwrap().to_string();

    assert_eq!(client.recv().await["type"], "feedback");
    client
        .send(json!({"op": "goal_status", "goal_id": goal_id}))
        .await;
    let status = client.recv().await;
    assert_eq!(status["type"], "status");
    assert_eq!(status["status"], "executing");

    client
        .send(json!({"op": "cancel_goal", "goal_id": goal_id}))
        .await;
    let cancel = client.recv().await;
    assert_eq!(cancel["type"], "cancel_response");
    assert_eq!(cancel["accepted"], true);

    let rest = client.finish().await;
    assert_eq!(rest.len(), 1);
    assert_eq!(rest[0]["type"], "result");
    assert_eq!(rest[0]["status"], "canceled");
    assert_eq!(rest[0]["sequence"], json!([0, 1, 1]));
}
