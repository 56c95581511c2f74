use anyhow::{anyhow, Result};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines};
use tokio::task::JoinHandle;
use tracing::info;

use weavecast::utils::logging::init_logging;
use weavecast::{run_node, NodeConfig, NodeError};

/// How long to wait for a node to emit its next line
const RECV_TIMEOUT: Duration = Duration::from_secs(5);
const PIPE_CAPACITY: usize = 64 * 1024;

/// A node running in-process, driven through in-memory pipes
pub struct TestNode {
    pub id: String,
    input: DuplexStream,
    output: Lines<BufReader<DuplexStream>>,
    pub handle: JoinHandle<Result<(), NodeError>>,
}

/// Spawns a node and completes the init handshake as `id`
pub async fn create_test_node(id: &str, node_ids: &[&str], config: NodeConfig) -> Result<TestNode> {
    init_logging("info,weavecast=debug", false);
    info!("Creating {} with config {:?}", id, config);

    let (input, node_input) = tokio::io::duplex(PIPE_CAPACITY);
    let (node_output, output) = tokio::io::duplex(PIPE_CAPACITY);
    let handle = tokio::spawn(run_node(config, node_input, node_output));

    let mut node = TestNode {
        id: id.to_string(),
        input,
        output: BufReader::new(output).lines(),
        handle,
    };

    node.send(
        "c0",
        json!({"type": "init", "msg_id": 1, "node_id": id, "node_ids": node_ids}),
    )
    .await?;
    let reply = node.recv().await?;
    if reply["body"] != json!({"type": "init_ok", "in_reply_to": 1}) {
        return Err(anyhow!("Unexpected init reply: {}", reply));
    }

    Ok(node)
}

impl TestNode {
    /// Delivers one message from `src` to this node
    pub async fn send(&mut self, src: &str, body: Value) -> Result<()> {
        let message = json!({"src": src, "dest": self.id, "body": body});
        self.send_line(&message.to_string()).await
    }

    pub async fn send_line(&mut self, line: &str) -> Result<()> {
        self.send_bytes(line.as_bytes()).await
    }

    /// Writes arbitrary bytes followed by a newline, valid UTF-8 or not
    pub async fn send_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.input.write_all(bytes).await?;
        self.input.write_all(b"\n").await?;
        self.input.flush().await?;
        Ok(())
    }

    /// Next message the node writes, as a JSON envelope
    pub async fn recv(&mut self) -> Result<Value> {
        let line = tokio::time::timeout(RECV_TIMEOUT, self.output.next_line())
            .await
            .map_err(|_| anyhow!("Timeout waiting for output from {}", self.id))??
            .ok_or_else(|| anyhow!("{} closed its output", self.id))?;
        Ok(serde_json::from_str(&line)?)
    }

    /// Collects the next `count` messages in the order they were written
    pub async fn recv_many(&mut self, count: usize) -> Result<Vec<Value>> {
        let mut messages = Vec::with_capacity(count);
        for _ in 0..count {
            messages.push(self.recv().await?);
        }
        Ok(messages)
    }

    /// True if the node writes nothing for `quiet_for`
    pub async fn stays_quiet(&mut self, quiet_for: Duration) -> bool {
        match tokio::time::timeout(quiet_for, self.output.next_line()).await {
            Err(_) => true,
            Ok(line) => {
                info!("Unexpected output from {}: {:?}", self.id, line);
                false
            }
        }
    }

    /// Acknowledges a forwarded request on behalf of its destination
    pub async fn ack(&mut self, request: &Value) -> Result<()> {
        let dest = request["dest"].as_str().unwrap_or_default().to_string();
        let body = json!({"type": "broadcast_ok", "in_reply_to": request["body"]["msg_id"]});
        self.send(&dest, body).await
    }

    /// Answers a forwarded request with an error on behalf of its destination
    pub async fn fail(&mut self, request: &Value, code: u64) -> Result<()> {
        let dest = request["dest"].as_str().unwrap_or_default().to_string();
        let body = json!({
            "type": "error",
            "in_reply_to": request["body"]["msg_id"],
            "code": code,
            "text": "not now"
        });
        self.send(&dest, body).await
    }

    /// Closes the node's input and waits for it to stop
    pub async fn shutdown(self) -> Result<Result<(), NodeError>> {
        drop(self.input);
        Ok(tokio::time::timeout(RECV_TIMEOUT, self.handle).await??)
    }
}

/// Splits node output into replies to `client` and requests to other nodes
pub fn partition<'a>(messages: &'a [Value], client: &str) -> (Vec<&'a Value>, Vec<&'a Value>) {
    messages.iter().partition(|message| message["dest"] == client)
}
