use async_trait::async_trait;
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, error, info, trace, warn};

use crate::config::NodeConfig;
use crate::error::{NodeError, Result, RpcError};
use crate::handlers::Node;
use crate::message::{Body, ErrorCode, Message, NodeId, Request};
use crate::transport::Transport;

/// Inbound messages waiting for the dispatch task
const INBOUND_QUEUE_CAPACITY: usize = 1000;

type Output = Box<dyn AsyncWrite + Send + Unpin>;

/// Line-delimited JSON transport plus request/reply correlation
pub struct Runtime {
    node_id: OnceCell<NodeId>,
    next_msg_id: AtomicU64,
    pending: Mutex<HashMap<u64, oneshot::Sender<Body>>>,
    output: Mutex<Output>,
    rpc_timeout: Duration,
}

impl Runtime {
    pub fn new<W>(output: W, rpc_timeout: Duration) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            node_id: OnceCell::new(),
            next_msg_id: AtomicU64::new(0),
            pending: Mutex::new(HashMap::new()),
            output: Mutex::new(Box::new(output)),
            rpc_timeout,
        }
    }

    /// Answers `request` with `body`, correlating it through `in_reply_to`
    pub async fn reply(&self, request: &Message, mut body: Body) -> Result<()> {
        body.in_reply_to = request.body.msg_id;
        self.send(&request.src, body).await
    }

    fn next_msg_id(&self) -> u64 {
        self.next_msg_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    async fn write(&self, message: &Message) -> Result<()> {
        let mut line = serde_json::to_vec(message)?;
        line.push(b'\n');

        let mut output = self.output.lock().await;
        output.write_all(&line).await?;
        output.flush().await?;
        trace!("Sent {} to {}", message.body.kind, message.dest);
        Ok(())
    }

    /// Completes pending requests, answers `init` and queues everything else
    async fn route(&self, message: Message, queue: &mpsc::Sender<Message>) -> Result<()> {
        if let Some(in_reply_to) = message.body.in_reply_to {
            match self.pending.lock().await.remove(&in_reply_to) {
                Some(waiter) => {
                    let _ = waiter.send(message.body);
                }
                None => debug!("📝 Dropping unmatched reply {} from {}", in_reply_to, message.src),
            }
            return Ok(());
        }

        if message.body.kind == "init" {
            return self.init(&message).await;
        }

        queue
            .send(message)
            .await
            .map_err(|_| NodeError::TransportClosed)
    }

    async fn init(&self, message: &Message) -> Result<()> {
        match Request::decode(&message.body) {
            Ok(Request::Init { node_id, node_ids }) => {
                if self.node_id.set(node_id.clone()).is_err() {
                    warn!("⚠️ Ignoring second init naming {}", node_id);
                } else {
                    info!("✅ Initialized as {} in a cluster of {}", node_id, node_ids.len());
                }
                self.reply(message, Body::new("init_ok")).await
            }
            Ok(_) => Ok(()),
            Err(e) => {
                error!("❌ Rejected init from {}: {}", message.src, e);
                Ok(())
            }
        }
    }
}

#[async_trait]
impl Transport for Runtime {
    fn node_id(&self) -> Option<&str> {
        self.node_id.get().map(String::as_str)
    }

    async fn send(&self, dest: &str, body: Body) -> Result<()> {
        let message = Message {
            src: self.node_id().unwrap_or_default().to_string(),
            dest: dest.to_string(),
            body,
        };
        self.write(&message).await
    }

    async fn request(&self, dest: &str, mut body: Body) -> std::result::Result<Body, RpcError> {
        let msg_id = self.next_msg_id();
        body.msg_id = Some(msg_id);
        body.in_reply_to = None;

        let (waiter, reply) = oneshot::channel();
        self.pending.lock().await.insert(msg_id, waiter);

        if let Err(e) = self.send(dest, body).await {
            self.pending.lock().await.remove(&msg_id);
            warn!("⚠️ Failed to send request to {}: {}", dest, e);
            return Err(RpcError::Closed(dest.to_string()));
        }

        let reply = match tokio::time::timeout(self.rpc_timeout, reply).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => return Err(RpcError::Closed(dest.to_string())),
            Err(_) => {
                self.pending.lock().await.remove(&msg_id);
                return Err(RpcError::Timeout(dest.to_string()));
            }
        };

        if reply.is_error() {
            return Err(RpcError::Remote {
                dest: dest.to_string(),
                code: reply.error_code().unwrap_or(ErrorCode::Crash.as_u64()),
                text: reply.error_text(),
            });
        }
        Ok(reply)
    }
}

/// Serves the node protocol until `input` reaches end of stream.
///
/// Returns an error only for failures that must stop the process.
pub async fn run_node<R, W>(config: NodeConfig, input: R, output: W) -> Result<()>
where
    R: AsyncRead + Send + Unpin + 'static,
    W: AsyncWrite + Send + Unpin + 'static,
{
    let runtime = Arc::new(Runtime::new(output, config.rpc_timeout));
    let node = Node::new(Arc::clone(&runtime), config.retry);

    let (queue_sender, queue_receiver) = mpsc::channel::<Message>(INBOUND_QUEUE_CAPACITY);
    let mut dispatcher = tokio::spawn(dispatch(node, Arc::clone(&runtime), queue_receiver));

    let mut input = BufReader::new(input);
    let mut buf = Vec::new();
    loop {
        tokio::select! {
            read = input.read_until(b'\n', &mut buf) => {
                if read? == 0 {
                    break;
                }
                let line = std::mem::take(&mut buf);
                if line.iter().all(u8::is_ascii_whitespace) {
                    continue;
                }

                // Undecodable input, including invalid UTF-8, costs only this line
                let message = match serde_json::from_slice::<Message>(&line) {
                    Ok(message) => message,
                    Err(e) => {
                        error!(
                            "❌ Failed to decode message {:?}: {}",
                            String::from_utf8_lossy(&line),
                            e
                        );
                        continue;
                    }
                };

                if let Err(e) = runtime.route(message, &queue_sender).await {
                    return match dispatcher.await? {
                        Err(inner) => Err(inner),
                        Ok(()) => Err(e),
                    };
                }
            }
            result = &mut dispatcher => {
                return match result? {
                    Err(e) => Err(e),
                    Ok(()) => Err(NodeError::TransportClosed),
                };
            }
        }
    }

    debug!("💡 Input closed, draining queued messages");
    drop(queue_sender);
    dispatcher.await?
}

/// Runs handlers one message at a time; the only writer of node state
async fn dispatch(
    mut node: Node<Runtime>,
    runtime: Arc<Runtime>,
    mut queue: mpsc::Receiver<Message>,
) -> Result<()> {
    while let Some(message) = queue.recv().await {
        trace!("Handling {} from {}", message.body.kind, message.src);
        match node.handle(&message) {
            Ok(reply) => runtime.reply(&message, reply).await?,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                error!("❌ Failed to handle {} from {}: {}", message.body.kind, message.src, e);
                if let Some(code) = e.reply_code() {
                    runtime.reply(&message, Body::error(code, e.to_string())).await?;
                }
            }
        }
    }
    Ok(())
}
