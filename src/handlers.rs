use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::RetryPolicy;
use crate::error::{NodeError, Result};
use crate::gossip::Gossip;
use crate::message::{Body, BroadcastValue, Message, NodeId, Request};
use crate::state::NodeState;
use crate::transport::Transport;

/// Message handlers together with the state they mutate
pub struct Node<T: Transport + ?Sized> {
    transport: Arc<T>,
    state: NodeState,
    gossip: Gossip<T>,
}

impl<T: Transport + ?Sized> Node<T> {
    pub fn new(transport: Arc<T>, retry: RetryPolicy) -> Self {
        let gossip = Gossip::new(Arc::clone(&transport), retry);
        Self {
            transport,
            state: NodeState::new(),
            gossip,
        }
    }

    pub fn state(&self) -> &NodeState {
        &self.state
    }

    /// Handles one inbound message and returns the body to reply with
    pub fn handle(&mut self, message: &Message) -> Result<Body> {
        let body = &message.body;
        match Request::decode(body)? {
            Request::Echo => Ok(body.with_kind("echo_ok")),
            Request::Generate => Ok(self.generate(body)),
            Request::Broadcast { message: value } => Ok(self.broadcast(body, value)),
            Request::Read => Ok(self.read(body)),
            Request::Topology { mut topology } => {
                let neighbors = match self.transport.node_id() {
                    Some(id) => topology.remove(id),
                    None => None,
                };
                Ok(self.topology(body, neighbors))
            }
            Request::Init { .. } => Err(NodeError::MalformedRequest(
                "init must be handled by the runtime".to_string(),
            )),
        }
    }

    fn generate(&self, body: &Body) -> Body {
        let mut reply = body.with_kind("generate_ok");
        reply.insert("id", Uuid::new_v4().to_string());
        reply
    }

    fn broadcast(&mut self, body: &Body, value: BroadcastValue) -> Body {
        if self.state.observe(value) {
            debug!("📨 New value {}", value);
            // Dropping the handles detaches delivery; it continues after we reply
            drop(self.gossip.propagate(value, body, self.state.neighbors()));
        } else {
            debug!("📝 Already seen {}", value);
        }

        let mut reply = body.with_kind("broadcast_ok");
        reply.remove("message");
        reply
    }

    fn read(&self, body: &Body) -> Body {
        let mut reply = body.with_kind("read_ok");
        reply.insert("messages", self.state.snapshot_values());
        reply
    }

    fn topology(&mut self, body: &Body, neighbors: Option<Vec<NodeId>>) -> Body {
        match neighbors {
            Some(neighbors) => {
                info!("💡 Neighbors: {:?}", neighbors);
                self.state.set_neighbors(neighbors);
            }
            None => {
                warn!(
                    "⚠️ Topology has no entry for {}, clearing neighbors",
                    self.transport.node_id().unwrap_or("<uninitialized>")
                );
                self.state.set_neighbors(Vec::new());
            }
        }

        let mut reply = body.with_kind("topology_ok");
        reply.remove("topology");
        reply
    }
}
