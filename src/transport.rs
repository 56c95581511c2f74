use async_trait::async_trait;

use crate::error::{Result, RpcError};
use crate::message::Body;

/// Messaging primitives the node logic needs from its runtime
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Identifier assigned to this node, if the runtime has been initialized
    fn node_id(&self) -> Option<&str>;

    /// Fire-and-forget delivery of `body` to `dest`
    async fn send(&self, dest: &str, body: Body) -> Result<()>;

    /// Sends `body` to `dest` and waits for the matching reply.
    ///
    /// Error replies and missing replies are reported as [`RpcError`].
    async fn request(&self, dest: &str, body: Body) -> std::result::Result<Body, RpcError>;
}
