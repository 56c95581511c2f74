use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::config::RetryPolicy;
use crate::message::{Body, BroadcastValue, NodeId};
use crate::transport::Transport;

/// Failed attempts after which a stuck delivery is reported at warn level
const WARN_AFTER_ATTEMPTS: u32 = 10;

/// Forwards newly observed values to neighbors until each one acknowledges
pub struct Gossip<T: Transport + ?Sized> {
    transport: Arc<T>,
    retry: RetryPolicy,
}

impl<T: Transport + ?Sized> Gossip<T> {
    pub fn new(transport: Arc<T>, retry: RetryPolicy) -> Self {
        Self { transport, retry }
    }

    /// Spawns one independent delivery loop per neighbor.
    ///
    /// Each handle resolves to the number of attempts it took to get an
    /// acknowledgment. Dropping the handles detaches the loops.
    pub fn propagate(
        &self,
        value: BroadcastValue,
        body: &Body,
        neighbors: &[NodeId],
    ) -> Vec<JoinHandle<u32>> {
        debug!("📢 Forwarding {} to {} neighbors", value, neighbors.len());

        neighbors
            .iter()
            .map(|neighbor| {
                let transport = Arc::clone(&self.transport);
                let dest = neighbor.clone();
                let body = body.clone();
                let retry = self.retry;
                tokio::spawn(async move { deliver(&*transport, &dest, value, body, retry).await })
            })
            .collect()
    }
}

async fn deliver<T: Transport + ?Sized>(
    transport: &T,
    dest: &str,
    value: BroadcastValue,
    body: Body,
    retry: RetryPolicy,
) -> u32 {
    let mut attempts = 0u32;
    loop {
        attempts = attempts.saturating_add(1);
        match transport.request(dest, body.clone()).await {
            Ok(_) => {
                trace!("✅ {} acknowledged {} after {} attempts", dest, value, attempts);
                return attempts;
            }
            Err(e) if attempts % WARN_AFTER_ATTEMPTS == 0 => {
                warn!("⚠️ Still forwarding {} to {} ({} attempts): {}", value, dest, attempts, e);
            }
            Err(e) => {
                debug!("Forwarding {} to {} failed: {}", value, dest, e);
            }
        }

        let delay = retry.delay(attempts);
        if delay.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(delay).await;
        }
    }
}
