use rand::Rng;
use std::time::Duration;

/// Default time to wait for a peer's reply before the request counts as failed
pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_millis(1000);
/// Delay after the first failed forwarding attempt
pub const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_millis(50);
/// Upper bound for the delay between forwarding attempts
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_millis(2000);

/// Configuration for a broadcast node
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// How long a request waits for its reply
    pub rpc_timeout: Duration,
    /// Delay schedule between gossip retries
    pub retry: RetryPolicy,
}

impl NodeConfig {
    pub fn new(rpc_timeout: Duration, retry: RetryPolicy) -> Self {
        Self { rpc_timeout, retry }
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            rpc_timeout: DEFAULT_RPC_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }
}

/// Delay schedule for re-issuing a failed forwarding request.
///
/// The number of attempts is never capped; only the spacing between them is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub jitter: bool,
}

impl RetryPolicy {
    pub fn new(initial_backoff: Duration, max_backoff: Duration, jitter: bool) -> Self {
        Self {
            initial_backoff,
            max_backoff: max_backoff.max(initial_backoff),
            jitter,
        }
    }

    /// Re-issue failed requests straight away
    pub fn immediate() -> Self {
        Self {
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            jitter: false,
        }
    }

    pub fn is_immediate(&self) -> bool {
        self.initial_backoff.is_zero()
    }

    /// Delay to wait after `failures` consecutive failed attempts (1-based)
    pub fn delay(&self, failures: u32) -> Duration {
        if self.is_immediate() {
            return Duration::ZERO;
        }

        let exponent = failures.saturating_sub(1).min(31);
        let delay = self
            .initial_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff);

        if self.jitter {
            let millis = delay.as_millis() as u64;
            let jittered = rand::rng().random_range(millis / 2..=millis);
            Duration::from_millis(jittered)
        } else {
            delay
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_INITIAL_BACKOFF, DEFAULT_MAX_BACKOFF, true)
    }
}
