use anyhow::Result;
use clap::Parser;
use std::time::Duration;
use tracing::{error, info};

use weavecast::config::{
    NodeConfig, RetryPolicy, DEFAULT_INITIAL_BACKOFF, DEFAULT_MAX_BACKOFF, DEFAULT_RPC_TIMEOUT,
};
use weavecast::run_node;
use weavecast::utils::logging::init_logging;

#[derive(Parser)]
#[command(version, about = "Broadcast node speaking JSON over stdin/stdout", long_about = None)]
struct Args {
    /// Milliseconds to wait for a peer's reply
    #[arg(long, default_value_t = DEFAULT_RPC_TIMEOUT.as_millis() as u64)]
    rpc_timeout_ms: u64,
    /// Delay after the first failed forwarding attempt
    #[arg(long, default_value_t = DEFAULT_INITIAL_BACKOFF.as_millis() as u64)]
    retry_initial_ms: u64,
    /// Cap on the delay between forwarding attempts
    #[arg(long, default_value_t = DEFAULT_MAX_BACKOFF.as_millis() as u64)]
    retry_max_ms: u64,
    /// Use fixed exponential delays
    #[arg(long)]
    no_jitter: bool,
    /// Re-issue failed forwards immediately
    #[arg(long, conflicts_with_all = ["retry_initial_ms", "retry_max_ms", "no_jitter"])]
    no_backoff: bool,
    /// tracing filter directives
    #[arg(long, default_value = "info")]
    log_filter: String,
    /// Colorize log output
    #[arg(long)]
    color: bool,
}

impl Args {
    fn node_config(&self) -> NodeConfig {
        let retry = if self.no_backoff {
            RetryPolicy::immediate()
        } else {
            RetryPolicy::new(
                Duration::from_millis(self.retry_initial_ms),
                Duration::from_millis(self.retry_max_ms),
                !self.no_jitter,
            )
        };
        NodeConfig::new(Duration::from_millis(self.rpc_timeout_ms), retry)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_filter, args.color);

    let config = args.node_config();
    info!("💡 Starting node with {:?}", config);

    if let Err(e) = run_node(config, tokio::io::stdin(), tokio::io::stdout()).await {
        error!("❌ Node stopped: {}", e);
        std::process::exit(1);
    }

    info!("✅ Input closed, shutting down");
    Ok(())
}
