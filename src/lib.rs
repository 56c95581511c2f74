//! A broadcast node for a simulated cluster.
//!
//! The node speaks newline-delimited JSON on stdin/stdout, answers `echo`,
//! `generate`, `broadcast`, `read` and `topology` requests, and gossips every
//! newly observed broadcast value to its neighbors until each acknowledges it.

pub mod config;
pub mod error;
pub mod gossip;
pub mod handlers;
pub mod message;
pub mod runtime;
pub mod state;
pub mod transport;
pub mod utils;

#[cfg(test)]
mod testing;

pub use config::{NodeConfig, RetryPolicy};
pub use error::{NodeError, RpcError};
pub use handlers::Node;
pub use message::{Body, Message};
pub use runtime::{run_node, Runtime};
pub use transport::Transport;
