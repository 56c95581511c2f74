//! In-memory transport used by unit tests

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{Result, RpcError};
use crate::message::{Body, ErrorCode};
use crate::transport::Transport;

/// Records every request and answers it from a script
pub struct ScriptedTransport {
    node_id: String,
    failures: Mutex<HashMap<String, u32>>,
    requests: Mutex<Vec<(String, Body)>>,
}

impl ScriptedTransport {
    pub fn new(node_id: &str) -> Self {
        Self {
            node_id: node_id.to_string(),
            failures: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Makes the next `count` requests to `dest` come back as errors
    pub fn fail_next(&self, dest: &str, count: u32) {
        self.failures.lock().unwrap().insert(dest.to_string(), count);
    }

    pub fn requests_to(&self, dest: &str) -> Vec<Body> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|(to, _)| to == dest)
            .map(|(_, body)| body.clone())
            .collect()
    }

    pub fn request_dests(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|(to, _)| to.clone())
            .collect()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    fn node_id(&self) -> Option<&str> {
        Some(&self.node_id)
    }

    async fn send(&self, _dest: &str, _body: Body) -> Result<()> {
        Ok(())
    }

    async fn request(&self, dest: &str, body: Body) -> std::result::Result<Body, RpcError> {
        let reply = body.with_kind(format!("{}_ok", body.kind));
        self.requests.lock().unwrap().push((dest.to_string(), body));

        let mut failures = self.failures.lock().unwrap();
        match failures.get_mut(dest) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                Err(RpcError::Remote {
                    dest: dest.to_string(),
                    code: ErrorCode::TemporarilyUnavailable.as_u64(),
                    text: "scripted failure".to_string(),
                })
            }
            _ => Ok(reply),
        }
    }
}
