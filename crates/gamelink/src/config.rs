//! Cluster configuration consumed by [`Client`](crate::Client).
//!
//! A cluster file is plain JSON:
//!
//! ```json
//! {
//!   "name": "gate1",
//!   "cluster": { "gate1": "10.0.0.1:9000", "game1": "10.0.0.2:9000" },
//!   "services": [["1001", "Login", "gate1"], ["2001", "Bag.Add", "game1"]],
//!   "dial": { "connect_timeout_ms": 1000, "compression": "zstd" },
//!   "call_timeout_ms": 5000
//! }
//! ```
//!
//! Only `name` is required. Loading the file is left to the host process; this
//! crate only defines the shape.

use crate::{registry::ServiceEntry, transport::grpc::DialOptions};
use core::time::Duration;
use gamelink_core::types::DEFAULT_CALL_TIMEOUT;
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClusterConfig {
    /// Name of the local process within the cluster.
    pub name: String,
    /// Node name to dialable address.
    #[serde(default)]
    pub cluster: HashMap<String, String>,
    #[serde(default)]
    pub services: Vec<ServiceEntry>,
    #[serde(default)]
    pub dial: DialOptions,
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,
}

const fn default_call_timeout_ms() -> u64 {
    DEFAULT_CALL_TIMEOUT.as_millis() as u64
}

impl ClusterConfig {
    /// A config with no nodes or services and default timeouts.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cluster: HashMap::new(),
            services: Vec::new(),
            dial: DialOptions::default(),
            call_timeout_ms: default_call_timeout_ms(),
        }
    }

    #[must_use]
    pub fn with_node(mut self, node: impl Into<String>, addr: impl Into<String>) -> Self {
        self.cluster.insert(node.into(), addr.into());
        self
    }

    #[must_use]
    pub fn with_service(mut self, entry: ServiceEntry) -> Self {
        self.services.push(entry);
        self
    }

    /// Sets the unary call timeout, saturating at `u64::MAX` milliseconds.
    #[must_use]
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub const fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }
}
