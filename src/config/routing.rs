use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Routing daemon (GoBGP api) connection settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RoutingConfig {
    /// GoBGP gRPC api address
    #[serde(default = "default_target")]
    pub target: String,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_in_ms: u64,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_in_ms: u64,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            target: default_target(),
            connect_timeout_in_ms: default_connect_timeout(),
            request_timeout_in_ms: default_request_timeout(),
        }
    }
}

impl RoutingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.target.trim().is_empty() {
            return Err(Error::InvalidConfig("routing.target cannot be empty".into()));
        }
        if self.connect_timeout_in_ms == 0 || self.request_timeout_in_ms == 0 {
            return Err(Error::InvalidConfig("routing timeouts must be > 0".into()));
        }
        Ok(())
    }
}

fn default_target() -> String {
    "127.0.0.1:50051".into()
}
fn default_connect_timeout() -> u64 {
    3000
}
fn default_request_timeout() -> u64 {
    3000
}
