use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;
use crate::StoreTlsConfig;

/// Allocation store (etcd v3) connection settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StoreConfig {
    /// `host:port` pairs, tried in order at startup
    #[serde(default = "default_endpoints")]
    pub endpoints: Vec<String>,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_in_ms: u64,

    /// Deadline for range reads; watch streams are not bounded
    #[serde(default = "default_request_timeout")]
    pub request_timeout_in_ms: u64,

    #[serde(default = "default_tcp_keepalive")]
    pub tcp_keepalive_in_secs: u64,

    /// HTTP2 ping interval, keeps idle watch streams alive
    #[serde(default = "default_h2_keepalive_interval")]
    pub http2_keep_alive_interval_in_secs: u64,

    /// Client TLS, enabled when present
    #[serde(default)]
    pub tls: Option<StoreTlsConfig>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            endpoints: default_endpoints(),
            connect_timeout_in_ms: default_connect_timeout(),
            request_timeout_in_ms: default_request_timeout(),
            tcp_keepalive_in_secs: default_tcp_keepalive(),
            http2_keep_alive_interval_in_secs: default_h2_keepalive_interval(),
            tls: None,
        }
    }
}

impl StoreConfig {
    pub fn validate(&self) -> Result<()> {
        if self.endpoints.is_empty() {
            return Err(Error::InvalidConfig(
                "store.endpoints must contain at least one endpoint".into(),
            ));
        }
        if let Some(blank) = self.endpoints.iter().position(|e| e.trim().is_empty()) {
            return Err(Error::InvalidConfig(format!("store.endpoints[{blank}] is empty")));
        }
        if self.connect_timeout_in_ms == 0 {
            return Err(Error::InvalidConfig("store.connect_timeout_in_ms must be > 0".into()));
        }
        if self.request_timeout_in_ms == 0 {
            return Err(Error::InvalidConfig("store.request_timeout_in_ms must be > 0".into()));
        }
        if let Some(tls) = &self.tls {
            tls.validate()?;
        }
        Ok(())
    }
}

fn default_endpoints() -> Vec<String> {
    vec!["127.0.0.1:2379".into()]
}
fn default_connect_timeout() -> u64 {
    5000
}
fn default_request_timeout() -> u64 {
    3000
}
fn default_tcp_keepalive() -> u64 {
    300
}
fn default_h2_keepalive_interval() -> u64 {
    30
}
