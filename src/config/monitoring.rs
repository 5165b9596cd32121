use serde::Deserialize;
use serde::Serialize;
use tracing::warn;

use crate::Error;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MonitoringConfig {
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,

    /// Serves `/metrics` and `/v1/gitinfo`
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: default_metrics_enabled(),
            metrics_port: default_metrics_port(),
        }
    }
}

impl MonitoringConfig {
    /// Validates monitoring configuration
    /// # Errors
    /// Returns `Error::InvalidConfig` when the exporter is enabled on port 0
    pub fn validate(&self) -> Result<()> {
        if self.metrics_enabled {
            if self.metrics_port == 0 {
                return Err(Error::InvalidConfig("metrics_port cannot be 0 when enabled".into()));
            }
        } else if self.metrics_port != default_metrics_port() {
            warn!(
                "metrics_port configured to {} but monitoring is disabled",
                self.metrics_port
            );
        }

        Ok(())
    }
}

fn default_metrics_enabled() -> bool {
    false
}

fn default_metrics_port() -> u16 {
    8889
}
