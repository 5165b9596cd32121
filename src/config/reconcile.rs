use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ReconcileConfig {
    /// Pause between two completed full resync iterations
    #[serde(default = "default_resync_interval")]
    pub resync_interval_in_ms: u64,

    /// Fixed pause before a closed or failed watch is reopened
    #[serde(default = "default_resubscribe_delay")]
    pub resubscribe_delay_in_ms: u64,

    #[serde(default = "default_enabled")]
    pub enable_resync: bool,

    #[serde(default = "default_enabled")]
    pub enable_watch: bool,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            resync_interval_in_ms: default_resync_interval(),
            resubscribe_delay_in_ms: default_resubscribe_delay(),
            enable_resync: default_enabled(),
            enable_watch: default_enabled(),
        }
    }
}

impl ReconcileConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.enable_resync && !self.enable_watch {
            return Err(Error::InvalidConfig(
                "at least one of reconcile.enable_resync and reconcile.enable_watch must be true".into(),
            ));
        }
        if self.resync_interval_in_ms == 0 {
            return Err(Error::InvalidConfig("reconcile.resync_interval_in_ms must be > 0".into()));
        }
        if self.resubscribe_delay_in_ms == 0 {
            return Err(Error::InvalidConfig("reconcile.resubscribe_delay_in_ms must be > 0".into()));
        }
        Ok(())
    }

    pub fn resync_interval(&self) -> Duration {
        Duration::from_millis(self.resync_interval_in_ms)
    }

    pub fn resubscribe_delay(&self) -> Duration {
        Duration::from_millis(self.resubscribe_delay_in_ms)
    }
}

fn default_resync_interval() -> u64 {
    5000
}
fn default_resubscribe_delay() -> u64 {
    1000
}
fn default_enabled() -> bool {
    true
}
