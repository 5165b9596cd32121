//! Process level assembly of the agent.
//!
//! [`AgentBuilder`] connects both collaborators (or takes injected ones),
//! wires them into a [`Reconciler`] and returns an [`Agent`]. The agent owns
//! the shutdown receiver and runs until it fires.
//!
//! ```ignore
//! let (shutdown_tx, shutdown_rx) = watch::channel(());
//! AgentBuilder::new(config, shutdown_rx)
//!     .build()
//!     .await?
//!     .start_metrics_server()
//!     .run()
//!     .await?;
//! ```

mod builder;
pub use builder::*;


use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::error;
use tracing::info;

use crate::metrics;
use crate::AgentConfig;
use crate::Reconciler;
use crate::Result;

pub struct Agent {
    pub(crate) config: Arc<AgentConfig>,
    pub(crate) reconciler: Arc<Reconciler>,
    pub(crate) shutdown_signal: watch::Receiver<()>,
    pub(crate) metrics_server: Option<JoinHandle<()>>,
}

impl Agent {
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn reconciler(&self) -> Arc<Reconciler> {
        self.reconciler.clone()
    }

    /// Spawns the Prometheus exporter when `monitoring.metrics_enabled` is
    /// set. A bind failure is logged and does not stop the agent.
    pub fn start_metrics_server(mut self) -> Self {
        if !self.config.monitoring.metrics_enabled {
            return self;
        }

        let port = self.config.monitoring.metrics_port;
        let shutdown = self.shutdown_signal.clone();
        info!(port, "Starting metrics server");
        self.metrics_server = Some(tokio::spawn(async move {
            if let Err(e) = metrics::start_server(port, shutdown).await {
                error!("metrics server stopped: {}", e);
            }
        }));
        self
    }

    /// Drives both reconciliation loops until the shutdown signal fires.
    ///
    /// # Errors
    /// Returns an error when a loop task panicked.
    pub async fn run(self) -> Result<()> {
        info!(
            hostname = %self.config.agent.hostname,
            prefix = %self.reconciler.host_prefix(),
            "Agent running"
        );
        let result = self.reconciler.clone().run(self.shutdown_signal.clone()).await;

        if let Some(handle) = self.metrics_server {
            if let Err(e) = handle.await {
                error!("metrics server task failed: {:?}", e);
            }
        }

        info!("Agent stopped");
        result
    }
}
