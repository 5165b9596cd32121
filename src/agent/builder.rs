use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;
use tracing::info;

use super::Agent;
use crate::AgentConfig;
use crate::DesiredStateSource;
use crate::EtcdSource;
use crate::GobgpController;
use crate::Reconciler;
use crate::Result;
use crate::RouteController;

/// Assembles an [`Agent`].
///
/// Collaborators that are not injected are connected from the config: the
/// store endpoints in order, then the routing daemon target. Either failing
/// aborts startup.
pub struct AgentBuilder {
    pub(super) config: AgentConfig,
    pub(super) source: Option<Arc<dyn DesiredStateSource>>,
    pub(super) routes: Option<Arc<dyn RouteController>>,
    pub(super) shutdown_signal: watch::Receiver<()>,
}

impl AgentBuilder {
    pub fn new(
        config: AgentConfig,
        shutdown_signal: watch::Receiver<()>,
    ) -> Self {
        Self {
            config,
            source: None,
            routes: None,
            shutdown_signal,
        }
    }

    /// Replaces the default etcd source
    pub fn source(
        mut self,
        source: Arc<dyn DesiredStateSource>,
    ) -> Self {
        self.source = Some(source);
        self
    }

    /// Replaces the default GoBGP controller
    pub fn route_controller(
        mut self,
        routes: Arc<dyn RouteController>,
    ) -> Self {
        self.routes = Some(routes);
        self
    }

    pub async fn build(self) -> Result<Agent> {
        let source: Arc<dyn DesiredStateSource> = match self.source {
            Some(source) => source,
            None => {
                debug!(endpoints = ?self.config.store.endpoints, "Connecting allocation store");
                Arc::new(EtcdSource::connect(&self.config.store).await?)
            }
        };

        let routes: Arc<dyn RouteController> = match self.routes {
            Some(routes) => routes,
            None => {
                debug!(endpoint = %self.config.routing.target, "Connecting routing daemon");
                Arc::new(GobgpController::connect(&self.config.routing).await?)
            }
        };

        let host_prefix = self.config.host_prefix();
        info!(prefix = %host_prefix, "Agent assembled");
        let reconciler = Arc::new(Reconciler::new(
            host_prefix,
            source,
            routes,
            self.config.reconcile.clone(),
        ));

        Ok(Agent {
            config: Arc::new(self.config),
            reconciler,
            shutdown_signal: self.shutdown_signal,
            metrics_server: None,
        })
    }
}
