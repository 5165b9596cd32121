//! Dual loop convergence of the announced address set.
//!
//! Two independent tasks drive the [`RouteController`] towards the addresses
//! the [`DesiredStateSource`] assigns to this host:
//!
//! - the full resync loop recomputes the drift from fresh reads of both sides
//!   and repairs it, pausing between completed iterations;
//! - the watch loop applies store change events one at a time, in delivery
//!   order, and resubscribes when the stream ends.
//!
//! The loops share no mutable state. Both rely on announce and withdraw being
//! idempotent, so no cross-loop lock is taken. Per item failures are logged
//! and left to the next resync iteration.

mod full_resync;
mod watch_loop;


use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use crate::metrics::RECONCILE_OPERATIONS;
use crate::utils::async_task::join_all;
use crate::utils::async_task::spawn_task;
use crate::DesiredStateSource;
use crate::IpIdentity;
use crate::ReconcileConfig;
use crate::Result;
use crate::RouteController;

pub(crate) const LOOP_RESYNC: &str = "resync";
pub(crate) const LOOP_WATCH: &str = "watch";

pub(crate) const OP_ANNOUNCE: &str = "announce";
pub(crate) const OP_WITHDRAW: &str = "withdraw";

pub struct Reconciler {
    host_prefix: String,
    source: Arc<dyn DesiredStateSource>,
    routes: Arc<dyn RouteController>,
    config: ReconcileConfig,
}

/// Addresses out of sync, in ascending address order
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Drift {
    /// Announced but no longer allocated
    pub to_withdraw: Vec<IpIdentity>,
    /// Allocated but not announced
    pub to_announce: Vec<IpIdentity>,
}

impl Drift {
    pub fn is_empty(&self) -> bool {
        self.to_withdraw.is_empty() && self.to_announce.is_empty()
    }
}

/// Outcome of one full resync iteration
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ResyncReport {
    pub withdrawn: Vec<IpIdentity>,
    pub announced: Vec<IpIdentity>,
    /// Items whose operation was rejected; retried by the next iteration
    pub failed: Vec<IpIdentity>,
}

impl ResyncReport {
    pub fn is_noop(&self) -> bool {
        self.withdrawn.is_empty() && self.announced.is_empty() && self.failed.is_empty()
    }
}

/// Outcome of applying a single change event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    Applied(IpIdentity),
    /// The key did not decode to an address; nothing was issued
    Skipped,
    Failed(IpIdentity),
}

/// `to_withdraw = actual - desired`, `to_announce = desired - actual`.
pub fn diff(
    desired: &BTreeSet<IpIdentity>,
    actual: &BTreeSet<IpIdentity>,
) -> Drift {
    Drift {
        to_withdraw: actual.difference(desired).copied().collect(),
        to_announce: desired.difference(actual).copied().collect(),
    }
}

impl Reconciler {
    pub fn new(
        host_prefix: impl Into<String>,
        source: Arc<dyn DesiredStateSource>,
        routes: Arc<dyn RouteController>,
        config: ReconcileConfig,
    ) -> Self {
        Self {
            host_prefix: host_prefix.into(),
            source,
            routes,
            config,
        }
    }

    pub fn host_prefix(&self) -> &str {
        &self.host_prefix
    }

    /// Runs the enabled loops until `shutdown` fires and both have exited.
    ///
    /// # Errors
    /// Returns an error only when a loop task panicked.
    pub async fn run(
        self: Arc<Self>,
        shutdown: watch::Receiver<()>,
    ) -> Result<()> {
        info!(
            prefix = %self.host_prefix,
            resync = self.config.enable_resync,
            watch = self.config.enable_watch,
            "Reconciler starting"
        );

        let mut handles = Vec::with_capacity(2);
        if self.config.enable_resync {
            let reconciler = self.clone();
            let shutdown = shutdown.clone();
            spawn_task(
                "full_resync",
                move || async move { reconciler.run_full_resync(shutdown).await },
                Some(&mut handles),
            );
        }
        if self.config.enable_watch {
            let reconciler = self.clone();
            let shutdown = shutdown.clone();
            spawn_task(
                "watch",
                move || async move { reconciler.run_watch(shutdown).await },
                Some(&mut handles),
            );
        }

        join_all(handles).await?;
        info!("Reconciler stopped");
        Ok(())
    }
}

fn record_operation(
    loop_name: &str,
    op: &str,
    result: &Result<()>,
) {
    let outcome = if result.is_ok() { "ok" } else { "error" };
    RECONCILE_OPERATIONS
        .with_label_values(&[loop_name, op, outcome])
        .inc();
}
