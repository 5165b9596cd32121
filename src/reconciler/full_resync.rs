use std::collections::BTreeSet;

use tokio::sync::watch;
use tokio::time::sleep;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::diff;
use super::record_operation;
use super::Reconciler;
use super::ResyncReport;
use super::LOOP_RESYNC;
use super::OP_ANNOUNCE;
use super::OP_WITHDRAW;
use crate::metrics::DECODE_SKIPPED;
use crate::metrics::DRIFT_ADDRESSES;
use crate::metrics::RESYNC_ITERATIONS;
use crate::IpIdentity;
use crate::KeyCodec;
use crate::Result;

impl Reconciler {
    /// Full resync loop. Iterations never overlap; the interval is the pause
    /// after an iteration completes, failed or not.
    pub async fn run_full_resync(
        &self,
        mut shutdown: watch::Receiver<()>,
    ) -> Result<()> {
        info!(interval = ?self.config.resync_interval(), "Full resync loop started");

        loop {
            match self.resync_once().await {
                Ok(report) => {
                    RESYNC_ITERATIONS.with_label_values(&["ok"]).inc();
                    if report.is_noop() {
                        debug!(loop_name = LOOP_RESYNC, "In sync");
                    } else {
                        info!(
                            loop_name = LOOP_RESYNC,
                            withdrawn = report.withdrawn.len(),
                            announced = report.announced.len(),
                            failed = report.failed.len(),
                            "Resync iteration repaired drift"
                        );
                    }
                }
                Err(e) => {
                    RESYNC_ITERATIONS.with_label_values(&["error"]).inc();
                    error!(loop_name = LOOP_RESYNC, "Resync iteration aborted, retrying next tick: {}", e);
                }
            }

            tokio::select! {
                _ = shutdown.changed() => {
                    info!("Full resync loop received shutdown signal");
                    return Ok(());
                }
                _ = sleep(self.config.resync_interval()) => {}
            }
        }
    }

    /// One iteration: read both sides, diff, withdraw then announce.
    ///
    /// # Errors
    /// Returns the read error when either collaborator cannot be listed.
    /// Rejected operations are reported in [`ResyncReport::failed`] instead.
    pub async fn resync_once(&self) -> Result<ResyncReport> {
        let actual = self.read_actual().await?;
        let desired = self.read_desired().await?;

        let drift = diff(&desired, &actual);
        DRIFT_ADDRESSES
            .with_label_values(&[OP_WITHDRAW])
            .set(drift.to_withdraw.len() as i64);
        DRIFT_ADDRESSES
            .with_label_values(&[OP_ANNOUNCE])
            .set(drift.to_announce.len() as i64);

        let mut report = ResyncReport::default();
        for ip in drift.to_withdraw {
            let result = self.routes.withdraw(ip).await;
            record_operation(LOOP_RESYNC, OP_WITHDRAW, &result);
            match result {
                Ok(()) => report.withdrawn.push(ip),
                Err(e) => {
                    error!(loop_name = LOOP_RESYNC, %ip, "Withdraw failed: {}", e);
                    report.failed.push(ip);
                }
            }
        }
        for ip in drift.to_announce {
            let result = self.routes.announce(ip).await;
            record_operation(LOOP_RESYNC, OP_ANNOUNCE, &result);
            match result {
                Ok(()) => report.announced.push(ip),
                Err(e) => {
                    error!(loop_name = LOOP_RESYNC, %ip, "Announce failed: {}", e);
                    report.failed.push(ip);
                }
            }
        }

        Ok(report)
    }

    /// Announced host routes. Non host masks and unparsable prefixes are
    /// dropped.
    pub(crate) async fn read_actual(&self) -> Result<BTreeSet<IpIdentity>> {
        let prefixes = self.routes.list_announced().await.map_err(|e| {
            warn!(loop_name = LOOP_RESYNC, "Listing announced routes failed: {}", e);
            e
        })?;

        let mut actual = BTreeSet::new();
        for cidr in &prefixes {
            match KeyCodec::decode_announced(cidr) {
                Some(ip) => {
                    actual.insert(ip);
                }
                None => {
                    DECODE_SKIPPED.with_label_values(&["daemon"]).inc();
                    debug!(%cidr, "Ignoring prefix that is not a host route");
                }
            }
        }
        Ok(actual)
    }

    /// Addresses allocated to this host. Malformed keys are dropped.
    pub(crate) async fn read_desired(&self) -> Result<BTreeSet<IpIdentity>> {
        let keys = self.source.list(&self.host_prefix).await.map_err(|e| {
            warn!(loop_name = LOOP_RESYNC, "Listing allocations failed: {}", e);
            e
        })?;

        let mut desired = BTreeSet::new();
        for key in &keys {
            match KeyCodec::decode(key, &self.host_prefix) {
                Some(ip) => {
                    desired.insert(ip);
                }
                None => {
                    DECODE_SKIPPED.with_label_values(&["store"]).inc();
                    warn!(%key, "Skipping allocation key without an address");
                }
            }
        }
        Ok(desired)
    }
}
