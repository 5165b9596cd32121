use futures::StreamExt;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::record_operation;
use super::EventOutcome;
use super::Reconciler;
use super::LOOP_WATCH;
use super::OP_ANNOUNCE;
use super::OP_WITHDRAW;
use crate::metrics::DECODE_SKIPPED;
use crate::metrics::WATCH_EVENTS;
use crate::metrics::WATCH_RESUBSCRIBES;
use crate::ChangeEvent;
use crate::ChangeKind;
use crate::ChangeStream;
use crate::KeyCodec;
use crate::Result;

/// Why a subscription session stopped being drained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionEnd {
    /// The store ended the stream
    Closed,
    /// Subscribing failed or the stream yielded an error
    Failed,
    Shutdown,
}

impl Reconciler {
    /// Watch loop. Subscribes, applies events in delivery order and
    /// resubscribes after a fixed delay whenever the session ends.
    pub async fn run_watch(
        &self,
        mut shutdown: watch::Receiver<()>,
    ) -> Result<()> {
        info!(prefix = %self.host_prefix, "Watch loop started");

        let mut resubscribing = false;
        loop {
            if resubscribing {
                WATCH_RESUBSCRIBES.inc();
            }
            resubscribing = true;

            let end = match self.source.subscribe(&self.host_prefix).await {
                Ok(stream) => self.drain(stream, &mut shutdown).await,
                Err(e) => {
                    error!(loop_name = LOOP_WATCH, "Subscribe failed: {}", e);
                    SessionEnd::Failed
                }
            };

            match end {
                SessionEnd::Shutdown => {
                    info!("Watch loop received shutdown signal");
                    return Ok(());
                }
                SessionEnd::Closed => warn!(loop_name = LOOP_WATCH, "Watch stream closed, resubscribing"),
                SessionEnd::Failed => warn!(loop_name = LOOP_WATCH, "Watch session failed, resubscribing"),
            }

            tokio::select! {
                _ = shutdown.changed() => {
                    info!("Watch loop received shutdown signal");
                    return Ok(());
                }
                _ = sleep(self.config.resubscribe_delay()) => {}
            }
        }
    }

    /// Applies every event of one session. Events are handled strictly one
    /// after another; shutdown is only observed between events.
    pub(crate) async fn drain(
        &self,
        mut stream: ChangeStream,
        shutdown: &mut watch::Receiver<()>,
    ) -> SessionEnd {
        loop {
            tokio::select! {
                _ = shutdown.changed() => return SessionEnd::Shutdown,
                item = stream.next() => match item {
                    Some(Ok(event)) => {
                        self.apply_event(&event).await;
                    }
                    Some(Err(e)) => {
                        warn!(loop_name = LOOP_WATCH, "Watch stream error: {}", e);
                        return SessionEnd::Failed;
                    }
                    None => return SessionEnd::Closed,
                },
            }
        }
    }

    /// Turns one change event into an announce (create) or a withdraw
    /// (delete). Failures are logged and not retried here.
    pub async fn apply_event(
        &self,
        event: &ChangeEvent,
    ) -> EventOutcome {
        WATCH_EVENTS.with_label_values(&[event.kind.as_str()]).inc();

        let Some(ip) = KeyCodec::decode(&event.key, &self.host_prefix) else {
            DECODE_SKIPPED.with_label_values(&["store"]).inc();
            warn!(key = %event.key, kind = event.kind.as_str(), "Skipping event without an address");
            return EventOutcome::Skipped;
        };

        let (op, result) = match event.kind {
            ChangeKind::Create => (OP_ANNOUNCE, self.routes.announce(ip).await),
            ChangeKind::Delete => (OP_WITHDRAW, self.routes.withdraw(ip).await),
        };
        record_operation(LOOP_WATCH, op, &result);

        match result {
            Ok(()) => {
                debug!(loop_name = LOOP_WATCH, %ip, op, "Applied change event");
                EventOutcome::Applied(ip)
            }
            Err(e) => {
                error!(loop_name = LOOP_WATCH, %ip, op, "Applying change event failed: {}", e);
                EventOutcome::Failed(ip)
            }
        }
    }
}
