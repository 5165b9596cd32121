//! Prometheus metrics and the warp exporter serving them.


use std::net::SocketAddr;
use std::sync::Once;

use lazy_static::lazy_static;
use prometheus::Encoder;
use prometheus::IntCounter;
use prometheus::IntCounterVec;
use prometheus::IntGaugeVec;
use prometheus::Opts;
use prometheus::Registry;
use serde::Serialize;
use tokio::sync::watch;
use tracing::error;
use tracing::info;
use warp::Filter;
use warp::Rejection;
use warp::Reply;

use crate::Result;
use crate::SystemError;

lazy_static! {
    /// Announce/withdraw attempts, by loop (`resync`, `watch`), op and result
    pub static ref RECONCILE_OPERATIONS: IntCounterVec = IntCounterVec::new(
        Opts::new("reconcile_operations_total", "Announce and withdraw attempts"),
        &["loop", "op", "result"]
    )
    .expect("metric can not be created");

    pub static ref RESYNC_ITERATIONS: IntCounterVec = IntCounterVec::new(
        Opts::new("resync_iterations_total", "Completed or aborted full resync iterations"),
        &["result"]
    )
    .expect("metric can not be created");

    /// Size of the last computed drift, by direction (`withdraw`, `announce`)
    pub static ref DRIFT_ADDRESSES: IntGaugeVec = IntGaugeVec::new(
        Opts::new("drift_addresses", "Addresses out of sync at the last resync"),
        &["direction"]
    )
    .expect("metric can not be created");

    pub static ref WATCH_EVENTS: IntCounterVec = IntCounterVec::new(
        Opts::new("watch_events_total", "Change events received from the store"),
        &["kind"]
    )
    .expect("metric can not be created");

    pub static ref WATCH_RESUBSCRIBES: IntCounter = IntCounter::new(
        "watch_resubscribes_total",
        "Watch sessions reopened after closing or failing"
    )
    .expect("metric can not be created");

    /// Keys or prefixes that did not decode to a host address, by origin
    pub static ref DECODE_SKIPPED: IntCounterVec = IntCounterVec::new(
        Opts::new("decode_skipped_total", "Entries skipped because they did not decode"),
        &["origin"]
    )
    .expect("metric can not be created");

    pub static ref REGISTRY: Registry = Registry::new();
}

static REGISTER: Once = Once::new();

pub(crate) fn register_custom_metrics(registry: &Registry) -> prometheus::Result<()> {
    registry.register(Box::new(RECONCILE_OPERATIONS.clone()))?;
    registry.register(Box::new(RESYNC_ITERATIONS.clone()))?;
    registry.register(Box::new(DRIFT_ADDRESSES.clone()))?;
    registry.register(Box::new(WATCH_EVENTS.clone()))?;
    registry.register(Box::new(WATCH_RESUBSCRIBES.clone()))?;
    registry.register(Box::new(DECODE_SKIPPED.clone()))?;
    Ok(())
}

fn ensure_registered() {
    REGISTER.call_once(|| {
        if let Err(e) = register_custom_metrics(&REGISTRY) {
            error!("could not register agent metrics: {}", e);
        }
    });
}

/// Build information reported by `GET /v1/gitinfo`
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct GitInfo {
    pub sha: String,
    pub branch: String,
    pub version: String,
}

impl GitInfo {
    pub fn current() -> Self {
        Self {
            sha: env!("VERGEN_GIT_SHA").to_string(),
            branch: env!("VERGEN_GIT_BRANCH").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

pub(crate) fn routes() -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let metrics = warp::path!("metrics").and(warp::get()).and_then(metrics_handler);
    let gitinfo = warp::path!("v1" / "gitinfo")
        .and(warp::get())
        .map(|| warp::reply::json(&GitInfo::current()));
    metrics.or(gitinfo)
}

/// Binds the exporter on `addr`. The returned future serves until
/// `shutdown` fires.
///
/// # Errors
/// Returns [`SystemError::ServerUnavailable`] when the address cannot be bound.
pub fn bind_server(
    addr: SocketAddr,
    mut shutdown: watch::Receiver<()>,
) -> Result<(SocketAddr, impl std::future::Future<Output = ()>)> {
    ensure_registered();

    let (bound, server) = warp::serve(routes())
        .try_bind_with_graceful_shutdown(addr, async move {
            let _ = shutdown.changed().await;
        })
        .map_err(|e| {
            error!("metrics server failed to bind {}: {}", addr, e);
            SystemError::ServerUnavailable
        })?;

    info!("metrics server listening on {}", bound);
    Ok((bound, server))
}

pub async fn start_server(
    port: u16,
    shutdown: watch::Receiver<()>,
) -> Result<()> {
    let (_, server) = bind_server(([0, 0, 0, 0], port).into(), shutdown)?;
    server.await;
    info!("metrics server stopped");
    Ok(())
}

async fn metrics_handler() -> std::result::Result<impl Reply, Rejection> {
    ensure_registered();
    Ok(encode_metrics(&REGISTRY))
}

/// Renders every family of `registry` in the Prometheus text format.
pub(crate) fn encode_metrics(registry: &Registry) -> String {
    let encoder = prometheus::TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&registry.gather(), &mut buffer) {
        error!("could not encode agent metrics: {}", e);
    }
    String::from_utf8(buffer).unwrap_or_else(|e| {
        error!("agent metrics could not be from_utf8'd: {}", e);
        String::default()
    })
}
