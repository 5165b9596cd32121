use std::path::Path;

use bgp_agent::utils::file_io::open_file_for_append;
use bgp_agent::AgentBuilder;
use bgp_agent::AgentConfig;
use bgp_agent::Error;
use bgp_agent::NetworkError;
use bgp_agent::Result;
use bgp_agent::SystemError;
use tokio::signal::unix::signal;
use tokio::signal::unix::SignalKind;
use tokio::sync::watch;
use tracing::error;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<()> {
    let config = AgentConfig::new()?.validate()?;

    // Initializing Logs
    let _guard = init_observability(&config.agent.log_file())?;

    // Initializing Shutdown Signal
    let (graceful_tx, graceful_rx) = watch::channel(());

    let agent = AgentBuilder::new(config, graceful_rx)
        .build()
        .await?
        .start_metrics_server();

    info!("Agent started. Waiting for SIGINT or SIGTERM...");
    tokio::spawn(async {
        if let Err(e) = graceful_shutdown(graceful_tx).await {
            error!("Failed to shutdown: {:?}", e);
        }
    });

    if let Err(e) = agent.run().await {
        error!("agent stops: {:?}", e);
        return Err(e);
    }

    Ok(())
}

async fn graceful_shutdown(graceful_tx: watch::Sender<()>) -> Result<()> {
    let mut sigint = signal(SignalKind::interrupt()).map_err(SystemError::Io)?;
    let mut sigterm = signal(SignalKind::terminate()).map_err(SystemError::Io)?;
    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT detected.");
        },
        _ = sigterm.recv() => {
            info!("SIGTERM detected.");
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C detected.");
        },
    }

    graceful_tx.send(()).map_err(|e| {
        error!("Failed to send shutdown signal: {}", e);
        Error::from(NetworkError::SignalSendFailed(format!(
            "Failed to send shutdown signal: {}",
            e
        )))
    })?;

    info!("Shutdown signal sent");
    Ok(())
}

fn init_observability(log_file: &Path) -> Result<WorkerGuard> {
    let log_file = open_file_for_append(log_file)?;

    let (non_blocking, guard) = tracing_appender::non_blocking(log_file);
    let base_subscriber = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::from_default_env());
    tracing_subscriber::registry().with(base_subscriber).init();

    Ok(guard)
}
