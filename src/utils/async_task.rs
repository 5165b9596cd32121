use tokio::task::JoinHandle;
use tracing::error;
use tracing::info;

use crate::Result;

/// Spawns a named long running task and tracks its handle.
///
/// Errors returned by the task are logged, never propagated: both
/// reconciliation loops are expected to run until shutdown.
pub(crate) fn spawn_task<F, Fut>(
    name: &str,
    task_fn: F,
    handles: Option<&mut Vec<JoinHandle<()>>>,
) where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: std::future::Future<Output = Result<()>> + Send + 'static,
{
    let name = name.to_string();
    let handle = tokio::spawn(async move {
        match task_fn().await {
            Ok(()) => info!("task {name} stopped"),
            Err(e) => error!("spawned task: {name} stopped or encountered an error: {:?}", e),
        }
    });

    if let Some(h) = handles {
        h.push(handle);
    }
}

/// Waits for every tracked task. A panicked task is reported as an error
/// after the remaining ones have finished.
pub(crate) async fn join_all(handles: Vec<JoinHandle<()>>) -> Result<()> {
    let mut first_error = None;
    for handle in handles {
        if let Err(e) = handle.await {
            error!("task join failed: {:?}", e);
            first_error.get_or_insert(e);
        }
    }
    match first_error {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}
