//! Shared helpers for background tasks.

use crate::app::AppEvent;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use tokio::sync::mpsc;

/// Catch panics in async tasks and convert them to error messages.
///
/// Wraps a future with `catch_unwind` so a panicking task reports an
/// `AppEvent::TaskPanicked` instead of dying silently.
///
/// # Example
///
/// ```ignore
/// tokio::spawn(async move {
///     let result = catch_task_panic(async { do_work().await }).await;
///     if let Err(panic_msg) = result {
///         send(&tx, AppEvent::TaskPanicked { task: "work", error: panic_msg }).await;
///     }
/// });
/// ```
pub(super) async fn catch_task_panic<F, T>(future: F) -> Result<T, String>
where
    F: std::future::Future<Output = T>,
{
    AssertUnwindSafe(future)
        .catch_unwind()
        .await
        .map_err(|panic| {
            if let Some(s) = panic.downcast_ref::<&'static str>() {
                s.to_string()
            } else if let Some(s) = panic.downcast_ref::<String>() {
                s.clone()
            } else {
                format!("Unknown panic: {:?}", (*panic).type_id())
            }
        })
}

/// Send an event to the loop. A closed channel means the app is exiting.
pub(super) async fn send(tx: &mpsc::Sender<AppEvent>, event: AppEvent) {
    if let Err(e) = tx.send(event).await {
        tracing::warn!(error = %e, "Channel send failed (receiver dropped)");
    }
}

/// Spawn a named task whose panic is reported as `AppEvent::TaskPanicked`.
pub(super) fn spawn_task<F>(task: &'static str, tx: mpsc::Sender<AppEvent>, future: F)
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(error) = catch_task_panic(future).await {
            tracing::error!(task, error = %error, "Background task panicked");
            send(&tx, AppEvent::TaskPanicked { task, error }).await;
        }
    });
}
