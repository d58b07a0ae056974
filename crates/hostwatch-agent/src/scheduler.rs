//! Supervision of the long-running agent tasks.

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;

const RESTART_BACKOFF: Duration = Duration::from_secs(5);

/// Runs the future produced by `factory` until it completes. A panicking
/// run is logged and restarted after a back-off; other tasks are unaffected.
pub fn supervise<F, Fut>(name: &'static str, factory: F) -> JoinHandle<()>
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    supervise_with_backoff(name, RESTART_BACKOFF, factory)
}

pub fn supervise_with_backoff<F, Fut>(
    name: &'static str,
    backoff: Duration,
    factory: F,
) -> JoinHandle<()>
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut restarts: u32 = 0;
        loop {
            match tokio::spawn(factory()).await {
                Ok(()) => {
                    tracing::info!(task = name, "Task finished");
                    return;
                }
                Err(e) if e.is_panic() => {
                    restarts += 1;
                    tracing::error!(task = name, restarts, "Task panicked, restarting");
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => {
                    tracing::warn!(task = name, error = %e, "Task cancelled");
                    return;
                }
            }
        }
    })
}
