//! Manages the lifecycle of background tasks owned by channels.
use anyhow::Result;
use std::future::Future;
use std::sync::{Mutex, PoisonError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::instrument::WithSubscriber;
use tracing::{debug, error};

/// A spawned task paired with its shutdown signal.
///
/// The task receives a `watch::Receiver<bool>` that flips to `true` when
/// [`BackgroundTask::stop`] is called, and is expected to exit promptly.
#[derive(Debug)]
pub struct BackgroundTask {
    name: &'static str,
    shutdown_tx: watch::Sender<bool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl BackgroundTask {
    /// Spawns the future produced by `task`, under the current tracing subscriber.
    pub fn spawn<F, Fut>(name: &'static str, task: F) -> Self
    where
        F: FnOnce(watch::Receiver<bool>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        debug!(task_name = name, "Spawning task");
        let handle = tokio::spawn(task(shutdown_rx).with_current_subscriber());
        Self {
            name,
            shutdown_tx,
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Signals the task to stop and waits for it to finish.
    ///
    /// Calling this more than once is harmless; later calls return immediately.
    pub async fn stop(&self) -> Result<()> {
        let handle = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(handle) = handle else {
            debug!(task_name = self.name, "Task already stopped.");
            return Ok(());
        };

        // The receiver may already be gone if the task exited on its own.
        let _ = self.shutdown_tx.send(true);
        match handle.await {
            Ok(()) => {
                debug!(task_name = self.name, "Task shut down gracefully.");
                Ok(())
            }
            Err(e) => {
                error!(task_name = self.name, "Task panicked during shutdown.");
                Err(anyhow::anyhow!("task '{}' failed: {}", self.name, e))
            }
        }
    }

    #[cfg(test)]
    fn is_finished(&self) -> bool {
        self.handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map_or(true, JoinHandle::is_finished)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_stop_signals_and_awaits_task() {
        let task = BackgroundTask::spawn("looper", |mut shutdown_rx| async move {
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => break,
                    _ = tokio::time::sleep(Duration::from_millis(10)) => {}
                }
            }
        });

        assert!(!task.is_finished());
        timeout(Duration::from_secs(1), task.stop()).await.unwrap().unwrap();
        assert!(task.is_finished());

        // Second stop is a no-op.
        task.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_reports_panicked_task() {
        let task = BackgroundTask::spawn("panicker", |_shutdown_rx| async move {
            panic!("boom");
        });

        let result = task.stop().await;
        assert!(result.is_err());
    }
}
