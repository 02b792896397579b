//! Periodic stale-lock sweep running as a background Tokio task.

use super::lock_manager::LockManager;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

pub struct StaleLockSweeper;

impl StaleLockSweeper {
    /// Sweep every `interval` until the returned handle is shut down.
    ///
    /// The first sweep runs one full interval after spawning.
    pub fn spawn(manager: Arc<LockManager>, interval: Duration) -> SweeperHandle {
        let (shutdown_sender, mut shutdown_receiver) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;

            info!(interval_ms = interval.as_millis() as u64, "🟢 Stale lock sweeper started");
            loop {
                tokio::select! {
                    _ = &mut shutdown_receiver => break,
                    _ = ticker.tick() => {
                        if let Err(e) = manager.sweep_stale_locks().await {
                            error!(error = %e, "❌ Stale lock sweep failed");
                        }
                    }
                }
            }
            info!("🛑 Stale lock sweeper stopped");
        });

        SweeperHandle {
            shutdown_sender: Some(shutdown_sender),
            task: Some(task),
        }
    }
}

/// Owns the sweeper task; dropping the handle stops the sweep
pub struct SweeperHandle {
    shutdown_sender: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl SweeperHandle {
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Signal the sweeper and wait for an in-flight sweep to finish
    pub async fn shutdown(mut self) {
        if let Some(sender) = self.shutdown_sender.take() {
            let _ = sender.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "Stale lock sweeper ended abnormally");
            }
        }
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        if let Some(sender) = self.shutdown_sender.take() {
            let _ = sender.send(());
        }
    }
}
