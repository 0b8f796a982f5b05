use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::RateLimiter;

const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Handle to the periodic sweep task.
///
/// Dropping the handle also stops the task, at its next wake-up.
pub struct SweeperHandle {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl SweeperHandle {
    /// Signals the task to stop and waits for it to finish.
    pub async fn shutdown(self) {
        let _ = self.stop_tx.send(true);
        if let Err(e) = self.handle.await {
            tracing::warn!(error = %e, "rate limit sweeper ended abnormally");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

pub(super) fn spawn(limiter: Arc<RateLimiter>, period: Duration) -> SweeperHandle {
    let (stop_tx, stop_rx) = watch::channel(false);
    let handle = tokio::spawn(run(limiter, period.max(MIN_PERIOD), stop_rx));
    SweeperHandle { stop_tx, handle }
}

async fn run(limiter: Arc<RateLimiter>, period: Duration, mut stop_rx: watch::Receiver<bool>) {
    let mut interval = tokio::time::interval(period);
    // The first tick completes immediately; there is nothing to sweep yet.
    interval.tick().await;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let removed = limiter.sweep(Instant::now());
                tracing::debug!(removed, remaining = limiter.len(), "swept rate limit visitors");
            }
            changed = stop_rx.changed() => {
                if changed.is_err() || *stop_rx.borrow() {
                    tracing::debug!("rate limit sweeper stopping");
                    break;
                }
            }
        }
    }
}
