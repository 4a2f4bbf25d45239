// Background drift refresh
// Periodically recomputes drift and republishes the gauges until cancelled

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::drift::DriftAggregator;

/// Handle to a running refresh task
pub struct DriftScheduler {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl DriftScheduler {
    /// Spawn the refresh loop. The first refresh runs one full interval after start.
    pub fn spawn(
        aggregator: Arc<DriftAggregator>,
        interval: Duration,
        token: CancellationToken,
    ) -> Self {
        let task_token = token.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;

            info!(interval_secs = interval.as_secs(), "Drift refresh task started");
            loop {
                tokio::select! {
                    _ = task_token.cancelled() => {
                        info!("Drift refresh task shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        refresh_once(Arc::clone(&aggregator)).await;
                    }
                }
            }
        });

        Self { token, handle }
    }

    /// Cancel the loop and wait for it to exit
    pub async fn shutdown(self) {
        self.token.cancel();
        if let Err(e) = self.handle.await {
            warn!(error = %e, "Drift refresh task ended abnormally");
        }
    }
}

/// One refresh cycle; failures are logged and the previous gauges stay
async fn refresh_once(aggregator: Arc<DriftAggregator>) {
    match tokio::task::spawn_blocking(move || aggregator.update_metrics()).await {
        Ok(Ok(summary)) => debug!(
            drift_share = summary.drift_share,
            rows = summary.num_rows,
            "Scheduled drift refresh complete"
        ),
        Ok(Err(e)) => warn!(error = %e, "Scheduled drift refresh failed"),
        Err(e) => warn!(error = %e, "Scheduled drift refresh panicked"),
    }
}
