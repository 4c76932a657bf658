use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use super::ChatSink;

/// Periodic "processing..." notifier for one pipeline stage.
///
/// The task is aborted when the ticker is dropped, so an early return out of a stage stops it
/// as reliably as reaching the end of the stage.
pub struct StatusTicker {
    handle: Option<JoinHandle<()>>,
}

impl StatusTicker {
    /// Start cycling `base.`, `base..`, `base...` every `interval`. A zero interval disables it.
    pub fn start(sink: Arc<dyn ChatSink>, base: &'static str, interval: Duration) -> Self {
        if interval.is_zero() {
            return Self { handle: None };
        }

        let handle = tokio::spawn(async move {
            let mut ticks = tokio::time::interval(interval);
            // The first tick fires immediately; the acknowledgement already covers it
            ticks.tick().await;

            let mut dots = 0;
            loop {
                ticks.tick().await;
                dots = dots % 3 + 1;
                let frame = format!("{}{}", base, ".".repeat(dots));
                if let Err(e) = sink.update_status(&frame).await {
                    tracing::debug!("Status update failed: {}", e);
                }
            }
        });

        Self {
            handle: Some(handle),
        }
    }

    pub fn stop(self) {}
}

impl Drop for StatusTicker {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
