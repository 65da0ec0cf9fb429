//! Periodic retention sweep.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time;

use crate::health::tracker::Tracker;

pub struct Sweeper {
    tracker: Arc<Tracker>,
    interval: Duration,
}

impl Sweeper {
    pub fn new(tracker: Arc<Tracker>, interval: Duration) -> Self {
        Self {
            tracker,
            interval: interval.max(Duration::from_millis(100)),
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = time::interval(self.interval);
        // First tick fires immediately; nothing to sweep yet
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tracker.sweep();
                }
                _ = shutdown.recv() => {
                    tracing::info!("Sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}
