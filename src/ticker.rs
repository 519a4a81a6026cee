//! Wall-clock tick source for driving a session in real time.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

/// Delivers one tick per period until cancelled or dropped. Ticks that were
/// missed (the process was suspended, the consumer was slow) are skipped,
/// never delivered in a burst.
#[derive(Debug)]
pub struct Ticker {
    rx: mpsc::Receiver<()>,
    task: JoinHandle<()>,
}

impl Ticker {
    pub fn every(period: Duration) -> Self {
        let (tx, rx) = mpsc::channel(1);

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately.
            interval.tick().await;

            loop {
                interval.tick().await;
                if tx.send(()).await.is_err() {
                    break;
                }
            }
        });

        debug!(?period, "ticker scheduled");
        Self { rx, task }
    }

    pub fn per_second() -> Self {
        Self::every(Duration::from_secs(1))
    }

    /// `None` once the ticker has been cancelled.
    pub async fn next(&mut self) -> Option<()> {
        self.rx.recv().await
    }

    pub fn cancel(&self) {
        self.task.abort();
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.task.abort();
    }
}
