use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Background task that emits one tick per period until stopped.
///
/// The task is aborted on [`Countdown::stop`] and on drop, so a countdown
/// that went out of scope can never deliver another tick.
#[derive(Debug)]
pub struct Countdown {
    handle: JoinHandle<()>,
}

impl Countdown {
    /// Spawn the ticking task on the current tokio runtime.
    ///
    /// The first tick arrives one full `period` after the call.
    #[must_use]
    pub fn start(period: Duration, ticks: UnboundedSender<()>) -> Self {
        let handle = tokio::spawn(async move {
            let mut interval = time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if ticks.send(()).is_err() {
                    break;
                }
            }
        });
        Self { handle }
    }

    pub fn stop(self) {
        drop(self);
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
