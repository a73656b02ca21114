use std::future;
use std::time::Duration;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};

/// Periodic heartbeat that only ticks while armed.
#[derive(Debug)]
pub(super) struct KeepAlive {
    period: Duration,
    timer: Option<Interval>,
}

impl KeepAlive {
    pub(super) fn new(period: Duration) -> Self {
        Self {
            period,
            timer: None,
        }
    }

    /// Arm the timer; the first tick fires one full period from now.
    pub(super) fn start(&mut self) {
        let mut timer = interval_at(Instant::now() + self.period, self.period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.timer = Some(timer);
    }

    pub(super) fn cancel(&mut self) {
        self.timer = None;
    }

    /// Resolves on the next tick; never resolves while disarmed.
    pub(super) async fn tick(&mut self) {
        match self.timer.as_mut() {
            Some(timer) => {
                timer.tick().await;
            }
            None => future::pending().await,
        }
    }
}
