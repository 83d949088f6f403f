use std::time::Duration;

use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};

/// Periodic wake-up for time-limited sessions.
///
/// The ticker only says "check the clock now"; the session decides from its
/// own countdown whether the limit has passed. Once cancelled it never yields
/// again.
#[derive(Debug)]
pub struct Ticker {
    interval: Interval,
    cancelled: bool,
}

impl Ticker {
    /// First tick fires one `period` from now.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn every(period: Duration) -> Self {
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self {
            interval,
            cancelled: false,
        }
    }

    /// Waits for the next tick. Pending forever after [`Ticker::cancel`].
    pub async fn tick(&mut self) -> Instant {
        if self.cancelled {
            return std::future::pending().await;
        }
        self.interval.tick().await
    }

    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}
