use chrono::{DateTime, Duration, Utc};

/// Lifecycle of a [`Countdown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownState {
    Running,
    Fired,
    Cancelled,
}

/// Cancellable time-limit handle owned by a session.
///
/// The countdown is polled with the current time instead of scheduling a
/// callback; it fires at most once, and never after `cancel`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Countdown {
    deadline: DateTime<Utc>,
    state: CountdownState,
}

impl Countdown {
    #[must_use]
    pub fn start(now: DateTime<Utc>, limit: Duration) -> Self {
        Self {
            deadline: now + limit,
            state: CountdownState::Running,
        }
    }

    #[must_use]
    pub fn deadline(&self) -> DateTime<Utc> {
        self.deadline
    }

    #[must_use]
    pub fn state(&self) -> CountdownState {
        self.state
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state == CountdownState::Running
    }

    /// Whole seconds left, or `None` once the countdown is no longer running.
    #[must_use]
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> Option<u64> {
        if !self.is_running() {
            return None;
        }
        let left = (self.deadline - now).num_seconds().max(0);
        u64::try_from(left).ok()
    }

    /// Returns `true` exactly once: on the first poll at or after the deadline.
    pub fn poll(&mut self, now: DateTime<Utc>) -> bool {
        if self.state == CountdownState::Running && now >= self.deadline {
            self.state = CountdownState::Fired;
            return true;
        }
        false
    }

    pub fn cancel(&mut self) {
        if self.state == CountdownState::Running {
            self.state = CountdownState::Cancelled;
        }
    }
}
