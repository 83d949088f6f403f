use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::error::SessionError;
use crate::model::{ModeId, Termination};
use crate::time::elapsed_secs;
use crate::timer::Countdown;

/// Lifecycle bookkeeping shared by every mode session: start time, the
/// optional countdown, the terminal transition and the single finish.
#[derive(Debug, Clone, Default)]
pub(crate) struct RunState {
    started_at: Option<DateTime<Utc>>,
    countdown: Option<Countdown>,
    ended: Option<(Termination, DateTime<Utc>)>,
    finished: bool,
}

/// Terminal facts handed to a session when it builds its result.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Closing {
    pub termination: Termination,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

impl Closing {
    pub fn elapsed_secs(&self) -> u64 {
        elapsed_secs(self.started_at, self.ended_at)
    }
}

impl RunState {
    pub fn begin(
        &mut self,
        mode: &ModeId,
        now: DateTime<Utc>,
        limit: Option<Duration>,
    ) -> Result<(), SessionError> {
        if self.started_at.is_some() {
            return Err(SessionError::AlreadyStarted);
        }
        self.started_at = Some(now);
        self.countdown = limit.map(|limit| Countdown::start(now, limit));
        debug!(mode = %mode, time_limited = self.countdown.is_some(), "session started");
        Ok(())
    }

    pub fn is_started(&self) -> bool {
        self.started_at.is_some()
    }

    pub fn is_ended(&self) -> bool {
        self.ended.is_some()
    }

    pub fn termination(&self) -> Option<Termination> {
        self.ended.map(|(t, _)| t)
    }

    /// Gate for every submission. Expires the session first when the
    /// deadline has passed.
    pub fn ensure_active(&mut self, now: DateTime<Utc>) -> Result<(), SessionError> {
        if self.finished {
            return Err(SessionError::AlreadyFinished);
        }
        if self.started_at.is_none() {
            return Err(SessionError::NotStarted);
        }
        self.tick(now);
        if self.ended.is_some() {
            return Err(SessionError::Completed);
        }
        Ok(())
    }

    /// Records the terminal transition once and cancels the countdown.
    pub fn end(&mut self, termination: Termination, at: DateTime<Utc>) {
        if self.ended.is_some() {
            return;
        }
        if let Some(countdown) = self.countdown.as_mut() {
            countdown.cancel();
        }
        debug!(?termination, "session ended");
        self.ended = Some((termination, at));
    }

    /// Polls the countdown; returns true when this tick ended the run.
    pub fn tick(&mut self, now: DateTime<Utc>) -> bool {
        if self.ended.is_some() {
            return false;
        }
        let Some(countdown) = self.countdown.as_mut() else {
            return false;
        };
        if countdown.poll(now) {
            let deadline = countdown.deadline();
            self.ended = Some((Termination::TimeLimit, deadline));
            debug!("session time limit reached");
            return true;
        }
        false
    }

    /// Seconds left on the countdown while the run is live.
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> Option<u64> {
        self.countdown.as_ref().and_then(|c| c.remaining_secs(now))
    }

    pub fn elapsed_secs(&self, now: DateTime<Utc>) -> u64 {
        let end = self.ended.map_or(now, |(_, at)| at);
        self.started_at.map_or(0, |start| elapsed_secs(start, end))
    }

    /// Checks that a result may still be produced and expires an overdue run.
    pub fn prepare_finish(&mut self, now: DateTime<Utc>) -> Result<(), SessionError> {
        if self.finished {
            return Err(SessionError::AlreadyFinished);
        }
        if self.started_at.is_none() {
            return Err(SessionError::NotStarted);
        }
        self.tick(now);
        Ok(())
    }

    /// Marks the result as produced. Ends the run early if it was still live.
    pub fn close(&mut self, now: DateTime<Utc>) -> Result<Closing, SessionError> {
        self.prepare_finish(now)?;
        self.end(Termination::EndedEarly, now);
        self.finished = true;
        let (termination, ended_at) = self.ended.ok_or(SessionError::NotStarted)?;
        let started_at = self.started_at.ok_or(SessionError::NotStarted)?;
        Ok(Closing {
            termination,
            started_at,
            ended_at,
        })
    }

    #[cfg(test)]
    pub fn countdown(&self) -> Option<&Countdown> {
        self.countdown.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;
    use crate::timer::CountdownState;

    fn mode() -> ModeId {
        ModeId::new("test")
    }

    #[test]
    fn submissions_before_start_are_rejected() {
        let mut run = RunState::default();
        assert_eq!(run.ensure_active(fixed_now()), Err(SessionError::NotStarted));
    }

    #[test]
    fn overdue_submission_expires_then_rejects() {
        let now = fixed_now();
        let mut run = RunState::default();
        run.begin(&mode(), now, Some(Duration::minutes(1))).unwrap();
        assert_eq!(
            run.ensure_active(now + Duration::minutes(2)),
            Err(SessionError::Completed)
        );
        assert_eq!(run.termination(), Some(Termination::TimeLimit));
        assert_eq!(run.elapsed_secs(now + Duration::minutes(5)), 60);
    }

    #[test]
    fn ending_cancels_countdown() {
        let now = fixed_now();
        let mut run = RunState::default();
        run.begin(&mode(), now, Some(Duration::minutes(1))).unwrap();
        run.end(Termination::Completed, now);
        assert_eq!(run.countdown().unwrap().state(), CountdownState::Cancelled);
        assert!(!run.tick(now + Duration::minutes(3)));
        assert_eq!(run.termination(), Some(Termination::Completed));
    }

    #[test]
    fn close_happens_once_and_ends_early() {
        let now = fixed_now();
        let mut run = RunState::default();
        run.begin(&mode(), now, None).unwrap();
        let closing = run.close(now + Duration::seconds(12)).unwrap();
        assert_eq!(closing.termination, Termination::EndedEarly);
        assert_eq!(closing.elapsed_secs(), 12);
        assert!(matches!(run.close(now), Err(SessionError::AlreadyFinished)));
    }

    #[test]
    fn second_start_is_rejected() {
        let mut run = RunState::default();
        run.begin(&mode(), fixed_now(), None).unwrap();
        assert_eq!(
            run.begin(&mode(), fixed_now(), None),
            Err(SessionError::AlreadyStarted)
        );
    }
}
