//! Screen orchestration for one bank: mode selection, setup, the running
//! session and its results.
//!
//! The controller owns at most one live [`ModeSession`] and is the only
//! component that writes history and stats. Sessions never see the store.

mod persist;
mod screen;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use quiz_core::Clock;
use quiz_core::model::{Bank, ModeId};
use quiz_core::modes::{
    ModeRegistry, ModeSession, Outcome, Response, SessionItem, SessionOptions, SessionProgress,
    SupportedMode,
};
use storage::HistoryRepository;

use crate::error::ControllerError;
use crate::ticker::Ticker;

pub use persist::{CompletedSession, SaveStatus};
pub use screen::{Screen, SetupInfo};

const TICK_PERIOD: Duration = Duration::from_secs(1);

//
// ─── STATE ─────────────────────────────────────────────────────────────────────
//

struct Running {
    mode: ModeId,
    session: Box<dyn ModeSession>,
    timed: bool,
    ticker: Option<Ticker>,
}

enum State {
    ModeSelect,
    Setup { mode: ModeId },
    Running(Box<Running>),
    Results {
        mode: ModeId,
        completed: CompletedSession,
    },
}

impl State {
    fn screen(&self) -> Screen {
        match self {
            State::ModeSelect => Screen::ModeSelect,
            State::Setup { .. } => Screen::Setup,
            State::Running(_) => Screen::Running,
            State::Results { .. } => Screen::Results,
        }
    }
}

//
// ─── CONTROLLER ────────────────────────────────────────────────────────────────
//

pub struct SessionController {
    bank: Bank,
    registry: Arc<ModeRegistry>,
    history: HistoryRepository,
    clock: Clock,
    supported: Vec<SupportedMode>,
    state: State,
}

impl SessionController {
    /// Validates the bank against every registered mode and opens on the
    /// mode-select screen, or directly on setup when exactly one mode fits.
    #[must_use]
    pub fn new(
        bank: Bank,
        registry: Arc<ModeRegistry>,
        history: HistoryRepository,
        clock: Clock,
    ) -> Self {
        let supported = registry.supported_modes(&bank);
        if supported.is_empty() {
            warn!(bank = %bank.id(), "no registered mode supports this bank");
        }
        let mut controller = Self {
            bank,
            registry,
            history,
            clock,
            supported,
            state: State::ModeSelect,
        };
        if let [only] = controller.supported.as_slice() {
            let mode = only.metadata.id.clone();
            debug!(mode = %mode, "single supported mode, skipping selection");
            controller.enter(State::Setup { mode });
        }
        controller
    }

    fn enter(&mut self, next: State) {
        let from = self.state.screen();
        let to = next.screen();
        debug_assert!(from.can_enter(to), "illegal transition {from:?} -> {to:?}");
        info!(bank = %self.bank.id(), ?from, ?to, "screen transition");
        self.state = next;
    }

    fn wrong_screen(&self, expected: Screen) -> ControllerError {
        ControllerError::WrongScreen {
            expected,
            actual: self.state.screen(),
        }
    }

    #[must_use]
    pub fn screen(&self) -> Screen {
        self.state.screen()
    }

    #[must_use]
    pub fn bank(&self) -> &Bank {
        &self.bank
    }

    #[must_use]
    pub fn supported_modes(&self) -> &[SupportedMode] {
        &self.supported
    }

    #[must_use]
    pub fn has_supported_modes(&self) -> bool {
        !self.supported.is_empty()
    }

    /// Mode chosen for setup, the running session or its results.
    #[must_use]
    pub fn active_mode(&self) -> Option<&ModeId> {
        match &self.state {
            State::ModeSelect => None,
            State::Setup { mode } | State::Results { mode, .. } => Some(mode),
            State::Running(running) => Some(&running.mode),
        }
    }

    #[must_use]
    pub fn clock(&self) -> Clock {
        self.clock
    }

    pub fn set_clock(&mut self, clock: Clock) {
        self.clock = clock;
    }

    // ─── Mode select / setup ──────────────────────────────────────────────

    /// # Errors
    ///
    /// `WrongScreen` outside mode select, `NoSupportedModes` for a bank no
    /// mode can run, `UnknownMode` for a mode that is not supported.
    pub fn select_mode(&mut self, mode: &ModeId) -> Result<SetupInfo, ControllerError> {
        if self.screen() != Screen::ModeSelect {
            return Err(self.wrong_screen(Screen::ModeSelect));
        }
        if self.supported.is_empty() {
            return Err(ControllerError::NoSupportedModes);
        }
        if !self.supported.iter().any(|m| &m.metadata.id == mode) {
            return Err(ControllerError::UnknownMode(mode.clone()));
        }
        self.enter(State::Setup { mode: mode.clone() });
        self.setup_info()
    }

    /// # Errors
    ///
    /// `WrongScreen` outside setup.
    pub fn back(&mut self) -> Result<(), ControllerError> {
        if self.screen() != Screen::Setup {
            return Err(self.wrong_screen(Screen::Setup));
        }
        self.enter(State::ModeSelect);
        Ok(())
    }

    /// # Errors
    ///
    /// `WrongScreen` outside setup.
    pub fn setup_info(&self) -> Result<SetupInfo, ControllerError> {
        let State::Setup { mode } = &self.state else {
            return Err(self.wrong_screen(Screen::Setup));
        };
        let supported = self
            .supported
            .iter()
            .find(|m| &m.metadata.id == mode)
            .ok_or_else(|| ControllerError::UnknownMode(mode.clone()))?;
        let runner = self
            .registry
            .get(mode)
            .ok_or_else(|| ControllerError::UnknownMode(mode.clone()))?;

        let usable = runner.filter_questions(self.bank.questions());
        let categories: BTreeSet<String> =
            usable.iter().filter_map(|q| q.category.clone()).collect();

        Ok(SetupInfo {
            mode: supported.metadata.clone(),
            validation: supported.validation.clone(),
            categories: categories.into_iter().collect(),
            available: usable.len(),
        })
    }

    /// Configures and starts a session for the chosen mode.
    ///
    /// # Errors
    ///
    /// `WrongScreen` outside setup. A `Config` error keeps the controller on
    /// setup and no session is launched.
    pub fn start(&mut self, options: &SessionOptions) -> Result<(), ControllerError> {
        let State::Setup { mode } = &self.state else {
            return Err(self.wrong_screen(Screen::Setup));
        };
        let mode = mode.clone();
        let runner = self
            .registry
            .get(&mode)
            .ok_or_else(|| ControllerError::UnknownMode(mode.clone()))?;

        let mut session = runner.create_session();
        let config = session.configure(&self.bank, options)?;
        let timed = config.time_limit().is_some();
        debug!(
            mode = %mode,
            questions = config.questions.len(),
            seed = config.seed,
            timed,
            "session configured"
        );
        session.start(config, self.clock.now())?;

        self.enter(State::Running(Box::new(Running {
            mode,
            session,
            timed,
            ticker: None,
        })));
        Ok(())
    }

    // ─── Running ──────────────────────────────────────────────────────────

    #[must_use]
    pub fn current_item(&self) -> Option<SessionItem> {
        match &self.state {
            State::Running(running) => running.session.current_item(),
            _ => None,
        }
    }

    #[must_use]
    pub fn progress(&self) -> Option<SessionProgress> {
        match &self.state {
            State::Running(running) => Some(running.session.progress(self.clock.now())),
            _ => None,
        }
    }

    /// Forwards a response to the running session and moves to results when
    /// the session completes.
    ///
    /// # Errors
    ///
    /// `WrongScreen` outside running; `Session` for a response the session
    /// refused. A response arriving after the deadline is refused and still
    /// moves the controller to results.
    pub async fn submit(&mut self, response: Response) -> Result<Outcome, ControllerError> {
        let now = self.clock.now();
        let actual = self.state.screen();
        let State::Running(running) = &mut self.state else {
            return Err(ControllerError::WrongScreen {
                expected: Screen::Running,
                actual,
            });
        };

        let submitted = running.session.submit_response(response, now);
        if running.session.is_complete() {
            self.complete(now).await?;
        }
        Ok(submitted?)
    }

    /// Timer event. Returns true when it moved the controller to results.
    /// Ticks outside the running screen are ignored.
    ///
    /// # Errors
    ///
    /// Propagates a failure to finalize the session.
    pub async fn tick(&mut self) -> Result<bool, ControllerError> {
        let now = self.clock.now();
        let State::Running(running) = &mut self.state else {
            return Ok(false);
        };
        let expired = running.session.on_tick(now);
        if !expired && !running.session.is_complete() {
            return Ok(false);
        }
        self.complete(now).await?;
        Ok(true)
    }

    /// Resolves on the next timer tick of a time-limited session; never
    /// resolves otherwise. Meant for `tokio::select!` next to user input.
    pub async fn wait_tick(&mut self) {
        match &mut self.state {
            State::Running(running) if running.timed => {
                let ticker = running
                    .ticker
                    .get_or_insert_with(|| Ticker::every(TICK_PERIOD));
                ticker.tick().await;
            }
            _ => std::future::pending::<()>().await,
        }
    }

    /// Ends the running session now.
    ///
    /// # Errors
    ///
    /// `WrongScreen` outside running.
    pub async fn end_early(&mut self) -> Result<&CompletedSession, ControllerError> {
        let now = self.clock.now();
        self.complete(now).await?;
        self.completed()
            .ok_or_else(|| self.wrong_screen(Screen::Results))
    }

    /// Running → Results: cancels the ticker, finishes the session and saves
    /// its result. The future must be driven to completion.
    async fn complete(&mut self, now: chrono::DateTime<chrono::Utc>) -> Result<(), ControllerError> {
        let mut running = match std::mem::replace(&mut self.state, State::ModeSelect) {
            State::Running(running) => running,
            other => {
                let actual = other.screen();
                self.state = other;
                return Err(ControllerError::WrongScreen {
                    expected: Screen::Running,
                    actual,
                });
            }
        };

        if let Some(ticker) = running.ticker.as_mut() {
            ticker.cancel();
        }
        let result = match running.session.finish(now) {
            Ok(result) => result,
            Err(err) => {
                self.state = State::Running(running);
                return Err(err.into());
            }
        };
        let save = persist::save_result(&self.history, self.bank.id(), &result).await;
        info!(
            bank = %self.bank.id(),
            mode = %running.mode,
            termination = ?result.termination,
            percentage = result.percentage,
            saved = save.is_saved(),
            "session finished"
        );

        // back on Running so `enter` sees the real edge
        let mode = running.mode.clone();
        self.state = State::Running(running);
        self.enter(State::Results {
            mode,
            completed: CompletedSession { result, save },
        });
        Ok(())
    }

    // ─── Results ──────────────────────────────────────────────────────────

    #[must_use]
    pub fn completed(&self) -> Option<&CompletedSession> {
        match &self.state {
            State::Results { completed, .. } => Some(completed),
            _ => None,
        }
    }

    /// Results → Setup for the same mode.
    ///
    /// # Errors
    ///
    /// `WrongScreen` outside results.
    pub fn retake(&mut self) -> Result<SetupInfo, ControllerError> {
        let State::Results { mode, .. } = &self.state else {
            return Err(self.wrong_screen(Screen::Results));
        };
        let mode = mode.clone();
        self.enter(State::Setup { mode });
        self.setup_info()
    }
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("bank", self.bank.id())
            .field("screen", &self.state.screen())
            .field("mode", &self.active_mode())
            .finish_non_exhaustive()
    }
}
