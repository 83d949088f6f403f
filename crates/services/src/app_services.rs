use std::sync::Arc;

use quiz_core::Clock;
use quiz_core::model::Bank;
use quiz_core::modes::{ModeRegistry, RegistrySettings};
use storage::{HistoryRepository, Storage};

use crate::controller::SessionController;
use crate::error::QuizServicesError;
use crate::stats_service::StatsService;

/// Assembles the registry, repository and services shared by every run.
#[derive(Clone)]
pub struct QuizServices {
    clock: Clock,
    registry: Arc<ModeRegistry>,
    history: HistoryRepository,
    stats: Arc<StatsService>,
}

impl QuizServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `QuizServicesError` if storage initialization or mode
    /// registration fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        settings: RegistrySettings,
    ) -> Result<Self, QuizServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Self::from_storage(&storage, clock, settings)
    }

    /// # Errors
    ///
    /// Returns `QuizServicesError::Registry` if a built-in mode fails
    /// registration.
    pub fn from_storage(
        storage: &Storage,
        clock: Clock,
        settings: RegistrySettings,
    ) -> Result<Self, QuizServicesError> {
        let registry = Arc::new(ModeRegistry::with_defaults(settings)?);
        let history = HistoryRepository::new(storage);
        let stats = Arc::new(StatsService::new(clock, history.clone()));
        Ok(Self {
            clock,
            registry,
            history,
            stats,
        })
    }

    #[must_use]
    pub fn registry(&self) -> Arc<ModeRegistry> {
        Arc::clone(&self.registry)
    }

    #[must_use]
    pub fn stats(&self) -> Arc<StatsService> {
        Arc::clone(&self.stats)
    }

    /// A controller for one bank, sharing this registry and store.
    #[must_use]
    pub fn controller(&self, bank: Bank) -> SessionController {
        SessionController::new(bank, self.registry(), self.history.clone(), self.clock)
    }
}
