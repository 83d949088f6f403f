//! Shared error types for the services crate.

use thiserror::Error;

use quiz_core::model::ModeId;
use quiz_core::{ConfigError, RegistryError, SessionError};
use storage::repository::StorageError;
use storage::snapshot::ImportError;
use storage::sqlite::SqliteInitError;

use crate::controller::Screen;

/// Errors emitted by `SessionController`.
///
/// Persistence failures are not here: they surface as a `SaveStatus` on the
/// completed session.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ControllerError {
    #[error("action needs the {expected:?} screen, current screen is {actual:?}")]
    WrongScreen { expected: Screen, actual: Screen },
    #[error("mode {0} is not available for this bank")]
    UnknownMode(ModeId),
    #[error("no mode supports this bank")]
    NoSupportedModes,
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Errors emitted by `StatsService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StatsError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Import(#[from] ImportError),
}

/// Errors emitted while bootstrapping quiz services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuizServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}
