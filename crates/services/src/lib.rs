#![forbid(unsafe_code)]

pub mod app_services;
pub mod controller;
pub mod error;
pub mod stats_service;
pub mod ticker;

pub use quiz_core::Clock;

pub use app_services::QuizServices;
pub use controller::{CompletedSession, SaveStatus, Screen, SessionController, SetupInfo};
pub use error::{ControllerError, QuizServicesError, StatsError};
pub use stats_service::{BankStats, StatsService};
pub use ticker::Ticker;
