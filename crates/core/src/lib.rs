//! Quiz engine core: the question bank model, the pluggable mode contract,
//! the four built-in mode sessions and the pure statistics helpers.
//!
//! Nothing in this crate performs I/O. Persistence lives in `storage`,
//! orchestration in `services`.

pub mod analytics;
pub mod error;
pub mod model;
pub mod modes;
pub mod time;
pub mod timer;

pub use error::{BankError, ConfigError, RegistryError, SessionError};
pub use time::Clock;
