pub mod history;
pub mod keys;
pub mod repository;
pub mod snapshot;
pub mod sqlite;

pub use history::{HistoryRepository, STORAGE_BUDGET_BYTES, StorageUsage};
pub use repository::{InMemoryStore, KeyValueStore, Storage, StorageError};
pub use snapshot::{BankSnapshot, ImportError, ImportReport, RejectedBank, Snapshot};
