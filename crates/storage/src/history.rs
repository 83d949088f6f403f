//! Typed access to per-bank history and per-question stats on top of the
//! raw key/value store.

use std::sync::Arc;

use quiz_core::model::{
    BankId, HistoryEntry, ItemOutcome, QuestionStats, fold_outcomes, percent, push_capped,
};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::keys::{self, PREFIX};
use crate::repository::{KeyValueStore, Storage, StorageError};

/// Nominal budget a browser-style store offers, used for usage reporting only.
pub const STORAGE_BUDGET_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageUsage {
    pub used_bytes: usize,
    pub budget_bytes: usize,
    pub percentage: u32,
}

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

#[derive(Clone)]
pub struct HistoryRepository {
    kv: Arc<dyn KeyValueStore>,
}

impl HistoryRepository {
    #[must_use]
    pub fn new(storage: &Storage) -> Self {
        Self {
            kv: Arc::clone(&storage.kv),
        }
    }

    async fn read_json<T: DeserializeOwned + Default>(
        &self,
        key: &str,
    ) -> Result<T, StorageError> {
        match self.kv.get(key).await? {
            Some(raw) => serde_json::from_str(&raw).map_err(ser),
            None => Ok(T::default()),
        }
    }

    async fn write_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let raw = serde_json::to_string(value).map_err(ser)?;
        self.kv.set(key, &raw).await
    }

    /// Stored history for `bank`, oldest first. Absent means empty.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if the stored value is corrupt.
    pub async fn history(&self, bank: &BankId) -> Result<Vec<HistoryEntry>, StorageError> {
        self.read_json(&keys::history_key(bank)).await
    }

    /// Appends one entry, evicting the oldest beyond the cap.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the existing history cannot be read or the
    /// write fails. A corrupt existing value is left untouched.
    pub async fn append_history(
        &self,
        bank: &BankId,
        entry: HistoryEntry,
    ) -> Result<(), StorageError> {
        let mut history = self.history(bank).await?;
        push_capped(&mut history, entry);
        self.write_json(&keys::history_key(bank), &history).await?;
        debug!(bank = %bank, entries = history.len(), "history appended");
        Ok(())
    }

    /// Per-question tallies for `bank`. Absent means empty.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if the stored value is corrupt.
    pub async fn question_stats(&self, bank: &BankId) -> Result<QuestionStats, StorageError> {
        self.read_json(&keys::stats_key(bank)).await
    }

    /// Folds session outcomes into the stored tallies.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if reading or writing the stats fails.
    pub async fn record_outcomes(
        &self,
        bank: &BankId,
        outcomes: &[ItemOutcome],
    ) -> Result<(), StorageError> {
        let mut stats = self.question_stats(bank).await?;
        fold_outcomes(&mut stats, outcomes);
        self.write_json(&keys::stats_key(bank), &stats).await
    }

    /// Overwrites the stored history.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the write fails.
    pub async fn replace_history(
        &self,
        bank: &BankId,
        history: &[HistoryEntry],
    ) -> Result<(), StorageError> {
        self.write_json(&keys::history_key(bank), &history).await
    }

    /// Overwrites the stored stats.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the write fails.
    pub async fn replace_stats(
        &self,
        bank: &BankId,
        stats: &QuestionStats,
    ) -> Result<(), StorageError> {
        self.write_json(&keys::stats_key(bank), stats).await
    }

    /// Raw stored value for one key, used to restore after a failed import.
    pub(crate) async fn raw(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.kv.get(key).await
    }

    pub(crate) async fn restore_raw(
        &self,
        key: &str,
        previous: Option<&str>,
    ) -> Result<(), StorageError> {
        match previous {
            Some(value) => self.kv.set(key, value).await,
            None => self.kv.remove(key).await,
        }
    }

    /// Removes history and stats for one bank.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if a removal fails.
    pub async fn clear_bank(&self, bank: &BankId) -> Result<(), StorageError> {
        self.kv.remove(&keys::history_key(bank)).await?;
        self.kv.remove(&keys::stats_key(bank)).await
    }

    /// Removes every key this application owns; returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if listing or a removal fails.
    pub async fn clear_all(&self) -> Result<usize, StorageError> {
        let owned = self.kv.list_keys(PREFIX).await?;
        for key in &owned {
            self.kv.remove(key).await?;
        }
        debug!(removed = owned.len(), "cleared stored quiz data");
        Ok(owned.len())
    }

    /// Banks that have a history key, in key order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if listing fails.
    pub async fn banks_with_history(&self) -> Result<Vec<BankId>, StorageError> {
        Ok(self
            .kv
            .list_keys(PREFIX)
            .await?
            .iter()
            .filter_map(|key| keys::bank_from_history_key(key))
            .collect())
    }

    /// Bytes held by owned keys and values against [`STORAGE_BUDGET_BYTES`].
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if listing or reading fails.
    pub async fn storage_usage(&self) -> Result<StorageUsage, StorageError> {
        let mut used_bytes = 0;
        for key in self.kv.list_keys(PREFIX).await? {
            let value_len = self.kv.get(&key).await?.map_or(0, |v| v.len());
            used_bytes += key.len() + value_len;
        }
        Ok(StorageUsage {
            used_bytes,
            budget_bytes: STORAGE_BUDGET_BYTES,
            percentage: percent(used_bytes, STORAGE_BUDGET_BYTES),
        })
    }
}
