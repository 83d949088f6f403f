use serde::{Deserialize, Serialize};
use serde_json::Value;

use quiz_core::Clock;
use quiz_core::analytics::{
    self, ChartPoint, GlobalSummary, HardQuestion, HistorySummary,
};
use quiz_core::model::{BankId, QuestionStats};
use storage::snapshot::{ImportReport, Snapshot};
use storage::{HistoryRepository, StorageError, StorageUsage};
use tracing::warn;

use crate::error::StatsError;

/// Everything the statistics screen shows for one bank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankStats {
    #[serde(flatten)]
    pub summary: HistorySummary,
    pub question_stats: QuestionStats,
}

/// Read-side statistics plus the data-management actions of the stats screen.
#[derive(Clone)]
pub struct StatsService {
    clock: Clock,
    history: HistoryRepository,
}

impl StatsService {
    #[must_use]
    pub fn new(clock: Clock, history: HistoryRepository) -> Self {
        Self { clock, history }
    }

    /// # Errors
    ///
    /// Returns `StatsError::Storage` if stored data cannot be read.
    pub async fn bank_stats(&self, bank: &BankId) -> Result<BankStats, StatsError> {
        let history = self.history.history(bank).await?;
        let question_stats = self.history.question_stats(bank).await?;
        Ok(BankStats {
            summary: analytics::summarize(&history),
            question_stats,
        })
    }

    /// # Errors
    ///
    /// Returns `StatsError::Storage` if stored stats cannot be read.
    pub async fn hardest_questions(
        &self,
        bank: &BankId,
        limit: usize,
    ) -> Result<Vec<HardQuestion>, StatsError> {
        let stats = self.history.question_stats(bank).await?;
        Ok(analytics::hardest_questions(&stats, limit))
    }

    /// Totals over every bank with non-empty history. A bank whose history
    /// cannot be parsed is left out.
    ///
    /// # Errors
    ///
    /// Returns `StatsError::Storage` if listing or reading the store fails.
    pub async fn global_stats(&self) -> Result<GlobalSummary, StatsError> {
        let mut histories = Vec::new();
        for bank in self.history.banks_with_history().await? {
            match self.history.history(&bank).await {
                Ok(history) => histories.push(history),
                Err(StorageError::Serialization(reason)) => {
                    warn!(bank = %bank, %reason, "bank left out of global stats");
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(analytics::global_summary(histories.iter().map(Vec::as_slice)))
    }

    /// # Errors
    ///
    /// Returns `StatsError::Storage` if the history cannot be read.
    pub async fn chart_points(&self, bank: &BankId) -> Result<Vec<ChartPoint>, StatsError> {
        let history = self.history.history(bank).await?;
        Ok(analytics::chart_points(&history))
    }

    /// # Errors
    ///
    /// Returns `StatsError::Storage` on store failure.
    pub async fn storage_usage(&self) -> Result<StorageUsage, StatsError> {
        Ok(self.history.storage_usage().await?)
    }

    /// # Errors
    ///
    /// Returns `StatsError::Storage` on store failure.
    pub async fn clear_bank(&self, bank: &BankId) -> Result<(), StatsError> {
        Ok(self.history.clear_bank(bank).await?)
    }

    /// Returns how many keys were removed.
    ///
    /// # Errors
    ///
    /// Returns `StatsError::Storage` on store failure.
    pub async fn clear_all(&self) -> Result<usize, StatsError> {
        Ok(self.history.clear_all().await?)
    }

    /// # Errors
    ///
    /// Returns `StatsError::Storage` if stored data cannot be read.
    pub async fn export_data(&self) -> Result<Snapshot, StatsError> {
        Ok(self.history.export_snapshot(self.clock.now()).await?)
    }

    /// # Errors
    ///
    /// Returns `StatsError::Import` when the payload has no `tests` object.
    /// Per-bank problems are listed in the report instead.
    pub async fn import_data(&self, payload: &Value) -> Result<ImportReport, StatsError> {
        Ok(self.history.import_snapshot(payload).await?)
    }
}
