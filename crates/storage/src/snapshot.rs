//! Export and import of every bank's history and stats as one JSON document.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use quiz_core::model::{BankId, HistoryEntry, QuestionStats};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::history::HistoryRepository;
use crate::keys;
use crate::repository::StorageError;

/// Format version written into every export.
pub const SNAPSHOT_VERSION: &str = "0.3.0";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankSnapshot {
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    #[serde(default)]
    pub stats: QuestionStats,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub version: String,
    pub export_date: DateTime<Utc>,
    pub tests: BTreeMap<BankId, BankSnapshot>,
    /// Banks left out because their stored data could not be parsed.
    #[serde(skip)]
    pub skipped: Vec<RejectedBank>,
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ImportError {
    #[error("snapshot has no `tests` object")]
    MissingTests,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedBank {
    pub bank: String,
    pub reason: String,
}

/// Per-bank result of an import.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub imported: Vec<BankId>,
    pub rejected: Vec<RejectedBank>,
}

impl ImportReport {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.rejected.is_empty()
    }
}

impl HistoryRepository {
    /// Collects every bank with stored history.
    ///
    /// A bank whose history or stats cannot be parsed is left out and listed
    /// in [`Snapshot::skipped`]; the others are still exported.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if listing or reading the store fails.
    pub async fn export_snapshot(&self, now: DateTime<Utc>) -> Result<Snapshot, StorageError> {
        let mut tests = BTreeMap::new();
        let mut skipped = Vec::new();
        for bank in self.banks_with_history().await? {
            match self.export_bank(&bank).await {
                Ok(entry) => {
                    tests.insert(bank, entry);
                }
                Err(StorageError::Serialization(reason)) => {
                    warn!(bank = %bank, %reason, "bank skipped during export");
                    skipped.push(RejectedBank {
                        bank: bank.to_string(),
                        reason,
                    });
                }
                Err(err) => return Err(err),
            }
        }
        Ok(Snapshot {
            version: SNAPSHOT_VERSION.to_string(),
            export_date: now,
            tests,
            skipped,
        })
    }

    async fn export_bank(&self, bank: &BankId) -> Result<BankSnapshot, StorageError> {
        Ok(BankSnapshot {
            history: self.history(bank).await?,
            stats: self.question_stats(bank).await?,
        })
    }

    /// Applies a snapshot bank by bank.
    ///
    /// A bank whose entry is malformed is skipped whole and reported; the
    /// others are still applied. Within a bank, `history` and `stats` are
    /// each optional and only present fields are written.
    ///
    /// # Errors
    ///
    /// Returns `ImportError::MissingTests` when the payload has no `tests`
    /// object, before anything is written.
    pub async fn import_snapshot(&self, payload: &Value) -> Result<ImportReport, ImportError> {
        let tests = payload
            .get("tests")
            .and_then(Value::as_object)
            .ok_or(ImportError::MissingTests)?;

        let mut report = ImportReport::default();
        for (raw_id, entry) in tests {
            match self.import_bank(raw_id, entry).await {
                Ok(bank) => report.imported.push(bank),
                Err(reason) => {
                    warn!(bank = %raw_id, %reason, "bank skipped during import");
                    report.rejected.push(RejectedBank {
                        bank: raw_id.clone(),
                        reason,
                    });
                }
            }
        }
        info!(
            imported = report.imported.len(),
            rejected = report.rejected.len(),
            "snapshot imported"
        );
        Ok(report)
    }

    async fn import_bank(&self, raw_id: &str, entry: &Value) -> Result<BankId, String> {
        let bank: BankId = raw_id
            .parse()
            .map_err(|_| "bank id is blank".to_string())?;
        let Some(fields) = entry.as_object() else {
            return Err("entry is not an object".to_string());
        };

        let history = fields
            .get("history")
            .map(|v| serde_json::from_value::<Vec<HistoryEntry>>(v.clone()))
            .transpose()
            .map_err(|e| format!("history: {e}"))?;
        let stats = fields
            .get("stats")
            .map(|v| serde_json::from_value::<QuestionStats>(v.clone()))
            .transpose()
            .map_err(|e| format!("stats: {e}"))?;

        let history_key = keys::history_key(&bank);
        let previous_history = self.raw(&history_key).await.map_err(|e| e.to_string())?;

        if let Some(history) = &history {
            self.replace_history(&bank, history)
                .await
                .map_err(|e| e.to_string())?;
        }
        if let Some(stats) = &stats
            && let Err(err) = self.replace_stats(&bank, stats).await
        {
            if history.is_some()
                && let Err(restore) = self
                    .restore_raw(&history_key, previous_history.as_deref())
                    .await
            {
                warn!(bank = %bank, error = %restore, "could not restore history after failed import");
            }
            return Err(err.to_string());
        }
        Ok(bank)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::Storage;
    use quiz_core::model::{ItemOutcome, ModeId, QuestionId, Verdict};
    use quiz_core::time::fixed_now;
    use serde_json::json;

    fn entry() -> HistoryEntry {
        HistoryEntry {
            date: fixed_now(),
            mode: ModeId::new("flashcard"),
            score: 2,
            total: 2,
            percentage: 100,
            time_spent: 5,
            mistakes_count: 0,
        }
    }

    #[tokio::test]
    async fn export_lists_banks_with_history() {
        let repo = HistoryRepository::new(&Storage::in_memory());
        let bank = BankId::new("b");
        repo.append_history(&bank, entry()).await.unwrap();
        repo.record_outcomes(&bank, &[ItemOutcome::new(QuestionId::new(1), Verdict::Correct)])
            .await
            .unwrap();
        // stats alone do not make a bank exportable
        repo.record_outcomes(
            &BankId::new("stats-only"),
            &[ItemOutcome::new(QuestionId::new(1), Verdict::Correct)],
        )
        .await
        .unwrap();

        let snapshot = repo.export_snapshot(fixed_now()).await.unwrap();
        assert_eq!(snapshot.version, SNAPSHOT_VERSION);
        assert_eq!(snapshot.tests.len(), 1);
        assert_eq!(snapshot.tests[&bank].history, vec![entry()]);

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["exportDate"], "2023-11-14T22:13:20Z");
        assert!(json["tests"]["b"]["stats"]["1"].is_object());
    }

    #[tokio::test]
    async fn export_skips_unreadable_banks() {
        let storage = Storage::in_memory();
        let repo = HistoryRepository::new(&storage);
        repo.append_history(&BankId::new("good"), entry()).await.unwrap();
        storage
            .kv
            .set("quiz_broken_history", "{not json")
            .await
            .unwrap();
        storage
            .kv
            .set(
                "quiz_old_history",
                r#"[{"date":"2024-01-02T00:00:00.000Z","score":3,"correctCount":3,"totalQuestions":4,"timeSpent":9,"percentage":75}]"#,
            )
            .await
            .unwrap();

        let snapshot = repo.export_snapshot(fixed_now()).await.unwrap();
        let exported: Vec<&str> = snapshot.tests.keys().map(BankId::as_str).collect();
        assert_eq!(exported, vec!["good", "old"]);
        assert_eq!(snapshot.tests[&BankId::new("old")].history[0].total, 4);
        assert_eq!(snapshot.skipped.len(), 1);
        assert_eq!(snapshot.skipped[0].bank, "broken");

        let json = serde_json::to_value(&snapshot).unwrap();
        assert!(json.get("skipped").is_none());
    }

    #[tokio::test]
    async fn legacy_history_imports_and_reads() {
        let repo = HistoryRepository::new(&Storage::in_memory());
        let payload = json!({
            "tests": {
                "old": {
                    "history": [{
                        "date": "2024-01-02T00:00:00.000Z",
                        "score": 3,
                        "correctCount": 3,
                        "totalQuestions": 4,
                        "timeSpent": 9,
                        "percentage": 75
                    }],
                    "stats": {}
                }
            }
        });
        let report = repo.import_snapshot(&payload).await.unwrap();
        assert_eq!(report.imported, vec![BankId::new("old")]);
        assert!(report.is_complete());

        let bank = BankId::new("old");
        let history = repo.history(&bank).await.unwrap();
        assert_eq!(history[0].mode, ModeId::new(quiz_core::model::LEGACY_MODE));
        assert_eq!((history[0].score, history[0].total), (3, 4));
        repo.append_history(&bank, entry()).await.unwrap();
        assert_eq!(repo.history(&bank).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn import_without_tests_is_rejected() {
        let repo = HistoryRepository::new(&Storage::in_memory());
        let err = repo.import_snapshot(&json!({ "version": "0.3.0" })).await.unwrap_err();
        assert!(matches!(err, ImportError::MissingTests));
    }

    #[tokio::test]
    async fn malformed_bank_is_skipped_and_reported() {
        let repo = HistoryRepository::new(&Storage::in_memory());
        let payload = json!({
            "tests": {
                "good": { "history": [serde_json::to_value(entry()).unwrap()] },
                "bad": { "history": [{ "date": "nope" }], "stats": {} },
                "odd": 7
            }
        });
        let report = repo.import_snapshot(&payload).await.unwrap();
        assert_eq!(report.imported, vec![BankId::new("good")]);
        let rejected: Vec<&str> = report.rejected.iter().map(|r| r.bank.as_str()).collect();
        assert_eq!(rejected, vec!["bad", "odd"]);
        assert!(!report.is_complete());

        assert!(repo.history(&BankId::new("bad")).await.unwrap().is_empty());
        assert!(repo.question_stats(&BankId::new("bad")).await.unwrap().is_empty());
        assert_eq!(repo.history(&BankId::new("good")).await.unwrap(), vec![entry()]);
    }
}
