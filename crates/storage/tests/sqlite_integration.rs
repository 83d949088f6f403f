use quiz_core::model::{BankId, HistoryEntry, ItemOutcome, ModeId, QuestionId, Verdict};
use quiz_core::time::fixed_now;
use storage::repository::{KeyValueStore, Storage};
use storage::sqlite::SqliteRepository;
use storage::HistoryRepository;

fn entry(percentage: u32) -> HistoryEntry {
    HistoryEntry {
        date: fixed_now(),
        mode: ModeId::new("matching-stage"),
        score: 4,
        total: 5,
        percentage,
        time_spent: 61,
        mistakes_count: 1,
    }
}

#[tokio::test]
async fn sqlite_store_get_set_remove() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_kv?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");
    // migrations are idempotent
    repo.migrate().await.expect("migrate twice");

    assert_eq!(repo.get("quiz_a_history").await.unwrap(), None);
    repo.set("quiz_a_history", "[]").await.unwrap();
    repo.set("quiz_a_history", "[1]").await.unwrap();
    repo.set("QUIZ_upper", "x").await.unwrap();
    repo.set("quizzes", "x").await.unwrap();
    assert_eq!(
        repo.get("quiz_a_history").await.unwrap().as_deref(),
        Some("[1]")
    );

    assert_eq!(
        repo.list_keys("quiz_").await.unwrap(),
        vec!["quiz_a_history".to_string()]
    );

    repo.remove("quiz_a_history").await.unwrap();
    repo.remove("quiz_a_history").await.unwrap();
    assert_eq!(repo.get("quiz_a_history").await.unwrap(), None);
}

#[tokio::test]
async fn sqlite_backs_history_repository() {
    let storage = Storage::sqlite("sqlite:file:memdb_history?mode=memory&cache=shared")
        .await
        .expect("storage");
    let repo = HistoryRepository::new(&storage);
    let bank = BankId::new("geo");

    repo.append_history(&bank, entry(80)).await.unwrap();
    repo.append_history(&bank, entry(100)).await.unwrap();
    repo.record_outcomes(
        &bank,
        &[
            ItemOutcome::new(QuestionId::new(1), Verdict::Correct),
            ItemOutcome::new(QuestionId::new(2), Verdict::Unconnected),
        ],
    )
    .await
    .unwrap();

    let history = repo.history(&bank).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].percentage, 100);
    let stats = repo.question_stats(&bank).await.unwrap();
    assert_eq!(stats[&QuestionId::new(2)].incorrect, 1);
    assert_eq!(repo.banks_with_history().await.unwrap(), vec![bank.clone()]);
}

#[tokio::test]
async fn export_then_import_restores_identical_values() {
    let source = Storage::sqlite("sqlite:file:memdb_export?mode=memory&cache=shared")
        .await
        .expect("source");
    let source_repo = HistoryRepository::new(&source);
    for id in ["a", "b"] {
        let bank = BankId::new(id);
        source_repo.append_history(&bank, entry(40)).await.unwrap();
        source_repo
            .record_outcomes(&bank, &[ItemOutcome::new(QuestionId::new(9), Verdict::Incorrect)])
            .await
            .unwrap();
    }

    let snapshot = source_repo.export_snapshot(fixed_now()).await.unwrap();
    let payload = serde_json::to_value(&snapshot).unwrap();

    let target = Storage::in_memory();
    let target_repo = HistoryRepository::new(&target);
    let report = target_repo.import_snapshot(&payload).await.unwrap();
    assert!(report.is_complete());
    assert_eq!(report.imported.len(), 2);

    for key in source.kv.list_keys("quiz_").await.unwrap() {
        assert_eq!(
            source.kv.get(&key).await.unwrap(),
            target.kv.get(&key).await.unwrap(),
            "value for {key} differs"
        );
    }
}
