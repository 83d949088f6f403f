use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use quiz_core::model::{
    Answer, Bank, BankId, ModeId, ModeSummary, Question, QuestionId, Termination,
};
use quiz_core::modes::{
    Outcome, RegistrySettings, Response, SessionItem, SessionOptions, StatementSource,
};
use quiz_core::time::{fixed_clock, fixed_now};
use quiz_core::ConfigError;
use services::{ControllerError, QuizServices, SaveStatus, Screen, SessionController};
use storage::{HistoryRepository, KeyValueStore, Storage, StorageError};

fn question(id: u64, wrong: usize) -> Question {
    let mut answers = vec![Answer::correct(format!("A{id}"))];
    answers.extend((1..=wrong).map(|w| Answer::incorrect(format!("W{id}.{w}"))));
    Question::new(QuestionId::new(id), format!("Q{id}?"), answers)
}

fn bank(count: u64, wrong: usize) -> Bank {
    Bank::new(
        BankId::new("flow"),
        "Flow",
        (1..=count).map(|id| question(id, wrong)).collect(),
    )
}

fn services(storage: &Storage) -> QuizServices {
    QuizServices::from_storage(storage, fixed_clock(), RegistrySettings::default()).unwrap()
}

fn options(count: u32) -> SessionOptions {
    SessionOptions {
        question_count: Some(count),
        seed: Some(11),
        ..SessionOptions::default()
    }
}

fn running_controller(
    storage: &Storage,
    bank: Bank,
    mode: &str,
    opts: &SessionOptions,
) -> SessionController {
    let mut controller = services(storage).controller(bank);
    if controller.screen() == Screen::ModeSelect {
        controller.select_mode(&ModeId::new(mode)).unwrap();
    }
    controller.start(opts).unwrap();
    assert_eq!(controller.screen(), Screen::Running);
    controller
}

#[tokio::test]
async fn multiple_choice_all_wrong_scores_zero_and_is_saved() {
    let storage = Storage::in_memory();
    let mut controller = running_controller(&storage, bank(10, 3), "multiple-choice", &options(10));

    while controller.screen() == Screen::Running {
        let Some(SessionItem::Choice(item)) = controller.current_item() else {
            panic!("expected a choice item");
        };
        let wrong = item
            .choices
            .iter()
            .find(|c| c.canonical_index != 0)
            .unwrap()
            .canonical_index;
        controller.submit(Response::Choose { index: wrong }).await.unwrap();
        controller.submit(Response::Advance).await.unwrap();
    }

    let completed = controller.completed().unwrap();
    assert_eq!(completed.result.percentage, 0);
    assert_eq!(completed.result.mistake_count, 10);
    assert_eq!(completed.save, SaveStatus::Saved);

    let repo = HistoryRepository::new(&storage);
    let history = repo.history(&BankId::new("flow")).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].mistakes_count, 10);
    let stats = repo.question_stats(&BankId::new("flow")).await.unwrap();
    assert_eq!(stats.len(), 10);
    assert!(stats.values().all(|s| s.incorrect == 1 && s.correct == 0));
}

#[tokio::test]
async fn flashcard_review_queue_reaches_full_score() {
    let storage = Storage::in_memory();
    let opts = SessionOptions {
        repeat_unknown: Some(true),
        max_mistakes: Some(0),
        ..options(5)
    };
    let mut controller = running_controller(&storage, bank(5, 1), "flashcard", &opts);

    while controller.screen() == Screen::Running {
        let Some(SessionItem::Card(card)) = controller.current_item() else {
            panic!("expected a card");
        };
        controller.submit(Response::Reveal).await.unwrap();
        controller
            .submit(Response::Assess {
                known: card.from_review,
            })
            .await
            .unwrap();
    }

    let result = &controller.completed().unwrap().result;
    assert_eq!(result.percentage, 100);
    assert!(matches!(
        result.summary,
        ModeSummary::Flashcard { known_cards: 5, pending_reviews: 0 }
    ));
    assert!(!result.mistake_limit_reached());
}

#[tokio::test]
async fn matching_single_stage_all_correct_advances_to_results() {
    let storage = Storage::in_memory();
    let opts = SessionOptions {
        pairs_per_stage: Some(3),
        ..options(3)
    };
    let mut controller = running_controller(&storage, bank(3, 1), "matching-stage", &opts);

    let Some(SessionItem::Stage(stage)) = controller.current_item() else {
        panic!("expected a stage");
    };
    for entry in &stage.left {
        let expected = format!("A{}", entry.question_id);
        let slot = stage.right.iter().find(|s| s.text == expected).unwrap().slot;
        controller
            .submit(Response::Arm {
                question: entry.question_id,
            })
            .await
            .unwrap();
        controller.submit(Response::Bind { slot }).await.unwrap();
    }
    let outcome = controller.submit(Response::CheckStage).await.unwrap();
    let Outcome::StageChecked(report) = outcome else {
        panic!("expected a stage report");
    };
    assert_eq!(report.stage_mistakes, 0);

    assert_eq!(controller.screen(), Screen::Results);
    let result = &controller.completed().unwrap().result;
    assert_eq!(result.mistake_count, 0);
    assert_eq!(result.percentage, 100);
}

#[tokio::test]
async fn true_false_lone_question_without_wrong_answers_still_runs() {
    let storage = Storage::in_memory();
    let lone = Bank::new(
        BankId::new("lone"),
        "Lone",
        vec![Question::new(
            QuestionId::new(1),
            "Q1?",
            vec![Answer::correct("yes")],
        )],
    );
    let mut controller = running_controller(&storage, lone, "true-false", &options(1));

    let Some(SessionItem::Statement(item)) = controller.current_item() else {
        panic!("expected a statement");
    };
    let degraded = item.source == StatementSource::Degraded;
    assert_eq!(item.inconsistent, degraded);

    let Outcome::Judged(judgement) = controller
        .submit(Response::Judge { value: true })
        .await
        .unwrap()
    else {
        panic!("expected a judgement");
    };
    assert!(judgement.correct);
    controller.submit(Response::Advance).await.unwrap();

    let result = &controller.completed().unwrap().result;
    assert_eq!(result.correct_count, 1);
    let ModeSummary::TrueFalse { inconsistent_items } = result.summary else {
        panic!("expected a true/false summary");
    };
    assert_eq!(inconsistent_items, usize::from(degraded));
}

#[tokio::test]
async fn malformed_bank_leaves_no_mode_to_select() {
    let storage = Storage::in_memory();
    let broken = Bank::from_json(BankId::new("broken"), r#"{ "questions": "nope" }"#).unwrap();
    let mut controller = services(&storage).controller(broken);

    assert_eq!(controller.screen(), Screen::ModeSelect);
    assert!(!controller.has_supported_modes());
    assert!(matches!(
        controller.select_mode(&ModeId::new("flashcard")),
        Err(ControllerError::NoSupportedModes)
    ));
}

#[tokio::test]
async fn single_supported_mode_skips_selection() {
    let storage = Storage::in_memory();
    let settings = RegistrySettings::default()
        .disable("true-false")
        .disable("flashcard")
        .disable("matching-stage");
    let services = QuizServices::from_storage(&storage, fixed_clock(), settings).unwrap();
    let controller = services.controller(bank(4, 2));

    assert_eq!(controller.screen(), Screen::Setup);
    let info = controller.setup_info().unwrap();
    assert_eq!(info.mode.id, ModeId::new("multiple-choice"));
    assert_eq!(info.available, 4);
}

#[tokio::test]
async fn screens_reject_out_of_order_actions() {
    let storage = Storage::in_memory();
    let mut controller = services(&storage).controller(bank(3, 2));
    assert_eq!(controller.supported_modes().len(), 4);

    assert!(matches!(
        controller.select_mode(&ModeId::new("essay")),
        Err(ControllerError::UnknownMode(_))
    ));
    controller.select_mode(&ModeId::new("multiple-choice")).unwrap();

    assert!(matches!(
        controller.submit(Response::Advance).await,
        Err(ControllerError::WrongScreen {
            expected: Screen::Running,
            actual: Screen::Setup
        })
    ));
    assert!(matches!(
        controller.retake(),
        Err(ControllerError::WrongScreen { .. })
    ));

    let no_categories = SessionOptions {
        categories: Some(Vec::new()),
        ..options(3)
    };
    assert!(matches!(
        controller.start(&no_categories),
        Err(ControllerError::Config(ConfigError::NoCategoriesSelected))
    ));
    assert_eq!(controller.screen(), Screen::Setup);

    controller.back().unwrap();
    assert_eq!(controller.screen(), Screen::ModeSelect);
}

#[tokio::test]
async fn time_limit_moves_to_results_and_later_ticks_are_ignored() {
    let storage = Storage::in_memory();
    let opts = SessionOptions {
        time_limit_minutes: Some(1),
        ..options(5)
    };
    let mut controller = running_controller(&storage, bank(5, 2), "multiple-choice", &opts);

    assert!(!controller.tick().await.unwrap());
    let mut clock = controller.clock();
    clock.advance(Duration::seconds(61));
    controller.set_clock(clock);

    assert!(controller.tick().await.unwrap());
    assert_eq!(controller.screen(), Screen::Results);
    let result = controller.completed().unwrap().result.clone();
    assert!(result.time_limit_reached());
    assert_eq!(result.elapsed_secs, 60);

    assert!(!controller.tick().await.unwrap());
    assert_eq!(controller.completed().unwrap().result, result);
}

#[tokio::test]
async fn end_early_then_retake_starts_a_fresh_session() {
    let storage = Storage::in_memory();
    let mut controller = running_controller(&storage, bank(4, 2), "true-false", &options(4));

    let completed = controller.end_early().await.unwrap();
    assert_eq!(completed.result.termination, Termination::EndedEarly);
    assert_eq!(completed.result.answered_items, 0);

    let info = controller.retake().unwrap();
    assert_eq!(info.mode.id, ModeId::new("true-false"));
    controller.start(&options(4)).unwrap();
    assert_eq!(controller.screen(), Screen::Running);
    assert!(controller.progress().is_some_and(|p| p.answered == 0));

    let repo = HistoryRepository::new(&storage);
    assert_eq!(repo.history(&BankId::new("flow")).await.unwrap().len(), 1);
}

//
// ─── PERSISTENCE FAILURES ──────────────────────────────────────────────────────
//

/// Reads succeed with nothing stored; writes to keys ending in `fail_suffix` fail.
struct FailingStore {
    fail_suffix: &'static str,
}

#[async_trait]
impl KeyValueStore for FailingStore {
    async fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Ok(None)
    }

    async fn set(&self, key: &str, _value: &str) -> Result<(), StorageError> {
        if key.ends_with(self.fail_suffix) {
            Err(StorageError::Rejected("quota exceeded".into()))
        } else {
            Ok(())
        }
    }

    async fn remove(&self, _key: &str) -> Result<(), StorageError> {
        Ok(())
    }

    async fn list_keys(&self, _prefix: &str) -> Result<Vec<String>, StorageError> {
        Ok(Vec::new())
    }
}

async fn finish_with_store(fail_suffix: &'static str) -> SaveStatus {
    let storage = Storage::from_store(Arc::new(FailingStore { fail_suffix }));
    let mut controller = running_controller(&storage, bank(2, 2), "multiple-choice", &options(2));
    let completed = controller.end_early().await.unwrap();
    assert_eq!(completed.result.total_items, 2);
    completed.save.clone()
}

#[tokio::test]
async fn failed_writes_are_reported_not_raised() {
    assert!(matches!(
        finish_with_store("").await,
        SaveStatus::NotSaved { .. }
    ));
    assert!(matches!(
        finish_with_store("_stats").await,
        SaveStatus::PartiallySaved { .. }
    ));
    assert_eq!(finish_with_store("never").await, SaveStatus::Saved);
}

#[tokio::test]
async fn history_entry_uses_the_controller_clock() {
    let storage = Storage::in_memory();
    let mut controller = running_controller(&storage, bank(2, 2), "flashcard", &options(2));
    let _ = controller.end_early().await.unwrap();
    let history = HistoryRepository::new(&storage)
        .history(&BankId::new("flow"))
        .await
        .unwrap();
    assert_eq!(history[0].date, fixed_now());
}
