//! Read-side statistics over persisted history and per-question tallies.
//!
//! Every function here is pure and tolerates empty input.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{HistoryEntry, QuestionId, QuestionStat, QuestionStats, percent};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistorySummary {
    pub attempts: usize,
    /// Newest first.
    pub history: Vec<HistoryEntry>,
    pub best_score: u32,
    pub average_score: u32,
    pub last_attempt: Option<HistoryEntry>,
    /// Newest percentage minus oldest percentage.
    pub improvement: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HardQuestion {
    pub question_id: QuestionId,
    pub attempts: u64,
    pub correct: u64,
    pub incorrect: u64,
    pub error_rate: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalSummary {
    pub total_banks: usize,
    pub total_attempts: usize,
    pub total_questions: usize,
    pub total_correct: usize,
    pub total_time_spent: u64,
    pub average_percentage: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub date: DateTime<Utc>,
    pub percentage: u32,
}

/// Summarizes one bank's history. An empty history yields the zeroed summary.
#[must_use]
pub fn summarize(history: &[HistoryEntry]) -> HistorySummary {
    if history.is_empty() {
        return HistorySummary::default();
    }
    let mut sorted = history.to_vec();
    sorted.sort_by(|a, b| b.date.cmp(&a.date));

    let scores: Vec<u32> = sorted.iter().map(|h| h.percentage).collect();
    let best_score = scores.iter().copied().max().unwrap_or(0);
    let sum: usize = scores.iter().map(|&s| s as usize).sum();
    let average_score = percent(sum, scores.len() * 100);

    let improvement = match (sorted.first(), sorted.last()) {
        (Some(newest), Some(oldest)) if sorted.len() > 1 => {
            i64::from(newest.percentage) - i64::from(oldest.percentage)
        }
        _ => 0,
    };

    HistorySummary {
        attempts: sorted.len(),
        last_attempt: sorted.first().cloned(),
        history: sorted,
        best_score,
        average_score,
        improvement,
    }
}

/// Exact comparison of `incorrect / attempts`, higher rate first.
fn compare_error_rate(a: &QuestionStat, b: &QuestionStat) -> Ordering {
    let lhs = u128::from(b.incorrect) * u128::from(a.attempts.max(1));
    let rhs = u128::from(a.incorrect) * u128::from(b.attempts.max(1));
    match (a.attempts, b.attempts) {
        (0, 0) => Ordering::Equal,
        (0, _) => Ordering::Greater,
        (_, 0) => Ordering::Less,
        _ => lhs.cmp(&rhs),
    }
}

/// Questions ranked by error rate descending, then attempts descending, then
/// id ascending; at most `limit` rows.
#[must_use]
pub fn hardest_questions(stats: &QuestionStats, limit: usize) -> Vec<HardQuestion> {
    let mut rows: Vec<(&QuestionId, &QuestionStat)> = stats.iter().collect();
    rows.sort_by(|(id_a, a), (id_b, b)| {
        compare_error_rate(a, b)
            .then_with(|| b.attempts.cmp(&a.attempts))
            .then_with(|| id_a.cmp(id_b))
    });
    rows.into_iter()
        .take(limit)
        .map(|(id, stat)| HardQuestion {
            question_id: *id,
            attempts: stat.attempts,
            correct: stat.correct,
            incorrect: stat.incorrect,
            error_rate: error_rate(stat),
        })
        .collect()
}

fn error_rate(stat: &QuestionStat) -> u32 {
    let incorrect = usize::try_from(stat.incorrect).unwrap_or(usize::MAX);
    let attempts = usize::try_from(stat.attempts).unwrap_or(usize::MAX);
    percent(incorrect, attempts)
}

/// Totals across banks; banks with empty history are ignored.
#[must_use]
pub fn global_summary<'a, I>(histories: I) -> GlobalSummary
where
    I: IntoIterator<Item = &'a [HistoryEntry]>,
{
    let mut summary = GlobalSummary::default();
    for history in histories.into_iter().filter(|h| !h.is_empty()) {
        summary.total_banks += 1;
        for attempt in history {
            summary.total_attempts += 1;
            summary.total_questions += attempt.total;
            summary.total_correct += attempt.score;
            summary.total_time_spent += attempt.time_spent;
        }
    }
    summary.average_percentage = percent(summary.total_correct, summary.total_questions);
    summary
}

/// Oldest-first `(date, percentage)` series.
#[must_use]
pub fn chart_points(history: &[HistoryEntry]) -> Vec<ChartPoint> {
    let mut points: Vec<ChartPoint> = history
        .iter()
        .map(|h| ChartPoint {
            date: h.date,
            percentage: h.percentage,
        })
        .collect();
    points.sort_by_key(|p| p.date);
    points
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
