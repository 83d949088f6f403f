use std::fmt;

use chrono::{DateTime, Duration, Utc};
use quiz_core::model::{BankId, HistoryEntry, ItemOutcome, ModeId, QuestionId, Verdict, percent};
use storage::{HistoryRepository, Storage};

const MODES: [&str; 4] = ["multiple-choice", "true-false", "flashcard", "matching-stage"];

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    bank: BankId,
    attempts: u32,
    questions: u32,
    now: Option<DateTime<Utc>>,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidBank { raw: String },
    InvalidAttempts { raw: String },
    InvalidQuestions { raw: String },
    InvalidDbUrl { raw: String },
    InvalidNow { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidBank { raw } => write!(f, "invalid --bank value: {raw:?}"),
            ArgsError::InvalidAttempts { raw } => write!(f, "invalid --attempts value: {raw}"),
            ArgsError::InvalidQuestions { raw } => write!(f, "invalid --questions value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidNow { raw } => {
                write!(f, "invalid --now value (expected RFC3339): {raw}")
            }
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url =
            std::env::var("QUIZ_DB_URL").unwrap_or_else(|_| "sqlite://quiz.sqlite3".into());
        let mut bank = BankId::new("sample");
        let mut attempts = 6;
        let mut questions = 10;
        let mut now: Option<DateTime<Utc>> = None;

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--bank" => {
                    let value = require_value(&mut args, "--bank")?;
                    bank = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidBank { raw: value.clone() })?;
                }
                "--attempts" => {
                    let value = require_value(&mut args, "--attempts")?;
                    attempts = value
                        .parse::<u32>()
                        .map_err(|_| ArgsError::InvalidAttempts { raw: value.clone() })?;
                }
                "--questions" => {
                    let value = require_value(&mut args, "--questions")?;
                    questions = value
                        .parse::<u32>()
                        .ok()
                        .filter(|n| *n > 0)
                        .ok_or(ArgsError::InvalidQuestions { raw: value.clone() })?;
                }
                "--now" => {
                    let value = require_value(&mut args, "--now")?;
                    let parsed = DateTime::parse_from_rfc3339(&value)
                        .map_err(|_| ArgsError::InvalidNow { raw: value.clone() })?
                        .with_timezone(&Utc);
                    now = Some(parsed);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            bank,
            attempts,
            questions,
            now,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite://quiz.sqlite3)");
    eprintln!("  --bank <id>               Bank id to seed (default: sample)");
    eprintln!("  --attempts <n>            History entries to append (default: 6)");
    eprintln!("  --questions <n>           Questions per attempt (default: 10)");
    eprintln!("  --now <rfc3339>           Fixed current time for deterministic seeding");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  QUIZ_DB_URL");
}

/// Scores climb by one per attempt from half the total, wrapping past it.
fn synthetic_attempt(
    index: u32,
    questions: u32,
    at: DateTime<Utc>,
) -> (HistoryEntry, Vec<ItemOutcome>) {
    let total = questions as usize;
    let score = (index as usize + total / 2) % (total + 1);
    let outcomes = (0..total)
        .map(|q| {
            let verdict = Verdict::from_correct(q < score);
            ItemOutcome::new(QuestionId::new(q as u64 + 1), verdict)
        })
        .collect();
    let entry = HistoryEntry {
        date: at,
        mode: ModeId::new(MODES[index as usize % MODES.len()]),
        score,
        total,
        percentage: percent(score, total),
        time_spent: 30 + u64::from(index) * 7,
        mistakes_count: total - score,
    };
    (entry, outcomes)
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let storage = Storage::sqlite(&args.db_url).await?;
    let repo = HistoryRepository::new(&storage);
    let now = args.now.unwrap_or_else(Utc::now);

    for i in 0..args.attempts {
        let days_ago = i64::from(args.attempts - i);
        let (entry, outcomes) = synthetic_attempt(i, args.questions, now - Duration::days(days_ago));
        repo.append_history(&args.bank, entry).await?;
        repo.record_outcomes(&args.bank, &outcomes).await?;
    }

    println!(
        "Seeded bank {} with {} attempts of {} questions into {}",
        args.bank, args.attempts, args.questions, args.db_url
    );

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
