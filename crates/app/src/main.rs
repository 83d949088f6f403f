mod args;
mod play;

use std::path::Path;

use quiz_core::Clock;
use quiz_core::model::Bank;
use quiz_core::modes::RegistrySettings;
use services::QuizServices;
use storage::Storage;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::args::{Args, ArgsError, Command, StoreTarget, bank_id_for, print_usage};

const DEFAULT_LOG_FILTER: &str = "app=info,services=info";

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_settings(path: Option<&Path>) -> Result<RegistrySettings, Box<dyn std::error::Error>> {
    let Some(path) = path else {
        return Ok(RegistrySettings::default());
    };
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

async fn open_services(
    store: &StoreTarget,
    settings: RegistrySettings,
) -> Result<QuizServices, Box<dyn std::error::Error>> {
    let clock = Clock::default();
    match store {
        StoreTarget::Memory => Ok(QuizServices::from_storage(
            &Storage::in_memory(),
            clock,
            settings,
        )?),
        StoreTarget::Sqlite(url) => {
            prepare_sqlite_file(url)?;
            info!(db = %url, "opening store");
            Ok(QuizServices::new_sqlite(url, clock, settings).await?)
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = match Args::parse(std::env::args().skip(1), std::env::var("QUIZ_DB_URL").ok()) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{e}");
            print_usage();
            std::process::exit(2);
        }
    };

    match args.command {
        Command::Help => print_usage(),
        Command::Run(run) => {
            let settings = load_settings(run.settings_path.as_deref())?;
            let services = open_services(&args.store, settings).await?;
            let bank_id = bank_id_for(&run.bank_path)?;
            let text = std::fs::read_to_string(&run.bank_path)?;
            let bank = Bank::from_json(bank_id, &text)?;
            if bank.rejected() > 0 {
                warn!(
                    bank = %bank.id(),
                    rejected = bank.rejected(),
                    total = bank.total_entries(),
                    "some bank entries were not questions"
                );
            }
            let mut controller = services.controller(bank);
            let mut lines = play::stdin_lines();
            play::play(&mut controller, &run, &mut lines).await?;
        }
        Command::Stats { bank, limit } => {
            let services = open_services(&args.store, RegistrySettings::default()).await?;
            let stats = services.stats();
            let global = stats.global_stats().await?;
            println!(
                "{} banks, {} attempts, {}/{} correct, average {}%, {}s spent",
                global.total_banks,
                global.total_attempts,
                global.total_correct,
                global.total_questions,
                global.average_percentage,
                global.total_time_spent
            );
            if let Some(bank) = bank {
                let summary = stats.bank_stats(&bank).await?.summary;
                println!(
                    "{bank}: {} attempts, best {}%, average {}%, improvement {:+}",
                    summary.attempts, summary.best_score, summary.average_score, summary.improvement
                );
                for point in stats.chart_points(&bank).await? {
                    println!("  {}  {}%", point.date.format("%Y-%m-%d %H:%M"), point.percentage);
                }
                let hardest = stats.hardest_questions(&bank, limit).await?;
                if !hardest.is_empty() {
                    println!("Hardest questions:");
                }
                for hard in hardest {
                    println!(
                        "  #{}  {}% wrong over {} attempts",
                        hard.question_id, hard.error_rate, hard.attempts
                    );
                }
            }
            let usage = stats.storage_usage().await?;
            println!(
                "Storage: {} of {} bytes ({}%)",
                usage.used_bytes, usage.budget_bytes, usage.percentage
            );
        }
        Command::Export { out } => {
            let services = open_services(&args.store, RegistrySettings::default()).await?;
            let snapshot = services.stats().export_data().await?;
            for skipped in &snapshot.skipped {
                warn!(bank = %skipped.bank, reason = %skipped.reason, "bank not exported");
            }
            let json = serde_json::to_string_pretty(&snapshot)?;
            match out {
                Some(path) => {
                    std::fs::write(&path, json)?;
                    info!(path = %path.display(), banks = snapshot.tests.len(), "exported");
                }
                None => println!("{json}"),
            }
        }
        Command::Import { path } => {
            let services = open_services(&args.store, RegistrySettings::default()).await?;
            let raw = std::fs::read_to_string(&path)?;
            let payload: serde_json::Value = serde_json::from_str(&raw)?;
            let report = services.stats().import_data(&payload).await?;
            println!("Imported {} bank(s).", report.imported.len());
            for rejected in &report.rejected {
                println!("Skipped {}: {}", rejected.bank, rejected.reason);
            }
        }
        Command::Clear { bank } => {
            let services = open_services(&args.store, RegistrySettings::default()).await?;
            match bank {
                Some(bank) => {
                    services.stats().clear_bank(&bank).await?;
                    println!("Cleared {bank}.");
                }
                None => {
                    let removed = services.stats().clear_all().await?;
                    println!("Removed {removed} stored value(s).");
                }
            }
        }
    }

    Ok(())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
