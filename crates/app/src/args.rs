use std::fmt;
use std::path::PathBuf;

use quiz_core::model::{BankId, ModeId};
use quiz_core::modes::SessionOptions;

pub const DEFAULT_DB_URL: &str = "sqlite://quiz.sqlite3";

#[derive(Debug, PartialEq, Eq)]
pub enum ArgsError {
    MissingValue { flag: &'static str },
    MissingPositional { what: &'static str },
    UnknownArg(String),
    UnknownCommand(String),
    InvalidNumber { flag: &'static str, raw: String },
    InvalidDbUrl { raw: String },
    InvalidBankId { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingPositional { what } => write!(f, "missing {what}"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown subcommand: {cmd}"),
            ArgsError::InvalidNumber { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidBankId { raw } => write!(f, "invalid bank id: {raw:?}"),
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

fn number<T: std::str::FromStr>(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<T, ArgsError> {
    let raw = require_value(args, flag)?;
    raw.parse()
        .map_err(|_| ArgsError::InvalidNumber { flag, raw: raw.clone() })
}

/// Where results are stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreTarget {
    Sqlite(String),
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunArgs {
    pub bank_path: PathBuf,
    pub mode: Option<ModeId>,
    pub settings_path: Option<PathBuf>,
    pub options: SessionOptions,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Run(RunArgs),
    Stats { bank: Option<BankId>, limit: usize },
    Export { out: Option<PathBuf> },
    Import { path: PathBuf },
    Clear { bank: Option<BankId> },
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Args {
    pub store: StoreTarget,
    pub command: Command,
}

impl Args {
    /// Parses `argv` without the program name. `env_db` is the value of
    /// `QUIZ_DB_URL`, if set.
    pub fn parse(
        argv: impl IntoIterator<Item = String>,
        env_db: Option<String>,
    ) -> Result<Self, ArgsError> {
        let mut args = argv.into_iter();
        let mut store = StoreTarget::Sqlite(
            env_db.map_or_else(|| DEFAULT_DB_URL.to_string(), normalize_sqlite_url),
        );

        let Some(sub) = args.next() else {
            return Ok(Self {
                store,
                command: Command::Help,
            });
        };

        let mut positional: Vec<String> = Vec::new();
        let mut run = RunArgs {
            bank_path: PathBuf::new(),
            mode: None,
            settings_path: None,
            options: SessionOptions::default(),
        };
        let mut limit = 10;
        let mut out = None;
        let mut bank_flag = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    store = StoreTarget::Sqlite(normalize_sqlite_url(value));
                }
                "--memory" => store = StoreTarget::Memory,
                "--mode" => run.mode = Some(ModeId::new(require_value(&mut args, "--mode")?)),
                "--settings" => {
                    run.settings_path = Some(require_value(&mut args, "--settings")?.into());
                }
                "--count" => run.options.question_count = Some(number(&mut args, "--count")?),
                "--categories" => {
                    let value = require_value(&mut args, "--categories")?;
                    run.options.categories = Some(
                        value
                            .split(',')
                            .map(str::trim)
                            .filter(|c| !c.is_empty())
                            .map(str::to_string)
                            .collect(),
                    );
                }
                "--time-limit" => {
                    run.options.time_limit_minutes = Some(number(&mut args, "--time-limit")?);
                }
                "--max-mistakes" => {
                    run.options.max_mistakes = Some(number(&mut args, "--max-mistakes")?);
                }
                "--pairs" => run.options.pairs_per_stage = Some(number(&mut args, "--pairs")?),
                "--seed" => run.options.seed = Some(number(&mut args, "--seed")?),
                "--no-shuffle" => {
                    run.options.shuffle_questions = Some(false);
                    run.options.shuffle_answers = Some(false);
                }
                "--no-repeat" => run.options.repeat_unknown = Some(false),
                "--comments" => run.options.show_comments = Some(true),
                "--no-comments" => run.options.show_comments = Some(false),
                "--limit" => limit = number(&mut args, "--limit")?,
                "--out" => out = Some(PathBuf::from(require_value(&mut args, "--out")?)),
                "--bank" => bank_flag = Some(parse_bank(require_value(&mut args, "--bank")?)?),
                "--help" | "-h" => {
                    return Ok(Self {
                        store,
                        command: Command::Help,
                    });
                }
                other if other.starts_with("--") => return Err(ArgsError::UnknownArg(arg)),
                _ => positional.push(arg),
            }
        }

        let mut positional = positional.into_iter();
        let command = match sub.as_str() {
            "run" => {
                run.bank_path = positional
                    .next()
                    .ok_or(ArgsError::MissingPositional { what: "bank file" })?
                    .into();
                Command::Run(run)
            }
            "stats" => Command::Stats {
                bank: positional.next().map(parse_bank).transpose()?.or(bank_flag),
                limit,
            },
            "export" => Command::Export { out },
            "import" => Command::Import {
                path: positional
                    .next()
                    .ok_or(ArgsError::MissingPositional {
                        what: "snapshot file",
                    })?
                    .into(),
            },
            "clear" => Command::Clear {
                bank: positional.next().map(parse_bank).transpose()?.or(bank_flag),
            },
            "help" | "--help" | "-h" => Command::Help,
            other => return Err(ArgsError::UnknownCommand(other.to_string())),
        };
        if let Some(extra) = positional.next() {
            return Err(ArgsError::UnknownArg(extra));
        }

        Ok(Self { store, command })
    }
}

fn parse_bank(raw: String) -> Result<BankId, ArgsError> {
    raw.parse().map_err(|_| ArgsError::InvalidBankId { raw })
}

/// Bank id used for storage keys: the file stem of the bank file.
pub fn bank_id_for(path: &std::path::Path) -> Result<BankId, ArgsError> {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    parse_bank(stem)
}

pub fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

pub fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  app run <bank.json> [--mode <id>] [session options] [store]");
    eprintln!("  app stats [<bank-id>] [--limit <n>] [store]");
    eprintln!("  app export [--out <file>] [store]");
    eprintln!("  app import <snapshot.json> [store]");
    eprintln!("  app clear [<bank-id>] [store]");
    eprintln!();
    eprintln!("Session options:");
    eprintln!("  --count <n>  --categories <a,b>  --time-limit <minutes>  --max-mistakes <n>");
    eprintln!("  --pairs <n>  --seed <n>  --no-shuffle  --no-repeat  --comments  --no-comments");
    eprintln!("  --settings <file>         Mode enable/disable settings (JSON)");
    eprintln!();
    eprintln!("Store:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: {DEFAULT_DB_URL})");
    eprintln!("  --memory                  Keep results in memory only");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  QUIZ_DB_URL, RUST_LOG");
}
