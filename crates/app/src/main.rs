use std::fmt;

use assess_core::AssessmentPolicy;
use assess_core::model::{FollowUpKind, UserId};
use services::{AppServices, AssessmentError, Clock, NextAction};

mod logging;
mod render;

const DEFAULT_HISTORY_LIMIT: u32 = 10;

#[derive(Debug)]
enum ArgsError {
    MissingCommand,
    UnknownCommand(String),
    MissingValue { flag: &'static str },
    MissingArg { what: &'static str },
    UnknownArg(String),
    InvalidUserId { raw: String },
    InvalidLimit { raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingCommand => write!(f, "no command given"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown command: {cmd}"),
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingArg { what } => write!(f, "missing {what}"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidUserId { raw } => write!(f, "invalid --user value: {raw}"),
            ArgsError::InvalidLimit { raw } => write!(f, "invalid --limit value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
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

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Topics,
    Start { topics: Vec<String> },
    Answer { letter: String },
    Status,
    FollowUp { topic: String, kind: FollowUpKind },
    FollowUpAnswer { letter: String },
    Pools,
    History { limit: u32 },
    Reset,
}

#[derive(Debug)]
struct Args {
    db_url: String,
    user: UserId,
    command: Command,
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- <command> [--db <sqlite_url>] [--user <id>]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  topics                             List topics with questions");
    eprintln!("  start --topics <a,b,...>           Start an adaptive assessment");
    eprintln!("  answer <letter>                    Answer the current question");
    eprintln!("  status                             Show the current question and progress");
    eprintln!("  follow-up --topic <t> [--advanced] Re-test a weak or needs-training topic");
    eprintln!("  follow-up-answer <letter>          Answer the current follow-up question");
    eprintln!("  pools                              Show weak and needs-training topics");
    eprintln!("  history [--limit <n>]              Show recent results");
    eprintln!("  reset                              Drop the current session");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db sqlite://assess.sqlite3");
    eprintln!("  --user 1");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  ASSESS_DB_URL, ASSESS_USER_ID, RUST_LOG");
}

impl Args {
    fn parse(argv: impl IntoIterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("ASSESS_DB_URL")
            .ok()
            .map_or_else(|| "sqlite://assess.sqlite3".into(), normalize_sqlite_url);
        let mut user = std::env::var("ASSESS_USER_ID")
            .ok()
            .and_then(|value| value.parse::<UserId>().ok())
            .unwrap_or_else(|| UserId::new(1));

        let mut args = argv.into_iter();
        let name = args.next().ok_or(ArgsError::MissingCommand)?;
        if matches!(name.as_str(), "--help" | "-h") {
            print_usage();
            std::process::exit(0);
        }

        let mut topics = None;
        let mut topic = None;
        let mut advanced = false;
        let mut limit = DEFAULT_HISTORY_LIMIT;
        let mut positional = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--user" => {
                    let value = require_value(&mut args, "--user")?;
                    user = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidUserId { raw: value.clone() })?;
                }
                "--topics" => topics = Some(require_value(&mut args, "--topics")?),
                "--topic" => topic = Some(require_value(&mut args, "--topic")?),
                "--advanced" => advanced = true,
                "--limit" => {
                    let value = require_value(&mut args, "--limit")?;
                    limit = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidLimit { raw: value.clone() })?;
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ if !arg.starts_with("--") && positional.is_none() => positional = Some(arg),
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        let command = match name.as_str() {
            "topics" => Command::Topics,
            "start" => Command::Start {
                topics: topics
                    .ok_or(ArgsError::MissingArg { what: "--topics" })?
                    .split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_owned)
                    .collect(),
            },
            "answer" => Command::Answer {
                letter: positional.ok_or(ArgsError::MissingArg { what: "answer letter" })?,
            },
            "status" => Command::Status,
            "follow-up" => Command::FollowUp {
                topic: topic.ok_or(ArgsError::MissingArg { what: "--topic" })?,
                kind: if advanced {
                    FollowUpKind::Advanced
                } else {
                    FollowUpKind::Standard
                },
            },
            "follow-up-answer" => Command::FollowUpAnswer {
                letter: positional.ok_or(ArgsError::MissingArg { what: "answer letter" })?,
            },
            "pools" => Command::Pools,
            "history" => Command::History { limit },
            "reset" => Command::Reset,
            _ => return Err(ArgsError::UnknownCommand(name)),
        };

        Ok(Self {
            db_url,
            user,
            command,
        })
    }
}

fn normalize_sqlite_url(raw: String) -> String {
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
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
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

    let path = std::path::Path::new(path);
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

async fn execute(app: &AppServices, user: UserId, command: Command) -> Result<(), AssessmentError> {
    match command {
        Command::Topics => {
            let topics = app.history().available_topics().await?;
            if topics.is_empty() {
                println!("The question bank is empty. Import questions with the seed binary.");
            }
            for topic in topics {
                println!("{topic}");
            }
        }
        Command::Start { topics } => {
            let first = app.assessment().start_adaptive_session(user, topics).await?;
            render::question(&first);
        }
        Command::Answer { letter } => {
            let result = app.assessment().submit_answer(user, &letter).await?;
            render::answer(&result);
            if let NextAction::SessionComplete(summary) = &result.next_action {
                let struggled: Vec<String> = summary
                    .weak
                    .iter()
                    .chain(&summary.needs_training)
                    .cloned()
                    .collect();
                render::recommendations(&app.history().recommendations(&struggled).await?);
            }
        }
        Command::Status => {
            match app.assessment().session_progress(user).await {
                Ok(progress) => render::progress(&progress),
                Err(AssessmentError::SessionTypeMismatch { .. }) => {
                    println!("A follow-up test is in progress.");
                }
                Err(AssessmentError::SessionNotFound) => {
                    println!("No active session.");
                    return Ok(());
                }
                Err(err) => return Err(err),
            }
            if let Some(current) = app.assessment().current_question(user).await? {
                println!();
                render::question(&current);
            }
        }
        Command::FollowUp { topic, kind } => {
            let first = app.follow_up().start_follow_up(user, &topic, kind).await?;
            render::question(&first);
        }
        Command::FollowUpAnswer { letter } => {
            let result = app.follow_up().submit_follow_up_answer(user, &letter).await?;
            render::follow_up_answer(&result);
        }
        Command::Pools => {
            let history = app.history();
            let weak = history.weak_topics(user).await?;
            let needs_training = history.needs_training_topics(user).await?;
            println!("Weak (standard follow-up): {}", list_or_none(&weak));
            println!(
                "Needs training (advanced follow-up): {}",
                list_or_none(&needs_training)
            );
            let pooled: Vec<String> = weak.into_iter().chain(needs_training).collect();
            render::recommendations(&history.recommendations(&pooled).await?);
        }
        Command::History { limit } => {
            let records = app.history().recent_results(user, limit).await?;
            render::history(&records);
        }
        Command::Reset => {
            app.assessment().reset_session(user).await?;
            println!("Session cleared.");
        }
    }
    Ok(())
}

fn list_or_none(topics: &[String]) -> String {
    if topics.is_empty() {
        "none".to_string()
    } else {
        topics.join(", ")
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse(std::env::args().skip(1)).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    prepare_sqlite_file(&args.db_url)?;
    let app = AppServices::new_sqlite(&args.db_url, Clock::System, AssessmentPolicy::default())
        .await?;
    tracing::debug!(db_url = %args.db_url, user_id = %args.user, command = ?args.command, "running");

    execute(&app, args.user, args.command).await?;
    Ok(())
}

#[tokio::main]
async fn main() {
    logging::init_tracing();
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
