use std::fmt;

use storage::import::{
    import_questions, import_recommendations, parse_questions, parse_recommendations,
    seed_default_aliases,
};
use storage::repository::Storage;

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    questions_path: Option<String>,
    recommendations_path: Option<String>,
    aliases: bool,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
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

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url =
            std::env::var("ASSESS_DB_URL").unwrap_or_else(|_| "sqlite://assess.sqlite3".into());
        let mut questions_path = std::env::var("ASSESS_QUESTIONS").ok();
        let mut recommendations_path = std::env::var("ASSESS_RECOMMENDATIONS").ok();
        let mut aliases = true;

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
                "--questions" => {
                    questions_path = Some(require_value(&mut args, "--questions")?);
                }
                "--recommendations" => {
                    recommendations_path = Some(require_value(&mut args, "--recommendations")?);
                }
                "--no-aliases" => aliases = false,
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url: normalize_sqlite_url(&db_url),
            questions_path,
            recommendations_path,
            aliases,
        })
    }
}

/// `sqlite://` URLs must be allowed to create the file on first use.
fn normalize_sqlite_url(raw: &str) -> String {
    if raw.starts_with("sqlite:") && !raw.contains("mode=") && !raw.contains(":memory:") {
        let sep = if raw.contains('?') { '&' } else { '?' };
        format!("{raw}{sep}mode=rwc")
    } else {
        raw.to_owned()
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite://assess.sqlite3)");
    eprintln!("  --questions <path>        Question file in mcqs.json layout");
    eprintln!("  --recommendations <path>  Study links as {{topic: {{youtube, resource}}}}");
    eprintln!("  --no-aliases              Skip the default topic alias table");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment (same as flags):");
    eprintln!("  ASSESS_DB_URL, ASSESS_QUESTIONS, ASSESS_RECOMMENDATIONS");
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let storage = Storage::sqlite(&args.db_url).await?;

    let aliases = if args.aliases {
        seed_default_aliases(storage.catalog.as_ref()).await?
    } else {
        0
    };

    let report = match &args.questions_path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)?;
            let questions = parse_questions(&raw)?;
            import_questions(storage.catalog.as_ref(), &questions).await?
        }
        None => Default::default(),
    };

    let recommendations = match &args.recommendations_path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)?;
            let parsed = parse_recommendations(&raw)?;
            import_recommendations(storage.recommendations.as_ref(), &parsed).await?
        }
        None => 0,
    };

    println!(
        "Seeded {} aliases, {} questions ({} already present) and {} recommendations into {}",
        aliases, report.inserted, report.duplicates, recommendations, args.db_url
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
