use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use exam_core::model::{
    ProviderKind, QuestionDraft, QuestionId, SessionMode, ThemeFilter, option_label,
};
use services::ai::{ModelClient, PageImage, build_client};
use services::extraction::split_pages;
use services::sessions::recent_attempts;
use services::{AppServices, Clock, ExtractionPipeline, PatternParser};
use tracing_subscriber::EnvFilter;

mod attempt;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingArgument { command: &'static str, what: &'static str },
    UnknownArg(String),
    UnknownCommand(String),
    InvalidNumber { flag: &'static str, raw: String },
    InvalidProvider { raw: String },
    InvalidDbUrl { raw: String },
    NoCredential { provider: ProviderKind },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingArgument { command, what } => {
                write!(f, "{command} requires {what}")
            }
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown command: {cmd}"),
            ArgsError::InvalidNumber { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::InvalidProvider { raw } => write!(f, "unknown provider: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::NoCredential { provider } => write!(
                f,
                "no credential for {provider}: run `login {provider} <key>` or set EXAM_{}_API_KEY",
                provider.as_str().to_ascii_uppercase()
            ),
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

fn parse_number(raw: String, flag: &'static str) -> Result<usize, ArgsError> {
    raw.parse()
        .map_err(|_| ArgsError::InvalidNumber { flag, raw })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  app [options] practice [--resume] [--theme <name>]...");
    eprintln!("  app [options] exam [--theme <name>]...");
    eprintln!("  app [options] extract <text_file> [--regex] [--images <dir>]");
    eprintln!("  app [options] import <candidates.json>");
    eprintln!("  app [options] list | themes | reset | clear");
    eprintln!("  app [options] explain <question_id>");
    eprintln!("  app [options] history [--limit <n>]");
    eprintln!("  app [options] models");
    eprintln!("  app [options] login <provider> <api_key> | logout <provider>");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>     default sqlite://exam.sqlite3");
    eprintln!("  --provider <name>     gemini | groq (default: saved preference)");
    eprintln!("  --model <name>        override the saved model");
    eprintln!("  --max-chars <n>       characters per extraction request");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  EXAM_DB_URL, EXAM_AI_PROVIDER, EXAM_GEMINI_API_KEY, EXAM_GROQ_API_KEY, RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Practice,
    Exam,
    Extract,
    Import,
    List,
    Themes,
    Reset,
    Clear,
    Explain,
    History,
    Models,
    Login,
    Logout,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "practice" => Some(Self::Practice),
            "exam" => Some(Self::Exam),
            "extract" => Some(Self::Extract),
            "import" => Some(Self::Import),
            "list" => Some(Self::List),
            "themes" => Some(Self::Themes),
            "reset" => Some(Self::Reset),
            "clear" => Some(Self::Clear),
            "explain" => Some(Self::Explain),
            "history" => Some(Self::History),
            "models" => Some(Self::Models),
            "login" => Some(Self::Login),
            "logout" => Some(Self::Logout),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Practice => "practice",
            Self::Exam => "exam",
            Self::Extract => "extract",
            Self::Import => "import",
            Self::List => "list",
            Self::Themes => "themes",
            Self::Reset => "reset",
            Self::Clear => "clear",
            Self::Explain => "explain",
            Self::History => "history",
            Self::Models => "models",
            Self::Login => "login",
            Self::Logout => "logout",
        }
    }
}

struct Args {
    command: Command,
    positional: Vec<String>,
    db_url: String,
    provider: Option<ProviderKind>,
    model: Option<String>,
    max_chars: Option<usize>,
    regex: bool,
    images: Option<PathBuf>,
    limit: usize,
    themes: Vec<String>,
    resume: bool,
}

impl Args {
    fn parse(args: impl IntoIterator<Item = String>) -> Result<Self, ArgsError> {
        let mut args = args.into_iter();
        let mut command = None;
        let mut positional = Vec::new();
        let mut db_url = std::env::var("EXAM_DB_URL")
            .ok()
            .map_or_else(|| "sqlite://exam.sqlite3".into(), normalize_sqlite_url);
        let mut provider = match std::env::var("EXAM_AI_PROVIDER") {
            Ok(raw) if !raw.trim().is_empty() => Some(parse_provider(raw)?),
            _ => None,
        };
        let mut model = None;
        let mut max_chars = None;
        let mut regex = false;
        let mut images = None;
        let mut limit = 10;
        let mut themes = Vec::new();
        let mut resume = false;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--provider" => {
                    provider = Some(parse_provider(require_value(&mut args, "--provider")?)?);
                }
                "--model" => model = Some(require_value(&mut args, "--model")?),
                "--max-chars" => {
                    let value = require_value(&mut args, "--max-chars")?;
                    max_chars = Some(parse_number(value, "--max-chars")?);
                }
                "--limit" => {
                    limit = parse_number(require_value(&mut args, "--limit")?, "--limit")?;
                }
                "--images" => images = Some(PathBuf::from(require_value(&mut args, "--images")?)),
                "--regex" => regex = true,
                "--theme" => themes.push(require_value(&mut args, "--theme")?),
                "--resume" => resume = true,
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                flag if flag.starts_with("--") => return Err(ArgsError::UnknownArg(arg)),
                _ if command.is_none() => {
                    command = Some(
                        Command::from_arg(&arg).ok_or_else(|| ArgsError::UnknownCommand(arg.clone()))?,
                    );
                }
                _ => positional.push(arg),
            }
        }

        let command = command.ok_or(ArgsError::MissingArgument {
            command: "app",
            what: "a command",
        })?;
        Ok(Self {
            command,
            positional,
            db_url,
            provider,
            model,
            max_chars,
            regex,
            images,
            limit,
            themes,
            resume,
        })
    }

    fn theme_filter(&self) -> ThemeFilter {
        if self.themes.is_empty() {
            ThemeFilter::all()
        } else {
            ThemeFilter::from_themes(&self.themes)
        }
    }

    fn arg(&self, index: usize, what: &'static str) -> Result<&str, ArgsError> {
        self.positional
            .get(index)
            .map(String::as_str)
            .ok_or(ArgsError::MissingArgument {
                command: self.command.name(),
                what,
            })
    }
}

fn parse_provider(raw: String) -> Result<ProviderKind, ArgsError> {
    raw.parse().map_err(|_| ArgsError::InvalidProvider { raw })
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
    let path = Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
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

/// Page images in a directory, in file-name order.
fn read_page_images(dir: &Path) -> std::io::Result<Vec<PageImage>> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| path.is_file())
        .collect();
    paths.sort();

    let mut pages = Vec::new();
    for path in paths {
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        let mime_type = match ext.as_deref() {
            Some("jpg" | "jpeg") => "image/jpeg",
            Some("png") => "image/png",
            Some("webp") => "image/webp",
            _ => continue,
        };
        pages.push(PageImage {
            mime_type: mime_type.to_string(),
            data: std::fs::read(&path)?,
        });
    }
    Ok(pages)
}

async fn model_client(
    services: &AppServices,
    args: &Args,
) -> Result<Arc<dyn ModelClient>, Box<dyn std::error::Error>> {
    let settings = services.app_settings();
    let provider = match args.provider {
        Some(provider) => provider,
        None => settings.load().await?.provider(),
    };
    let mut config = settings
        .provider_config(provider)
        .await?
        .ok_or(ArgsError::NoCredential { provider })?;
    if let Some(model) = &args.model {
        config.model.clone_from(model);
    }
    Ok(build_client(config))
}

async fn extract(services: &AppServices, args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let candidates: Vec<QuestionDraft> = if let Some(dir) = &args.images {
        let pages = read_page_images(dir)?;
        let mut pipeline = ExtractionPipeline::new(model_client(services, args).await?);
        if let Some(max_chars) = args.max_chars {
            pipeline = pipeline.with_max_chars(max_chars);
        }
        let report = pipeline.extract_from_pages(&pages).await?;
        eprintln!(
            "{} candidates from {} pages ({} skipped)",
            report.candidates.len(),
            report.attempted,
            report.failed
        );
        report.candidates
    } else {
        let text = std::fs::read_to_string(args.arg(0, "a text file")?)?;
        if args.regex {
            let candidates = PatternParser::new()?.parse(&text);
            if candidates.is_empty() {
                eprintln!("no recognizable questions");
            }
            candidates
        } else {
            let mut pipeline = ExtractionPipeline::new(model_client(services, args).await?);
            if let Some(max_chars) = args.max_chars {
                pipeline = pipeline.with_max_chars(max_chars);
            }
            let pages = split_pages(&text);
            tracing::debug!(pages = pages.len(), "text split into pages");
            let body: String = pages.into_iter().map(|(_, body)| body).collect();
            let report = pipeline.extract_from_text(&body).await?;
            eprintln!(
                "{} candidates from {} requests ({} skipped)",
                report.candidates.len(),
                report.attempted,
                report.failed
            );
            report.candidates
        }
    };

    eprintln!("answers are unverified: review before importing");
    println!("{}", serde_json::to_string_pretty(&candidates)?);
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse(std::env::args().skip(1)).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    prepare_sqlite_file(&args.db_url)?;
    let services = AppServices::new_sqlite(&args.db_url, Clock::default_clock()).await?;
    let questions = services.questions();

    match args.command {
        Command::Practice => {
            let sessions = services.session_loop();
            if !args.resume && sessions.pending_practice().await.is_some() {
                eprintln!("starting over; saved practice progress is discarded (use --resume)");
            }
            let session = sessions.start_practice(args.resume, args.theme_filter()).await?;
            attempt::run_attempt(&sessions, session).await?;
        }
        Command::Exam => {
            let sessions = services.session_loop();
            let session = sessions.start(SessionMode::Exam, args.theme_filter()).await?;
            attempt::run_attempt(&sessions, session).await?;
        }
        Command::Extract => extract(&services, &args).await?,
        Command::Import => {
            let raw = std::fs::read_to_string(args.arg(0, "a candidates file")?)?;
            let drafts: Vec<QuestionDraft> = serde_json::from_str(&raw)?;
            let outcome = questions.add_many(drafts).await?;
            println!("imported {} questions", outcome.added.len());
            for (index, err) in &outcome.rejected {
                println!("  skipped candidate {}: {err}", index + 1);
            }
        }
        Command::List => {
            for question in questions.list().await? {
                println!("#{} [{}] {}", question.id(), question.theme(), question.prompt());
                for (index, option) in question.options().iter().enumerate() {
                    let marker = if question.is_correct(index) { '*' } else { ' ' };
                    println!("   {marker}{}. {option}", option_label(index));
                }
            }
        }
        Command::Themes => {
            for theme in questions.themes().await? {
                println!("{theme}");
            }
        }
        Command::Reset => {
            let restored = questions.reset_to_default().await?;
            println!("restored {} built-in questions", restored.len());
        }
        Command::Clear => {
            questions.clear().await?;
            println!("question set cleared");
        }
        Command::Explain => {
            let raw = args.arg(0, "a question id")?;
            let id: QuestionId = raw.parse().map_err(|_| ArgsError::InvalidNumber {
                flag: "question id",
                raw: raw.to_string(),
            })?;
            let question = questions.get(id).await?;
            let explanations = services.explanations();
            let text = match args.provider {
                Some(provider) => explanations.explain_with(provider, &question).await?,
                None => explanations.explain(&question).await?,
            };
            println!("{text}");
        }
        Command::History => {
            let history = services.session_loop().history().await;
            for item in recent_attempts(&history, args.limit) {
                println!(
                    "{} {} {}/{} ({}%) {}{} in {}",
                    item.completed_at.format("%Y-%m-%d %H:%M"),
                    item.code,
                    item.score,
                    item.total,
                    item.percentage,
                    if item.passed { "passed" } else { "failed" },
                    if item.timed_out { ", timed out" } else { "" },
                    item.duration,
                );
            }
        }
        Command::Models => {
            let client = model_client(&services, &args).await?;
            for model in client.list_models().await? {
                println!("{model}");
            }
        }
        Command::Login => {
            let provider = parse_provider(args.arg(0, "a provider")?.to_string())?;
            let key = args.arg(1, "an api key")?;
            services.app_settings().set_credential(provider, key).await?;
            println!("credential saved for {provider}");
        }
        Command::Logout => {
            let provider = parse_provider(args.arg(0, "a provider")?.to_string())?;
            services.app_settings().forget_credential(provider).await?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("app=info,services=info,storage=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Args, ArgsError> {
        Args::parse(args.iter().map(|arg| (*arg).to_string()))
    }

    #[test]
    fn flags_and_positionals_mix() {
        let args = parse(&["--db", "sqlite::memory:", "extract", "paper.txt", "--regex"]).unwrap();
        assert_eq!(args.command, Command::Extract);
        assert_eq!(args.positional, vec!["paper.txt"]);
        assert_eq!(args.db_url, "sqlite::memory:");
        assert!(args.regex);
    }

    #[test]
    fn invalid_values_are_reported() {
        assert!(matches!(
            parse(&["extract", "--max-chars", "lots"]),
            Err(ArgsError::InvalidNumber { .. })
        ));
        assert!(matches!(
            parse(&["models", "--provider", "openai"]),
            Err(ArgsError::InvalidProvider { .. })
        ));
        assert!(matches!(parse(&["frobnicate"]), Err(ArgsError::UnknownCommand(_))));
        assert!(matches!(parse(&["list", "--model"]), Err(ArgsError::MissingValue { .. })));
    }

    #[test]
    fn attempt_commands_take_themes_and_resume() {
        let args = parse(&[
            "practice",
            "--resume",
            "--theme",
            "Operating Systems",
            "--theme",
            "Database Systems",
        ])
        .unwrap();
        assert_eq!(args.command, Command::Practice);
        assert!(args.resume);
        assert_eq!(
            args.theme_filter(),
            ThemeFilter::from_themes(["Operating Systems", "Database Systems"])
        );

        let args = parse(&["exam"]).unwrap();
        assert_eq!(args.command, Command::Exam);
        assert!(!args.resume);
        assert!(args.theme_filter().is_all());
        assert!(matches!(parse(&["exam", "--theme"]), Err(ArgsError::MissingValue { .. })));
    }

    #[test]
    fn missing_positionals_name_the_command() {
        let args = parse(&["explain"]).unwrap();
        let err = args.arg(0, "a question id").unwrap_err();
        assert_eq!(err.to_string(), "explain requires a question id");
    }
}
