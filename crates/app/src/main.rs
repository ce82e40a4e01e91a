use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use assessment_core::config::{ConfigError, DEFAULT_DURATION_SECS, DEFAULT_PASSING_SCORE};
use assessment_core::model::{ContentId, CourseId, LessonId, QuizId};
use assessment_core::time::format_countdown;
use assessment_core::{CorrectAnswerPolicy, SessionConfig, SubmitGate};
use backend::{ApiConfig, Backend, HttpBackend, QuizTarget, ResultScope};
use services::{AssessmentController, ResultHistoryService};
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod demo;
mod driver;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidNumber { flag: &'static str, raw: String },
    InvalidSetting(ConfigError),
    MissingTarget,
    MissingApiUrl,
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidNumber { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::InvalidSetting(e) => write!(f, "{e}"),
            ArgsError::MissingTarget => write!(
                f,
                "choose a quiz with --course, --lesson and --content, or --course with --exam"
            ),
            ArgsError::MissingApiUrl => {
                write!(f, "no API configured: pass --api-url or set ASSESSMENT_API_URL")
            }
        }
    }
}

impl std::error::Error for ArgsError {}

impl From<ConfigError> for ArgsError {
    fn from(e: ConfigError) -> Self {
        ArgsError::InvalidSetting(e)
    }
}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn parse_number(flag: &'static str, raw: &str) -> Result<u32, ArgsError> {
    raw.trim().parse().map_err(|_| ArgsError::InvalidNumber {
        flag,
        raw: raw.to_owned(),
    })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- take    --course <id> (--lesson <id> --content <id> [--quiz <id>] | --exam)");
    eprintln!("                              [--api-url <url>] [--token <token>] [session options]");
    eprintln!("  cargo run -p app -- demo    [session options]   # offline, locally scored");
    eprintln!("  cargo run -p app -- results [--course <id> [--lesson <id> [--content <id>]]]");
    eprintln!("                              [--api-url <url>] [--token <token>] [--passing-score <n>]");
    eprintln!();
    eprintln!("Session options:");
    eprintln!("  --duration <secs>        default {DEFAULT_DURATION_SECS}");
    eprintln!("  --passing-score <0-100>  default {DEFAULT_PASSING_SCORE}");
    eprintln!("  --gate <at-least-one|all>");
    eprintln!("  --policy <strict|first-flagged>");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  ASSESSMENT_API_URL, ASSESSMENT_API_TOKEN, ASSESSMENT_DURATION_SECS,");
    eprintln!("  ASSESSMENT_PASSING_SCORE, ASSESSMENT_SUBMIT_GATE, RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Take,
    Demo,
    Results,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "take" => Some(Self::Take),
            "demo" => Some(Self::Demo),
            "results" => Some(Self::Results),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct Args {
    api_url: Option<String>,
    token: Option<String>,
    course: Option<String>,
    lesson: Option<String>,
    content: Option<String>,
    quiz: Option<String>,
    exam: bool,
    duration_secs: Option<u32>,
    passing_score: Option<u32>,
    gate: Option<SubmitGate>,
    policy: Option<CorrectAnswerPolicy>,
}

impl Args {
    /// Session defaults from `ASSESSMENT_*` variables, read through `lookup`.
    fn from_env(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ArgsError> {
        let mut parsed = Self::default();
        if let Some(raw) = lookup("ASSESSMENT_DURATION_SECS") {
            parsed.duration_secs = Some(parse_number("ASSESSMENT_DURATION_SECS", &raw)?);
        }
        if let Some(raw) = lookup("ASSESSMENT_PASSING_SCORE") {
            parsed.passing_score = Some(parse_number("ASSESSMENT_PASSING_SCORE", &raw)?);
        }
        if let Some(raw) = lookup("ASSESSMENT_SUBMIT_GATE") {
            parsed.gate = Some(SubmitGate::from_str(&raw)?);
        }
        Ok(parsed)
    }

    /// Apply command-line flags on top of `self`.
    fn parse(self, args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut parsed = self;
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--api-url" => parsed.api_url = Some(require_value(args, "--api-url")?),
                "--token" => parsed.token = Some(require_value(args, "--token")?),
                "--course" => parsed.course = Some(require_value(args, "--course")?),
                "--lesson" => parsed.lesson = Some(require_value(args, "--lesson")?),
                "--content" => parsed.content = Some(require_value(args, "--content")?),
                "--quiz" => parsed.quiz = Some(require_value(args, "--quiz")?),
                "--exam" => parsed.exam = true,
                "--duration" => {
                    let value = require_value(args, "--duration")?;
                    parsed.duration_secs = Some(parse_number("--duration", &value)?);
                }
                "--passing-score" => {
                    let value = require_value(args, "--passing-score")?;
                    parsed.passing_score = Some(parse_number("--passing-score", &value)?);
                }
                "--gate" => {
                    let value = require_value(args, "--gate")?;
                    parsed.gate = Some(value.parse()?);
                }
                "--policy" => {
                    let value = require_value(args, "--policy")?;
                    parsed.policy = Some(value.parse()?);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }
        Ok(parsed)
    }

    fn session_config(&self) -> Result<SessionConfig, ArgsError> {
        Ok(SessionConfig::new(
            self.duration_secs.unwrap_or(DEFAULT_DURATION_SECS),
            self.passing_score.unwrap_or(u32::from(DEFAULT_PASSING_SCORE)),
            self.gate.unwrap_or_default(),
            self.policy.unwrap_or_default(),
        )?)
    }

    fn quiz_target(&self) -> Result<QuizTarget, ArgsError> {
        let course = self.course.as_deref().ok_or(ArgsError::MissingTarget)?;
        let course = CourseId::new(course);
        if self.exam {
            return Ok(QuizTarget::course_exam(course));
        }
        let (Some(lesson), Some(content)) = (self.lesson.as_deref(), self.content.as_deref())
        else {
            return Err(ArgsError::MissingTarget);
        };
        let target = QuizTarget::lesson(course, LessonId::new(lesson), ContentId::new(content));
        Ok(match self.quiz.as_deref() {
            Some(quiz) => target.with_quiz(QuizId::new(quiz)),
            None => target,
        })
    }

    fn result_scope(&self) -> ResultScope {
        match (
            self.course.as_deref(),
            self.lesson.as_deref(),
            self.content.as_deref(),
        ) {
            (Some(course), Some(lesson), Some(content)) => ResultScope::Content {
                course: CourseId::new(course),
                lesson: LessonId::new(lesson),
                content: ContentId::new(content),
            },
            (Some(course), Some(lesson), None) => ResultScope::Lesson {
                course: CourseId::new(course),
                lesson: LessonId::new(lesson),
            },
            (Some(course), _, _) => ResultScope::Course(CourseId::new(course)),
            _ => ResultScope::All,
        }
    }

    fn http_backend(&self) -> Result<Backend, Box<dyn std::error::Error>> {
        // flags override ASSESSMENT_API_URL / ASSESSMENT_API_TOKEN
        let config = match self.api_url.as_deref() {
            Some(url) => ApiConfig::new(url)?.with_token(env_var("ASSESSMENT_API_TOKEN")),
            None => ApiConfig::from_env()?.ok_or(ArgsError::MissingApiUrl)?,
        };
        let config = match &self.token {
            Some(token) => config.with_token(Some(token.clone())),
            None => config,
        };
        debug!(base_url = %config.base_url(), authenticated = config.has_token(), "api configured");
        Ok(Backend::http(HttpBackend::new(config)?))
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn show_results(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let backend = args.http_backend()?;
    let passing_score = args.session_config()?.passing_score();
    let service =
        ResultHistoryService::new(Arc::clone(&backend.history)).with_passing_score(passing_score);
    let scope = args.result_scope();

    let results = service.list(&scope).await?;
    if results.is_empty() {
        println!("No results yet.");
        return Ok(());
    }
    for result in &results {
        let when = result
            .created_at
            .map_or_else(|| "-".to_owned(), |t| t.format("%Y-%m-%d %H:%M").to_string());
        println!(
            "{when}  {:<24} {:>6.1}%  {}",
            result.quiz_id,
            result.score,
            if result.passed(passing_score) { "passed" } else { "not passed" }
        );
    }

    let stats = services::HistoryStats::from_results(&results, passing_score);
    println!();
    println!(
        "{} attempts, average {}%, {} passed ({}%), best {}",
        stats.attempts,
        stats.average_score,
        stats.passed,
        stats.pass_rate,
        stats
            .best_score
            .map_or_else(|| "-".to_owned(), |s| format!("{s:.1}%"))
    );
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    // Default behavior: the offline demo when no subcommand is provided.
    let cmd = match argv.first().map(String::as_str) {
        None => Command::Demo,
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with("--") => Command::Take,
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };
    if !argv.is_empty() && !argv[0].starts_with("--") {
        argv.remove(0);
    }

    let mut iter = argv.into_iter();
    let parsed = Args::from_env(env_var)
        .and_then(|args| args.parse(&mut iter))
        .map_err(|e| {
            eprintln!("{e}");
            print_usage();
            e
        })?;
    debug!(command = ?cmd, "starting");

    match cmd {
        Command::Take => {
            let config = parsed.session_config()?;
            let target = parsed.quiz_target()?;
            let backend = parsed.http_backend()?;
            println!(
                "{target}: {} to answer, passing score {}%",
                format_countdown(config.duration_secs()),
                config.passing_score()
            );
            driver::run(AssessmentController::from_backend(config, target, &backend)).await
        }
        Command::Demo => {
            let config = parsed.session_config()?;
            let backend = Backend::in_memory(demo::seeded_backend()?);
            println!(
                "Offline demo: {} to answer, passing score {}%",
                format_countdown(config.duration_secs()),
                config.passing_score()
            );
            driver::run(AssessmentController::from_backend(
                config,
                demo::demo_target(),
                &backend,
            ))
            .await
        }
        Command::Results => show_results(&parsed).await,
    }
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Args, ArgsError> {
        Args::default().parse(&mut args.iter().map(|a| (*a).to_owned()))
    }

    #[test]
    fn lesson_target_needs_lesson_and_content() {
        let args = parse(&["--course", "c1", "--lesson", "l1"]).unwrap();
        assert!(matches!(args.quiz_target(), Err(ArgsError::MissingTarget)));

        let args = parse(&["--course", "c1", "--lesson", "l1", "--content", "ct1", "--quiz", "q9"])
            .unwrap();
        assert_eq!(
            args.quiz_target().unwrap(),
            QuizTarget::lesson(CourseId::new("c1"), LessonId::new("l1"), ContentId::new("ct1"))
                .with_quiz(QuizId::new("q9"))
        );
    }

    #[test]
    fn exam_flag_targets_the_course() {
        let args = parse(&["--course", "c1", "--exam"]).unwrap();
        assert_eq!(
            args.quiz_target().unwrap(),
            QuizTarget::course_exam(CourseId::new("c1"))
        );
    }

    #[test]
    fn result_scope_narrows_with_flags() {
        assert_eq!(parse(&[]).unwrap().result_scope(), ResultScope::All);
        assert_eq!(
            parse(&["--course", "c1"]).unwrap().result_scope(),
            ResultScope::Course(CourseId::new("c1"))
        );
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(matches!(
            parse(&["--duration", "soon"]),
            Err(ArgsError::InvalidNumber { flag: "--duration", .. })
        ));
        assert!(matches!(parse(&["--gate"]), Err(ArgsError::MissingValue { flag: "--gate" })));
        assert!(matches!(parse(&["--verbose"]), Err(ArgsError::UnknownArg(_))));

        let args = parse(&["--passing-score", "120"]).unwrap();
        assert!(matches!(args.session_config(), Err(ArgsError::InvalidSetting(_))));
    }

    #[test]
    fn env_defaults_yield_to_flags() {
        let env = |key: &str| match key {
            "ASSESSMENT_DURATION_SECS" => Some("90".to_owned()),
            "ASSESSMENT_SUBMIT_GATE" => Some("all".to_owned()),
            _ => None,
        };
        let args = Args::from_env(env)
            .unwrap()
            .parse(&mut ["--duration", "30"].iter().map(|a| (*a).to_owned()))
            .unwrap();

        let config = args.session_config().unwrap();
        assert_eq!(config.duration_secs(), 30);
        assert_eq!(config.submit_gate(), SubmitGate::AllAnswered);
    }

    #[test]
    fn invalid_env_gate_is_reported() {
        let env = |key: &str| (key == "ASSESSMENT_SUBMIT_GATE").then(|| "bogus".to_owned());
        assert!(matches!(
            Args::from_env(env),
            Err(ArgsError::InvalidSetting(ConfigError::InvalidSubmitGate(_)))
        ));
    }
}
