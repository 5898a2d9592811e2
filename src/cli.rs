//! Command-line interface module for sorting-hat.
//!
//! This module handles all CLI-related functionality including:
//! - Argument parsing
//! - Configuration layering (file, environment, flags)
//! - Choosing the job kind for the run
//! - Handing the paths to the [`Orchestrator`]

use crate::builder::choose_kind;
use crate::config::{Config, ConfigError, ValidatedConfig};
use crate::job::JobKind;
use crate::orchestrator::{Orchestrator, RunSummary};
use crate::prompt::{AnswerSource, PromptError, StopFlag};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use thiserror::Error;
use tracing::info;

/// Sort files, directories and zip archives into categorized trees.
#[derive(Debug, Clone, Parser)]
#[command(name = "sorting-hat", version, about)]
pub struct Args {
    /// Files, directories or .zip archives to sort
    pub paths: Vec<PathBuf>,

    /// Configuration file (defaults to .sortinghat.toml, then ~/.config/sorting-hat/config.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Root directory for videos (overrides VIDEO_PATH)
    #[arg(long)]
    pub video_root: Option<PathBuf>,

    /// Root directory for everything else (overrides OTHER_PATH)
    #[arg(long)]
    pub other_root: Option<PathBuf>,

    /// Kind of input; asked interactively when omitted
    #[arg(short, long, value_enum)]
    pub kind: Option<KindArg>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Job kind as written on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    Video,
    Other,
}

impl From<KindArg> for JobKind {
    fn from(arg: KindArg) -> Self {
        match arg {
            KindArg::Video => JobKind::SingleFile,
            KindArg::Other => JobKind::Composite,
        }
    }
}

/// Errors that end a run before or outside any single job.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Prompt(#[from] PromptError),
}

impl RunError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            RunError::Config(_) => 2,
            RunError::Prompt(PromptError::Interrupted) => 130,
            RunError::Prompt(_) => 1,
        }
    }
}

/// Builds the validated configuration for `args`.
///
/// Layers, lowest to highest priority: config file, `VIDEO_PATH` /
/// `OTHER_PATH` from `env`, then `--video-root` / `--other-root`.
///
/// # Arguments
///
/// * `args` - Parsed command-line arguments
/// * `env` - Environment lookup, usually `std::env::var(..).ok()`
pub fn load_config<F>(args: &Args, env: F) -> Result<ValidatedConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = Config::load(args.config.as_deref())?;
    config.apply_env(env);
    config.apply_overrides(args.video_root.as_deref(), args.other_root.as_deref());
    config.validate()
}

/// Runs the CLI application.
///
/// This is the main entry point for a sorting run: it checks the arguments,
/// loads the configuration from the process environment, asks for the job
/// kind if needed, and drives the batch to completion.
///
/// # Examples
///
/// ```no_run
/// use clap::Parser;
/// use sorting_hat::cli::{Args, run_cli};
/// use sorting_hat::prompt::{ConsoleAnswers, StopFlag};
///
/// let args = Args::parse();
/// let stop = StopFlag::new();
/// let mut answers = ConsoleAnswers::new(stop.clone());
/// match run_cli(&args, &mut answers, stop) {
///     Ok(summary) => println!("{} job(s) handled", summary.attempted()),
///     Err(e) => eprintln!("Error: {}", e),
/// }
/// ```
pub fn run_cli(
    args: &Args,
    answers: &mut dyn AnswerSource,
    stop: StopFlag,
) -> Result<RunSummary, RunError> {
    run_cli_with_env(args, answers, stop, |key| std::env::var(key).ok())
}

/// Like [`run_cli`], with an explicit environment lookup.
pub fn run_cli_with_env<F>(
    args: &Args,
    answers: &mut dyn AnswerSource,
    stop: StopFlag,
    env: F,
) -> Result<RunSummary, RunError>
where
    F: Fn(&str) -> Option<String>,
{
    if args.paths.is_empty() {
        return Err(ConfigError::NoArguments.into());
    }

    let config = load_config(args, env)?;
    info!(
        video_root = %config.video_root().display(),
        other_root = %config.other_root().display(),
        "configuration loaded"
    );

    let kind = match args.kind {
        Some(kind) => kind.into(),
        None => choose_kind(answers)?,
    };

    let summary = Orchestrator::new(&config, answers, stop).run(kind, &args.paths);
    summary.print();
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::ScriptedAnswers;

    fn args(list: &[&str]) -> Args {
        Args::parse_from(std::iter::once("sorting-hat").chain(list.iter().copied()))
    }

    #[test]
    fn test_parse_arguments() {
        let parsed = args(&["-k", "other", "-vv", "--video-root", "/v", "a.zip", "b"]);
        assert_eq!(parsed.kind, Some(KindArg::Other));
        assert_eq!(parsed.verbose, 2);
        assert_eq!(parsed.video_root, Some(PathBuf::from("/v")));
        assert_eq!(parsed.paths, vec![PathBuf::from("a.zip"), PathBuf::from("b")]);
    }

    #[test]
    fn test_kind_arg_maps_to_job_kind() {
        assert_eq!(JobKind::from(KindArg::Video), JobKind::SingleFile);
        assert_eq!(JobKind::from(KindArg::Other), JobKind::Composite);
    }

    #[test]
    fn test_no_paths_is_config_error() {
        let mut answers = ScriptedAnswers::default();
        let err = run_cli_with_env(&args(&[]), &mut answers, StopFlag::new(), |_| None).unwrap_err();
        assert!(matches!(err, RunError::Config(ConfigError::NoArguments)));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(RunError::Prompt(PromptError::Interrupted).exit_code(), 130);
        assert_eq!(
            RunError::Prompt(PromptError::Exhausted {
                question: "q".into()
            })
            .exit_code(),
            1
        );
    }
}
