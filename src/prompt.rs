//! The question/answer boundary between the mover and whoever drives it.
//!
//! Every interactive decision goes through an [`AnswerSource`]: the console
//! in production ([`ConsoleAnswers`]) and a prepared list of answers in tests
//! ([`ScriptedAnswers`]). The helpers in this module implement the
//! re-prompt-until-valid loops on top of that trait, so callers only ever see
//! accepted values.

use crate::output::OutputFormatter;
use dialoguer::Input;
use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

/// Errors raised while waiting for an answer.
#[derive(Debug, Error)]
pub enum PromptError {
    /// The user asked to stop (Ctrl-C or end of input).
    #[error("interrupted by user")]
    Interrupted,
    /// A scripted source ran out of answers.
    #[error("no scripted answer left for '{question}'")]
    Exhausted { question: String },
    /// The terminal could not be read.
    #[error("failed to read answer: {0}")]
    Terminal(#[source] dialoguer::Error),
}

/// A synchronous source of answers to interactive questions.
pub trait AnswerSource {
    /// Asks `question` and returns the raw answer. An empty string means
    /// "take the default".
    fn ask(&mut self, question: &str) -> Result<String, PromptError>;

    /// Shows an informational line (menus, hints) before a question.
    fn show(&mut self, message: &str);
}

/// Shared flag raised when the user requests an early stop.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Lowers the flag once a stop request has been handled.
    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    /// Raises this flag on Ctrl-C instead of killing the process.
    pub fn install_handler(&self) -> Result<(), ctrlc::Error> {
        let flag = self.clone();
        ctrlc::set_handler(move || flag.request_stop())
    }
}

/// Answers read from the terminal.
pub struct ConsoleAnswers {
    stop: StopFlag,
}

impl ConsoleAnswers {
    pub fn new(stop: StopFlag) -> Self {
        Self { stop }
    }
}

impl AnswerSource for ConsoleAnswers {
    fn ask(&mut self, question: &str) -> Result<String, PromptError> {
        if self.stop.is_set() {
            return Err(PromptError::Interrupted);
        }

        let answer = Input::<String>::new()
            .with_prompt(question)
            .allow_empty(true)
            .interact_text()
            .map_err(|err| match err {
                dialoguer::Error::IO(io_err)
                    if matches!(
                        io_err.kind(),
                        io::ErrorKind::Interrupted | io::ErrorKind::UnexpectedEof
                    ) =>
                {
                    PromptError::Interrupted
                }
                other => PromptError::Terminal(other),
            })?;

        // Ctrl-C while the prompt was open only lands once the line is read.
        if self.stop.is_set() {
            return Err(PromptError::Interrupted);
        }
        Ok(answer)
    }

    fn show(&mut self, message: &str) {
        OutputFormatter::plain(message);
    }
}

/// Answers taken from a prepared list, for tests and non-interactive runs.
#[derive(Debug, Default)]
pub struct ScriptedAnswers {
    answers: VecDeque<String>,
    /// Every question asked so far, in order.
    pub asked: Vec<String>,
    /// Every informational line shown so far, in order.
    pub shown: Vec<String>,
}

impl ScriptedAnswers {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            asked: Vec::new(),
            shown: Vec::new(),
        }
    }

    /// Number of answers not yet consumed.
    pub fn remaining(&self) -> usize {
        self.answers.len()
    }
}

impl AnswerSource for ScriptedAnswers {
    fn ask(&mut self, question: &str) -> Result<String, PromptError> {
        self.asked.push(question.to_string());
        self.answers
            .pop_front()
            .ok_or_else(|| PromptError::Exhausted {
                question: question.to_string(),
            })
    }

    fn show(&mut self, message: &str) {
        self.shown.push(message.to_string());
    }
}

/// Asks `question`, substituting `default` for an empty answer.
pub fn ask_with_default(
    answers: &mut dyn AnswerSource,
    question: &str,
    default: &str,
) -> Result<String, PromptError> {
    let prompt = if default.is_empty() {
        question.to_string()
    } else {
        format!("{} [{}]", question, default)
    };
    let answer = answers.ask(&prompt)?;
    let answer = answer.trim();
    if answer.is_empty() {
        Ok(default.to_string())
    } else {
        Ok(answer.to_string())
    }
}

/// Shows a 0-indexed menu and asks until the answer is one of its indices.
///
/// With `default` set, an empty answer selects it.
pub fn choose(
    answers: &mut dyn AnswerSource,
    title: &str,
    options: &[&str],
    question: &str,
    default: Option<usize>,
) -> Result<usize, PromptError> {
    answers.show(title);
    for (index, option) in options.iter().enumerate() {
        answers.show(&format!("{}: {}", index, option));
    }

    let prompt = match default {
        Some(index) => format!("{} [{}]", question, index),
        None => question.to_string(),
    };

    loop {
        let answer = answers.ask(&prompt)?;
        let answer = answer.trim();
        if answer.is_empty()
            && let Some(index) = default
        {
            return Ok(index);
        }
        match answer.parse::<usize>() {
            Ok(index) if index < options.len() => return Ok(index),
            _ => continue,
        }
    }
}

/// Asks a yes/no question until the answer is `y`, `n`, or empty.
pub fn confirm(
    answers: &mut dyn AnswerSource,
    question: &str,
    default: bool,
) -> Result<bool, PromptError> {
    let hint = if default { "[Y/n]" } else { "[y/N]" };
    let prompt = format!("{} {}", question, hint);

    loop {
        let answer = answers.ask(&prompt)?;
        match answer.trim().to_lowercase().as_str() {
            "" => return Ok(default),
            "y" | "yes" => return Ok(true),
            "n" | "no" => return Ok(false),
            _ => continue,
        }
    }
}
