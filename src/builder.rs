//! Interactive destination building.
//!
//! Turns a validated [`Job`] into one with a destination: the user confirms
//! or edits the author tag and name, the result is sanitized and checked,
//! and single files are placed in a subcategory chosen from a menu.

use crate::config::ValidatedConfig;
use crate::job::{Job, JobKind, ValidationError};
use crate::naming;
use crate::prompt::{self, AnswerSource, PromptError};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Answer that clears a pre-filled tag.
pub const NO_TAG: &str = "-";

/// Errors that prevent a job from being constructed.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error(transparent)]
    Prompt(#[from] PromptError),
}

/// Asks which kind of job this run processes.
pub fn choose_kind(answers: &mut dyn AnswerSource) -> Result<JobKind, PromptError> {
    let labels: Vec<&str> = JobKind::ALL.iter().map(JobKind::label).collect();
    let index = prompt::choose(
        answers,
        "File type to be processed:",
        &labels,
        "Selection #",
        None,
    )?;
    Ok(JobKind::ALL[index])
}

/// Builds destinations for jobs under the configured roots.
pub struct DestinationBuilder<'a> {
    config: &'a ValidatedConfig,
}

impl<'a> DestinationBuilder<'a> {
    pub fn new(config: &'a ValidatedConfig) -> Self {
        Self { config }
    }

    /// Validates `source` as a job of `kind` and builds its destination.
    pub fn construct(
        &self,
        kind: JobKind,
        source: &Path,
        answers: &mut dyn AnswerSource,
    ) -> Result<Job, BuildError> {
        let mut job = Job::new(kind, source, self.config.root_for(kind));
        job.validate()?;
        self.build(&mut job, answers)?;
        Ok(job)
    }

    /// Asks for the name (and category for single files) and sets the job's
    /// destination.
    pub fn build(&self, job: &mut Job, answers: &mut dyn AnswerSource) -> Result<(), BuildError> {
        let (stem, extension) = split_source_name(job);
        answers.show(&format!("Current file: {}{}", stem, extension));

        let extracted_tag = naming::extract_tag(&stem);
        let base_name = naming::extract_name(&stem)?;

        let tag = prompt::ask_with_default(
            answers,
            &format!("Author tag (optional, '{}' for none)", NO_TAG),
            extracted_tag.as_deref().unwrap_or(""),
        )?;
        let tag = match tag.as_str() {
            NO_TAG => None,
            typed => naming::normalize_tag(typed),
        };
        let name = prompt::ask_with_default(answers, "Update name (optional)", &base_name)?;

        let composed = naming::compose(tag.as_deref(), &name);
        let accepted = confirm_name(answers, composed, &extension)?;
        let final_name = format!("{}{}", accepted, extension);

        let destination = match job.kind() {
            JobKind::SingleFile => {
                let categories = self.config.video_categories();
                let labels: Vec<&str> = categories.iter().map(|c| c.label.as_str()).collect();
                let index = prompt::choose(answers, "Categories:", &labels, "Choose category #", None)?;
                job.destination_root().join(&categories[index].dir).join(&final_name)
            }
            JobKind::Composite => job.destination_root().join(&final_name),
        };

        debug!(
            source = %job.source().display(),
            destination = %destination.display(),
            "destination built"
        );
        job.set_destination(destination);
        Ok(())
    }
}

/// The name to edit and the extension the destination keeps.
///
/// Single files keep their extension. Archives drop it since they become a
/// directory, and directories use their whole name as the stem.
fn split_source_name(job: &Job) -> (String, String) {
    let source = job.source();
    let lossy = |s: &std::ffi::OsStr| s.to_string_lossy().into_owned();

    match job.kind() {
        JobKind::SingleFile => (
            source.file_stem().map(lossy).unwrap_or_default(),
            source
                .extension()
                .map(|ext| format!(".{}", ext.to_string_lossy()))
                .unwrap_or_default(),
        ),
        JobKind::Composite if job.is_archive() => {
            (source.file_stem().map(lossy).unwrap_or_default(), String::new())
        }
        JobKind::Composite => (source.file_name().map(lossy).unwrap_or_default(), String::new()),
    }
}

/// Sanitizes `raw` and asks until the result is safe to use.
///
/// If sanitizing changed the name, the cleaned version is offered for
/// confirmation; an empty answer accepts it, anything else replaces it.
fn confirm_name(
    answers: &mut dyn AnswerSource,
    raw: String,
    extension: &str,
) -> Result<String, PromptError> {
    let mut raw = raw;
    loop {
        let candidate = naming::sanitize(&raw);
        match naming::check_safe(&candidate, extension) {
            Ok(()) if candidate == raw => return Ok(candidate),
            Ok(()) => {
                let answer = answers.ask(&format!(
                    "Name cleaned to '{}'. Press enter to accept or type a new name",
                    candidate
                ))?;
                let answer = answer.trim();
                if answer.is_empty() {
                    return Ok(candidate);
                }
                raw = answer.to_string();
            }
            Err(reason) => {
                answers.show(&format!("Unusable name '{}': {}", candidate, reason));
                raw = answers.ask("Enter a new name")?.trim().to_string();
            }
        }
    }
}
