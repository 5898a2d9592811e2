//! The batch run: construct, move, report, resolve.
//!
//! An [`Orchestrator`] owns every [`MoveResult`] of a run. Construction and
//! move failures never abort the batch; they become dropped arguments or
//! classified results. Only the user (or an exhausted answer source) ends the
//! resolution loop early.

use crate::builder::{BuildError, DestinationBuilder};
use crate::config::ValidatedConfig;
use crate::job::{Job, JobKind};
use crate::output::OutputFormatter;
use crate::policy::Policy;
use crate::prompt::{self, AnswerSource, PromptError, StopFlag};
use crate::result::{MoveResult, MoveStatus};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Counts describing how a run ended.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Paths given on the command line.
    pub requested: usize,
    /// Jobs that were validated and built.
    pub constructed: usize,
    /// Paths dropped during construction.
    pub dropped: usize,
    /// Final status of every job that was moved, keyed by status.
    pub statuses: BTreeMap<MoveStatus, usize>,
    /// Results still recoverable when the run ended.
    pub unresolved: usize,
    /// Whether the user stopped the run early at some point.
    pub interrupted: bool,
}

impl RunSummary {
    pub fn count(&self, status: MoveStatus) -> usize {
        self.statuses.get(&status).copied().unwrap_or(0)
    }

    /// Number of jobs that received a result.
    pub fn attempted(&self) -> usize {
        self.statuses.values().sum()
    }

    fn record(&mut self, status: MoveStatus) {
        *self.statuses.entry(status).or_insert(0) += 1;
    }

    /// Prints the summary table.
    pub fn print(&self) {
        let rows: Vec<(&str, usize)> = MoveStatus::ALL
            .iter()
            .map(|status| (status.label(), self.count(*status)))
            .collect();
        OutputFormatter::summary_table(&rows, self.attempted());

        if self.dropped > 0 {
            OutputFormatter::warning(&format!("Dropped {} of {} path(s)", self.dropped, self.requested));
        }
        if self.unresolved > 0 {
            OutputFormatter::warning(&format!("{} result(s) left unresolved", self.unresolved));
        }
    }
}

/// Drives one batch run against a validated configuration.
pub struct Orchestrator<'a> {
    config: &'a ValidatedConfig,
    answers: &'a mut dyn AnswerSource,
    stop: StopFlag,
    results: Vec<MoveResult>,
    summary: RunSummary,
}

impl<'a> Orchestrator<'a> {
    pub fn new(config: &'a ValidatedConfig, answers: &'a mut dyn AnswerSource, stop: StopFlag) -> Self {
        Self {
            config,
            answers,
            stop,
            results: Vec::new(),
            summary: RunSummary::default(),
        }
    }

    /// Results produced so far.
    pub fn results(&self) -> &[MoveResult] {
        &self.results
    }

    /// Runs every phase for `paths` and returns the summary.
    pub fn run(mut self, kind: JobKind, paths: &[PathBuf]) -> RunSummary {
        let jobs = self.construct(kind, paths);
        self.move_all(jobs);
        self.report();
        self.resolve();
        self.finish()
    }

    /// Validates and builds a job for each path.
    ///
    /// Invalid paths are dropped. A prompt failure drops the path being built
    /// and every path after it.
    pub fn construct(&mut self, kind: JobKind, paths: &[PathBuf]) -> Vec<Job> {
        let total = paths.len();
        self.summary.requested += total;
        OutputFormatter::title(&format!("Processing {} files", total));

        let builder = DestinationBuilder::new(self.config);
        let mut jobs = Vec::with_capacity(total);

        for (index, path) in paths.iter().enumerate() {
            if self.stop.is_set() {
                self.drop_remaining(total - index);
                break;
            }

            OutputFormatter::header(&format!("Job {}/{}", index + 1, total));
            match builder.construct(kind, path, &mut *self.answers) {
                Ok(job) => {
                    info!(source = %path.display(), "job constructed");
                    jobs.push(job);
                }
                Err(BuildError::Invalid(err)) => {
                    warn!(source = %path.display(), error = %err, "dropping job");
                    OutputFormatter::error(&err.to_string());
                    OutputFormatter::plain("Dropping job.");
                    self.summary.dropped += 1;
                }
                Err(BuildError::Prompt(err)) => {
                    warn!(source = %path.display(), error = %err, "construction stopped");
                    OutputFormatter::error(&err.to_string());
                    self.drop_remaining(total - index);
                    break;
                }
            }
            OutputFormatter::separator();
        }

        self.summary.constructed += jobs.len();
        OutputFormatter::info(&format!("Processed: {}/{}", jobs.len(), total));
        OutputFormatter::plain(&format!("Dropped: {}", total - jobs.len()));
        jobs
    }

    /// Attempts the first move of every job.
    ///
    /// A stop request ends the phase; jobs not yet attempted get no result.
    pub fn move_all(&mut self, jobs: Vec<Job>) {
        let progress = OutputFormatter::create_progress_bar(jobs.len() as u64);

        for job in jobs {
            if self.stop.is_set() {
                self.note_interrupt("move");
                break;
            }
            progress.set_message(job.display_name());
            let result = MoveResult::attempt(job);
            debug!(job = %result.job().display_name(), status = %result.status(), "moved");
            self.results.push(result);
            progress.inc(1);
        }

        progress.finish_and_clear();
    }

    /// Prints every result not yet processed, then retires the ones that
    /// cannot be resolved.
    pub fn report(&mut self) {
        for result in &mut self.results {
            let status = result.status();
            if status == MoveStatus::Processed {
                continue;
            }
            OutputFormatter::result_line(&result.to_string(), status.is_good(), status.is_recoverable());
            if !status.is_recoverable() {
                self.summary.record(status);
            }
            result.mark_reported();
        }
    }

    /// Applies user-chosen policies until nothing recoverable is left or the
    /// user stops.
    pub fn resolve(&mut self) {
        let mut policy: Option<Policy> = None;

        loop {
            if self.stop.is_set() {
                self.note_interrupt("resolve");
                break;
            }

            let (duplicates, busy) = self.pending();
            if duplicates + busy == 0 {
                break;
            }

            let current = match policy {
                Some(policy) => policy,
                None => {
                    OutputFormatter::header("Resolve");
                    match Policy::gather(&mut *self.answers, duplicates, busy) {
                        Ok(policy) => policy,
                        Err(err) => {
                            self.note_prompt_error(&err);
                            break;
                        }
                    }
                }
            };

            let actionable = self
                .results
                .iter()
                .filter(|result| current.acts_on(result.status()))
                .count();
            if current.is_empty() || actionable == 0 {
                match prompt::confirm(
                    &mut *self.answers,
                    "This policy leaves everything as it is. Choose another one?",
                    true,
                ) {
                    Ok(true) => {
                        policy = None;
                        continue;
                    }
                    Ok(false) => break,
                    Err(err) => {
                        self.note_prompt_error(&err);
                        break;
                    }
                }
            }
            policy = Some(current);

            info!(policy = ?current, actionable, "applying policy");
            self.apply(current);
            self.report();

            let (duplicates, busy) = self.pending();
            let remaining = duplicates + busy;
            if remaining == 0 {
                OutputFormatter::success("All results resolved");
                break;
            }

            match self.ask_again(remaining) {
                Ok(Some(keep)) => {
                    if !keep {
                        policy = None;
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    self.note_prompt_error(&err);
                    break;
                }
            }
        }
    }

    /// Records the final status of whatever is still recoverable and returns
    /// the summary.
    pub fn finish(mut self) -> RunSummary {
        for result in &self.results {
            if result.is_recoverable() {
                self.summary.record(result.status());
                self.summary.unresolved += 1;
            }
        }
        self.summary
    }

    fn apply(&mut self, policy: Policy) {
        for result in &mut self.results {
            if self.stop.is_set() {
                break;
            }
            if let Some(status) = policy.apply(result) {
                debug!(job = %result.job().display_name(), %status, "policy applied");
            }
        }
    }

    /// `Some(keep_policy)` to go again, `None` to stop.
    fn ask_again(&mut self, remaining: usize) -> Result<Option<bool>, PromptError> {
        OutputFormatter::warning(&format!("{} result(s) still need attention.", remaining));
        if !prompt::confirm(&mut *self.answers, "Try again?", true)? {
            return Ok(None);
        }
        let keep = prompt::confirm(&mut *self.answers, "Keep the same policy?", true)?;
        Ok(Some(keep))
    }

    fn pending(&self) -> (usize, usize) {
        self.results
            .iter()
            .fold((0, 0), |(duplicates, busy), result| match result.status() {
                MoveStatus::Duplicate => (duplicates + 1, busy),
                MoveStatus::Busy => (duplicates, busy + 1),
                _ => (duplicates, busy),
            })
    }

    fn drop_remaining(&mut self, count: usize) {
        OutputFormatter::warning("Dropping remaining jobs.");
        self.summary.dropped += count;
        self.summary.interrupted = true;
        self.stop.clear();
    }

    fn note_interrupt(&mut self, phase: &str) {
        warn!(phase, "stopped by user");
        OutputFormatter::warning(&format!("Stopped during {}.", phase));
        self.summary.interrupted = true;
        self.stop.clear();
    }

    fn note_prompt_error(&mut self, err: &PromptError) {
        warn!(error = %err, "leaving resolution");
        if matches!(err, PromptError::Interrupted) {
            self.summary.interrupted = true;
            self.stop.clear();
        } else {
            OutputFormatter::error(&err.to_string());
        }
    }
}
