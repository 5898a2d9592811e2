//! Move results and their status state machine.
//!
//! A [`MoveResult`] is created by the first move attempt on a [`Job`] and
//! then mutated in place by resolution actions. Status and diagnostic only
//! ever change together, through [`MoveResult::retry`],
//! [`MoveResult::delete`] and [`MoveResult::overwrite`].

use crate::fsops::{self, FailureKind, MoveError};
use crate::job::Job;
use bytesize::ByteSize;
use std::fmt;
use tracing::{info, warn};

/// Width of a report line, fill included.
const REPORT_WIDTH: usize = 80;

/// Where a job stands after its latest action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MoveStatus {
    Success,
    Duplicate,
    /// The source or destination was held by another process.
    Busy,
    OtherError,
    Deleted,
    Overwritten,
    /// Already reported and not actionable.
    Processed,
}

impl MoveStatus {
    /// Every status, in report order.
    pub const ALL: [MoveStatus; 7] = [
        MoveStatus::Success,
        MoveStatus::Overwritten,
        MoveStatus::Deleted,
        MoveStatus::Duplicate,
        MoveStatus::Busy,
        MoveStatus::OtherError,
        MoveStatus::Processed,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            MoveStatus::Success => "moved",
            MoveStatus::Duplicate => "destination exists",
            MoveStatus::Busy => "file in use",
            MoveStatus::OtherError => "error",
            MoveStatus::Deleted => "deleted source",
            MoveStatus::Overwritten => "overwritten",
            MoveStatus::Processed => "processed",
        }
    }

    /// Whether the resolution loop may act on this status.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, MoveStatus::Duplicate | MoveStatus::Busy)
    }

    /// Whether this status means the job ended up where it should.
    pub fn is_good(&self) -> bool {
        matches!(
            self,
            MoveStatus::Success | MoveStatus::Deleted | MoveStatus::Overwritten
        )
    }

    fn from_failure(kind: FailureKind) -> Self {
        match kind {
            FailureKind::Conflict => MoveStatus::Duplicate,
            FailureKind::Busy => MoveStatus::Busy,
            FailureKind::Unclassified => MoveStatus::OtherError,
        }
    }
}

impl fmt::Display for MoveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The action that produced a result's current status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Move,
    Delete,
    Overwrite,
}

/// A job bound to the outcome of its latest action.
#[derive(Debug)]
pub struct MoveResult {
    job: Job,
    status: MoveStatus,
    diagnostic: Option<MoveError>,
    last_action: Action,
}

impl MoveResult {
    /// Attempts to move `job` and records the classified outcome.
    pub fn attempt(job: Job) -> Self {
        let mut result = Self {
            job,
            status: MoveStatus::Success,
            diagnostic: None,
            last_action: Action::Move,
        };
        result.run(Action::Move);
        result
    }

    pub fn job(&self) -> &Job {
        &self.job
    }

    pub fn status(&self) -> MoveStatus {
        self.status
    }

    pub fn diagnostic(&self) -> Option<&MoveError> {
        self.diagnostic.as_ref()
    }

    pub fn last_action(&self) -> Action {
        self.last_action
    }

    pub fn is_recoverable(&self) -> bool {
        self.status.is_recoverable()
    }

    /// Attempts the move again.
    pub fn move_again(&mut self) -> MoveStatus {
        self.run(Action::Move)
    }

    /// Deletes the source, keeping whatever is at the destination.
    pub fn delete(&mut self) -> MoveStatus {
        self.run(Action::Delete)
    }

    /// Replaces the destination with the source.
    pub fn overwrite(&mut self) -> MoveStatus {
        self.run(Action::Overwrite)
    }

    /// Re-runs whichever action produced the current status.
    pub fn retry(&mut self) -> MoveStatus {
        self.run(self.last_action)
    }

    /// Marks a reported result as done unless it can still be resolved.
    pub fn mark_reported(&mut self) {
        if !self.status.is_recoverable() {
            self.status = MoveStatus::Processed;
        }
    }

    fn run(&mut self, action: Action) -> MoveStatus {
        let (outcome, success) = match action {
            Action::Move => (self.job.move_to_destination(), MoveStatus::Success),
            Action::Delete => (self.job.delete(), MoveStatus::Deleted),
            Action::Overwrite => (self.job.overwrite(), MoveStatus::Overwritten),
        };

        self.last_action = action;
        match outcome {
            Ok(()) => {
                info!(job = %self.job.display_name(), status = %success, "action succeeded");
                self.status = success;
                self.diagnostic = None;
            }
            Err(err) => {
                self.status = MoveStatus::from_failure(err.kind());
                warn!(
                    job = %self.job.display_name(),
                    action = ?action,
                    status = %self.status,
                    error = %err,
                    "action failed"
                );
                self.diagnostic = Some(err);
            }
        }
        self.status
    }

    fn size_of(path: Option<&std::path::Path>) -> String {
        path.and_then(|path| fsops::tree_size(path).ok())
            .map(|bytes| ByteSize::b(bytes).to_string())
            .unwrap_or_else(|| "?".to_string())
    }
}

impl fmt::Display for MoveResult {
    /// `name.........status`, followed by a detail line for duplicates and
    /// failures.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.job.display_name();
        let label = self.status.label();
        let fill = if self.status.is_good() { "." } else { "_" };
        let used = name.chars().count() + label.chars().count();
        let fill_len = REPORT_WIDTH.saturating_sub(used).max(1);

        write!(f, "{}{}{}", name, fill.repeat(fill_len), label)?;

        match self.status {
            MoveStatus::Duplicate => write!(
                f,
                "\n\tsource: {}, dest: {}",
                Self::size_of(Some(self.job.source())),
                Self::size_of(self.job.destination())
            ),
            MoveStatus::Busy | MoveStatus::OtherError => match &self.diagnostic {
                Some(err) => write!(f, "\n\t{}", err),
                None => Ok(()),
            },
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobKind;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn job_with_destination(temp: &TempDir, content: &str) -> (Job, PathBuf) {
        let source = temp.path().join("clip.mp4");
        fs::write(&source, content).unwrap();
        let destination = temp.path().join("dest").join("clip.mp4");
        let mut job = Job::new(JobKind::SingleFile, &source, temp.path());
        job.set_destination(&destination);
        (job, destination)
    }

    #[test]
    fn test_attempt_success() {
        let temp = TempDir::new().unwrap();
        let (job, destination) = job_with_destination(&temp, "v");

        let result = MoveResult::attempt(job);

        assert_eq!(result.status(), MoveStatus::Success);
        assert!(result.diagnostic().is_none());
        assert!(destination.exists());
    }

    #[test]
    fn test_attempt_duplicate_then_delete_clears_diagnostic() {
        let temp = TempDir::new().unwrap();
        let (job, destination) = job_with_destination(&temp, "new");
        fs::create_dir_all(destination.parent().unwrap()).unwrap();
        fs::write(&destination, "old").unwrap();

        let mut result = MoveResult::attempt(job);
        assert_eq!(result.status(), MoveStatus::Duplicate);
        assert!(result.diagnostic().is_some());
        assert!(result.is_recoverable());

        assert_eq!(result.delete(), MoveStatus::Deleted);
        assert!(result.diagnostic().is_none());
        assert!(!result.job().source().exists());
        assert_eq!(fs::read_to_string(&destination).unwrap(), "old");
    }

    #[test]
    fn test_overwrite_transition() {
        let temp = TempDir::new().unwrap();
        let (job, destination) = job_with_destination(&temp, "new");
        fs::create_dir_all(destination.parent().unwrap()).unwrap();
        fs::write(&destination, "old").unwrap();

        let mut result = MoveResult::attempt(job);
        assert_eq!(result.overwrite(), MoveStatus::Overwritten);
        assert_eq!(result.last_action(), Action::Overwrite);
        assert_eq!(fs::read_to_string(&destination).unwrap(), "new");

        // A second overwrite has no source left to move.
        assert_eq!(result.overwrite(), MoveStatus::OtherError);
        assert!(result.diagnostic().is_some());
    }

    #[test]
    fn test_unbuilt_job_is_other_error() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("clip.mp4");
        fs::write(&source, "v").unwrap();
        let result = MoveResult::attempt(Job::new(JobKind::SingleFile, &source, temp.path()));
        assert_eq!(result.status(), MoveStatus::OtherError);
        assert!(!result.is_recoverable());
    }

    #[test]
    fn test_mark_reported_keeps_recoverable() {
        let temp = TempDir::new().unwrap();
        let (job, destination) = job_with_destination(&temp, "new");
        fs::create_dir_all(destination.parent().unwrap()).unwrap();
        fs::write(&destination, "old").unwrap();

        let mut result = MoveResult::attempt(job);
        result.mark_reported();
        assert_eq!(result.status(), MoveStatus::Duplicate);

        result.delete();
        result.mark_reported();
        assert_eq!(result.status(), MoveStatus::Processed);
    }

    #[test]
    fn test_retry_repeats_last_action() {
        let temp = TempDir::new().unwrap();
        let (job, destination) = job_with_destination(&temp, "new");
        fs::create_dir_all(destination.parent().unwrap()).unwrap();
        fs::write(&destination, "old").unwrap();

        let mut result = MoveResult::attempt(job);
        assert_eq!(result.retry(), MoveStatus::Duplicate);
        assert_eq!(result.last_action(), Action::Move);

        fs::remove_file(&destination).unwrap();
        assert_eq!(result.retry(), MoveStatus::Success);
    }

    #[test]
    fn test_move_again_records_action() {
        let temp = TempDir::new().unwrap();
        let (job, destination) = job_with_destination(&temp, "new");
        fs::create_dir_all(destination.parent().unwrap()).unwrap();
        fs::write(&destination, "old").unwrap();

        let mut result = MoveResult::attempt(job);
        result.delete();
        assert_eq!(result.last_action(), Action::Delete);

        // The destination is still occupied by the kept copy.
        assert_eq!(result.move_again(), MoveStatus::Duplicate);
        assert_eq!(result.last_action(), Action::Move);
    }

    #[test]
    fn test_display_formats() {
        let temp = TempDir::new().unwrap();
        let (job, destination) = job_with_destination(&temp, "12345");
        fs::create_dir_all(destination.parent().unwrap()).unwrap();
        fs::write(&destination, "123").unwrap();

        let mut result = MoveResult::attempt(job);
        let text = result.to_string();
        let mut lines = text.lines();
        let first = lines.next().unwrap();
        assert_eq!(first.chars().count(), REPORT_WIDTH);
        assert!(first.starts_with("clip.mp4_"));
        assert!(first.ends_with("destination exists"));
        let second = lines.next().unwrap();
        assert!(second.contains("source: 5 B"));
        assert!(second.contains("dest: 3 B"));

        result.overwrite();
        let text = result.to_string();
        assert!(text.starts_with("clip.mp4."));
        assert!(text.ends_with("overwritten"));
        assert_eq!(text.lines().count(), 1);
    }
}
