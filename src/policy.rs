//! Resolution policies for recoverable results.

use crate::prompt::{self, AnswerSource, PromptError};
use crate::result::{MoveResult, MoveStatus};

/// What to do with a result whose destination is already occupied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// Delete the source and keep the existing destination.
    Delete,
    /// Replace the destination with the source.
    Overwrite,
    Ignore,
}

/// What to do with a result blocked by a file in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusyPolicy {
    /// Run the blocked action again.
    Retry,
    Abort,
}

/// A user-chosen resolution strategy, applied to every recoverable result
/// in a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Policy {
    pub on_duplicate: DuplicatePolicy,
    pub on_busy: BusyPolicy,
}

impl Default for Policy {
    fn default() -> Self {
        Self::EMPTY
    }
}

const DUPLICATE_OPTIONS: [(&str, DuplicatePolicy); 3] = [
    ("Delete source (keep destination)", DuplicatePolicy::Delete),
    ("Overwrite destination", DuplicatePolicy::Overwrite),
    ("Ignore", DuplicatePolicy::Ignore),
];

const BUSY_OPTIONS: [(&str, BusyPolicy); 2] = [
    ("Retry", BusyPolicy::Retry),
    ("Abort", BusyPolicy::Abort),
];

impl Policy {
    /// The policy that takes no action at all.
    pub const EMPTY: Policy = Policy {
        on_duplicate: DuplicatePolicy::Ignore,
        on_busy: BusyPolicy::Abort,
    };

    pub fn new(on_duplicate: DuplicatePolicy, on_busy: BusyPolicy) -> Self {
        Self {
            on_duplicate,
            on_busy,
        }
    }

    /// Whether applying this policy would never change anything.
    pub fn is_empty(&self) -> bool {
        *self == Self::EMPTY
    }

    /// Asks the user for a policy.
    ///
    /// Only the axes with pending results are asked about; the others stay
    /// at Ignore/Abort. Duplicates default to deleting the source and busy
    /// results default to retrying.
    pub fn gather(
        answers: &mut dyn AnswerSource,
        duplicates: usize,
        busy: usize,
    ) -> Result<Self, PromptError> {
        let mut policy = Self::EMPTY;

        if duplicates > 0 {
            let labels: Vec<&str> = DUPLICATE_OPTIONS.iter().map(|(label, _)| *label).collect();
            let choice = prompt::choose(
                answers,
                &format!("{} duplicate(s). When the destination exists:", duplicates),
                &labels,
                "Duplicate policy #",
                Some(0),
            )?;
            policy.on_duplicate = DUPLICATE_OPTIONS[choice].1;
        }

        if busy > 0 {
            let labels: Vec<&str> = BUSY_OPTIONS.iter().map(|(label, _)| *label).collect();
            let choice = prompt::choose(
                answers,
                &format!("{} file(s) in use. When a file is in use:", busy),
                &labels,
                "Busy policy #",
                Some(0),
            )?;
            policy.on_busy = BUSY_OPTIONS[choice].1;
        }

        Ok(policy)
    }

    /// Whether [`Policy::apply`] would act on a result with `status`.
    pub fn acts_on(&self, status: MoveStatus) -> bool {
        match status {
            MoveStatus::Duplicate => self.on_duplicate != DuplicatePolicy::Ignore,
            MoveStatus::Busy => self.on_busy == BusyPolicy::Retry,
            _ => false,
        }
    }

    /// Applies this policy to one result.
    ///
    /// Returns the new status, or `None` if the policy says to leave the
    /// result alone.
    pub fn apply(&self, result: &mut MoveResult) -> Option<MoveStatus> {
        match (result.status(), self.on_duplicate, self.on_busy) {
            (MoveStatus::Duplicate, DuplicatePolicy::Delete, _) => Some(result.delete()),
            (MoveStatus::Duplicate, DuplicatePolicy::Overwrite, _) => Some(result.overwrite()),
            (MoveStatus::Busy, _, BusyPolicy::Retry) => Some(result.retry()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{Job, JobKind};
    use crate::prompt::ScriptedAnswers;
    use std::fs;
    use tempfile::TempDir;

    fn duplicate(temp: &TempDir) -> MoveResult {
        let source = temp.path().join("a.mp4");
        let destination = temp.path().join("b.mp4");
        fs::write(&source, "new").unwrap();
        fs::write(&destination, "old").unwrap();
        let mut job = Job::new(JobKind::SingleFile, &source, temp.path());
        job.set_destination(&destination);
        MoveResult::attempt(job)
    }

    #[test]
    fn test_empty_policy() {
        assert!(Policy::EMPTY.is_empty());
        assert!(Policy::default().is_empty());
        assert!(!Policy::new(DuplicatePolicy::Delete, BusyPolicy::Abort).is_empty());
        assert!(!Policy::new(DuplicatePolicy::Ignore, BusyPolicy::Retry).is_empty());
    }

    #[test]
    fn test_acts_on() {
        let policy = Policy::new(DuplicatePolicy::Ignore, BusyPolicy::Retry);
        assert!(!policy.acts_on(MoveStatus::Duplicate));
        assert!(policy.acts_on(MoveStatus::Busy));
        assert!(!policy.acts_on(MoveStatus::OtherError));
        assert!(!Policy::EMPTY.acts_on(MoveStatus::Busy));
    }

    #[test]
    fn test_gather_defaults() {
        let mut answers = ScriptedAnswers::new(["", ""]);
        let policy = Policy::gather(&mut answers, 2, 1).unwrap();
        assert_eq!(
            policy,
            Policy::new(DuplicatePolicy::Delete, BusyPolicy::Retry)
        );
    }

    #[test]
    fn test_gather_only_asks_relevant_axes() {
        let mut answers = ScriptedAnswers::new(["1"]);
        let policy = Policy::gather(&mut answers, 3, 0).unwrap();
        assert_eq!(policy.on_duplicate, DuplicatePolicy::Overwrite);
        assert_eq!(policy.on_busy, BusyPolicy::Abort);
        assert_eq!(answers.asked.len(), 1);
    }

    #[test]
    fn test_apply_ignore_leaves_result() {
        let temp = TempDir::new().unwrap();
        let mut result = duplicate(&temp);
        assert_eq!(Policy::EMPTY.apply(&mut result), None);
        assert_eq!(result.status(), MoveStatus::Duplicate);
    }

    /// Makes `dir` read-only. Returns `false` (and leaves it writable) when
    /// the current user can write to it anyway.
    #[cfg(unix)]
    fn lock_dir(dir: &std::path::Path) -> bool {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(dir, fs::Permissions::from_mode(0o555)).unwrap();
        let check = dir.join(".write-check");
        if fs::write(&check, "").is_ok() {
            fs::remove_file(&check).unwrap();
            fs::set_permissions(dir, fs::Permissions::from_mode(0o755)).unwrap();
            return false;
        }
        true
    }

    #[cfg(unix)]
    #[test]
    fn test_apply_retry_while_busy() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let source = temp.path().join("clip.mp4");
        let locked = temp.path().join("locked");
        fs::write(&source, "v").unwrap();
        fs::create_dir(&locked).unwrap();
        if !lock_dir(&locked) {
            return;
        }

        let mut job = Job::new(JobKind::SingleFile, &source, temp.path());
        job.set_destination(locked.join("clip.mp4"));
        let mut result = MoveResult::attempt(job);
        assert_eq!(result.status(), MoveStatus::Busy);
        assert!(result.is_recoverable());

        let policy = Policy::new(DuplicatePolicy::Ignore, BusyPolicy::Retry);
        assert_eq!(policy.apply(&mut result), Some(MoveStatus::Busy));
        assert!(result.diagnostic().is_some());

        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        assert_eq!(policy.apply(&mut result), Some(MoveStatus::Success));
        assert!(result.diagnostic().is_none());
        assert_eq!(fs::read_to_string(locked.join("clip.mp4")).unwrap(), "v");
        assert!(!source.exists());
    }

    #[test]
    fn test_apply_overwrite() {
        let temp = TempDir::new().unwrap();
        let mut result = duplicate(&temp);
        let policy = Policy::new(DuplicatePolicy::Overwrite, BusyPolicy::Abort);
        assert_eq!(policy.apply(&mut result), Some(MoveStatus::Overwritten));
        assert_eq!(
            fs::read_to_string(temp.path().join("b.mp4")).unwrap(),
            "new"
        );
    }
}
