//! Relocation jobs.
//!
//! A [`Job`] is one source path waiting to be relocated under a destination
//! root. Its [`JobKind`] decides how it is validated and moved:
//!
//! - [`JobKind::SingleFile`]: a regular file, renamed into place.
//! - [`JobKind::Composite`]: a directory or a zip archive whose *contents*
//!   are relocated into a freshly created destination directory.
//!
//! Jobs report failures as [`MoveError`]s; the caller decides what a failure
//! means for the run (see [`crate::result`]).

use crate::fsops::{self, FsOpsResult, MoveError};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// The only archive format recognized, matched on the file extension.
pub const ARCHIVE_EXTENSION: &str = "zip";

/// Errors found while checking a job's source or building its name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("path does not exist: {}", path.display())]
    Missing { path: PathBuf },
    #[error("path is not a file: {}", path.display())]
    NotAFile { path: PathBuf },
    #[error("path is not a directory or .zip archive: {}", path.display())]
    NotCompositeSource { path: PathBuf },
    #[error("no name left after removing the tag from '{name}'")]
    NoBaseName { name: String },
}

/// How a job is validated and relocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    /// A single regular file, placed under a subcategory.
    SingleFile,
    /// A directory or zip archive, placed directly under its root.
    Composite,
}

impl JobKind {
    /// All kinds, in menu order.
    pub const ALL: [JobKind; 2] = [JobKind::SingleFile, JobKind::Composite];

    /// Menu label for this kind.
    pub fn label(&self) -> &'static str {
        match self {
            JobKind::SingleFile => "Video",
            JobKind::Composite => "Other",
        }
    }
}

/// One source path and where it is going.
#[derive(Debug)]
pub struct Job {
    source: PathBuf,
    destination_root: PathBuf,
    destination: Option<PathBuf>,
    kind: JobKind,
    extracted: Option<PathBuf>,
}

impl Job {
    /// Creates an unvalidated job with no destination.
    pub fn new(kind: JobKind, source: impl Into<PathBuf>, destination_root: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            destination_root: destination_root.into(),
            destination: None,
            kind,
            extracted: None,
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn destination_root(&self) -> &Path {
        &self.destination_root
    }

    pub fn destination(&self) -> Option<&Path> {
        self.destination.as_deref()
    }

    pub fn kind(&self) -> JobKind {
        self.kind
    }

    /// Directory an archive was unpacked into, once extraction has happened.
    pub fn extracted(&self) -> Option<&Path> {
        self.extracted.as_deref()
    }

    pub fn set_destination(&mut self, destination: impl Into<PathBuf>) {
        self.destination = Some(destination.into());
    }

    /// Name used when reporting this job: the destination's file name, or
    /// the source's before a destination exists.
    pub fn display_name(&self) -> String {
        self.destination
            .as_deref()
            .unwrap_or(&self.source)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.source.display().to_string())
    }

    /// Whether the source is a zip archive (by extension).
    pub fn is_archive(&self) -> bool {
        self.source
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(ARCHIVE_EXTENSION))
    }

    /// Checks that the source exists and has the type this kind requires.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.source.exists() {
            return Err(ValidationError::Missing {
                path: self.source.clone(),
            });
        }

        match self.kind {
            JobKind::SingleFile if !self.source.is_file() => Err(ValidationError::NotAFile {
                path: self.source.clone(),
            }),
            JobKind::Composite
                if !(self.source.is_dir() || (self.source.is_file() && self.is_archive())) =>
            {
                Err(ValidationError::NotCompositeSource {
                    path: self.source.clone(),
                })
            }
            _ => Ok(()),
        }
    }

    /// Moves the source to its destination, refusing to replace anything
    /// already there.
    pub fn move_to_destination(&mut self) -> FsOpsResult<()> {
        let destination = self.require_destination()?;
        if fsops::same_entry(&self.source, &destination) {
            debug!(destination = %destination.display(), "already in place");
            return Ok(());
        }
        match self.kind {
            JobKind::SingleFile if destination.is_file() => {
                Err(MoveError::DestinationExists(destination))
            }
            JobKind::Composite if destination.is_dir() => {
                Err(MoveError::DestinationIsDirectory(destination))
            }
            JobKind::Composite if destination.exists() => {
                Err(MoveError::DestinationExists(destination))
            }
            _ => self.overwrite(),
        }
    }

    /// Moves the source to its destination, replacing whatever is there.
    pub fn overwrite(&mut self) -> FsOpsResult<()> {
        let destination = self.require_destination()?;
        self.validate()?;

        info!(
            source = %self.source.display(),
            destination = %destination.display(),
            "relocating"
        );
        match self.kind {
            JobKind::SingleFile => self.overwrite_file(&destination),
            JobKind::Composite => self.overwrite_composite(&destination),
        }
    }

    /// Removes the source, plus any directory it was extracted into.
    pub fn delete(&mut self) -> FsOpsResult<()> {
        if let Some(destination) = &self.destination
            && fsops::same_entry(&self.source, destination)
        {
            // The source is the destination; there is no separate copy to drop.
            return Ok(());
        }

        info!(source = %self.source.display(), "deleting source");
        match self.kind {
            JobKind::SingleFile => {
                if self.source.is_file() {
                    fs::remove_file(&self.source)
                        .map_err(|e| MoveError::io("delete.remove_file", &self.source, e))?;
                }
            }
            JobKind::Composite => {
                fsops::remove_path(&self.source)?;
                if let Some(extracted) = self.extracted.take()
                    && let Err(err) = fsops::remove_path(&extracted)
                {
                    self.extracted = Some(extracted);
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    fn require_destination(&self) -> FsOpsResult<PathBuf> {
        self.destination
            .clone()
            .ok_or_else(|| MoveError::Unbuilt(self.source.clone()))
    }

    fn overwrite_file(&mut self, destination: &Path) -> FsOpsResult<()> {
        if fsops::same_entry(&self.source, destination) {
            return Ok(());
        }
        if destination.is_dir() {
            return Err(MoveError::DestinationIsDirectory(destination.to_path_buf()));
        }
        if destination.exists() {
            fsops::remove_path(destination)?;
        }
        fsops::ensure_parent(destination)?;
        fsops::relocate(&self.source, destination)
    }

    /// Replaces `destination` with the contents of the source directory or
    /// archive.
    ///
    /// The destination is always erased first and rebuilt from scratch; the
    /// two trees are never reconciled entry by entry.
    fn overwrite_composite(&mut self, destination: &Path) -> FsOpsResult<()> {
        let mut contents = self.prepare_contents()?;

        if let Some(extracted) = self.extracted.clone()
            && extracted != contents
            && fsops::same_entry(&extracted, destination)
        {
            // The extraction directory is about to be erased as the old
            // destination; park it under another name first.
            let staged = staging_path(&extracted);
            fsops::relocate(&extracted, &staged)?;
            self.extracted = Some(staged.clone());
            contents = fsops::content_root(&staged)?;
        }

        if fsops::same_entry(&contents, destination) {
            debug!(destination = %destination.display(), "contents already in place");
            return self.finish_archive(destination);
        }

        if destination.exists() {
            fsops::remove_path(destination)?;
        }
        fsops::ensure_parent(destination)?;

        if contents.parent() == destination.parent() {
            fsops::relocate(&contents, destination)?;
        } else {
            fs::create_dir(destination)
                .map_err(|e| MoveError::io("overwrite.create_destination", destination, e))?;

            let children = fs::read_dir(&contents)
                .map_err(|e| MoveError::io("overwrite.read_source", &contents, e))?;
            for child in children {
                let child = child.map_err(|e| MoveError::io("overwrite.read_entry", &contents, e))?;
                fsops::relocate(&child.path(), &destination.join(child.file_name()))?;
            }

            fs::remove_dir(&contents)
                .map_err(|e| MoveError::io("overwrite.remove_source", &contents, e))?;
        }

        self.finish_archive(destination)
    }

    /// Removes the extraction directory and the original archive once its
    /// contents have been relocated.
    fn finish_archive(&mut self, destination: &Path) -> FsOpsResult<()> {
        if !self.is_archive() {
            return Ok(());
        }
        if let Some(extracted) = self.extracted.take()
            && !fsops::same_entry(&extracted, destination)
        {
            fsops::remove_path(&extracted)?;
        }
        fs::remove_file(&self.source)
            .map_err(|e| MoveError::io("overwrite.remove_archive", &self.source, e))
    }

    /// Returns the directory whose contents should be relocated, extracting
    /// the archive first if needed.
    ///
    /// Extraction goes to `source.parent/source.stem` and is skipped when
    /// that directory already exists, so retries within a run reuse it.
    fn prepare_contents(&mut self) -> FsOpsResult<PathBuf> {
        if !self.is_archive() {
            return Ok(self.source.clone());
        }

        let target = match &self.extracted {
            Some(extracted) => extracted.clone(),
            None => {
                let target = self.extraction_target();
                if target.is_dir() {
                    debug!(target = %target.display(), "archive already extracted");
                } else {
                    fsops::extract_zip(&self.source, &target)?;
                }
                self.extracted = Some(target.clone());
                target
            }
        };

        fsops::content_root(&target)
    }

    fn extraction_target(&self) -> PathBuf {
        let stem = self.source.file_stem().unwrap_or_default();
        match self.source.parent() {
            Some(parent) => parent.join(stem),
            None => PathBuf::from(stem),
        }
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".sorting-hat-staging");
    path.with_file_name(name)
}
