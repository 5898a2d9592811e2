/// Filesystem primitives used to relocate jobs.
///
/// Everything here works on plain paths: relocating a file or directory
/// (rename with a copy+delete fallback across filesystems), removing a path
/// whatever its type, unpacking zip archives, and measuring a tree. Failures
/// are reported as [`MoveError`]s, which know how they should be classified.
use crate::job::ValidationError;
use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;
use zip::ZipArchive;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

/// How a failed operation should be treated by the resolution loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The destination is already occupied.
    Conflict,
    /// The operating system reported the resource as in use.
    Busy,
    /// Anything else.
    Unclassified,
}

/// Errors that can occur while moving, overwriting, or deleting a job.
#[derive(Debug, Error)]
pub enum MoveError {
    /// A file already sits at the destination.
    #[error("file exists: {}", .0.display())]
    DestinationExists(PathBuf),
    /// A directory already sits at the destination.
    #[error("directory exists: {}", .0.display())]
    DestinationIsDirectory(PathBuf),
    /// `move`/`overwrite` was called before a destination was built.
    #[error("no destination has been built for {}", .0.display())]
    Unbuilt(PathBuf),
    /// The source no longer passes validation.
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    /// IO failures while interacting with the filesystem.
    #[error("{operation} failed for {}: {source}", path.display())]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Directory traversal failures.
    #[error("{operation} failed while walking {}: {source}", path.display())]
    Walk {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
    /// Zip archive failures.
    #[error("{operation} failed for {}: {source}", path.display())]
    Zip {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },
    /// An archive entry would be written outside its extraction directory.
    #[error("archive {} contains unsafe entry '{entry}'", archive.display())]
    UnsafeArchiveEntry { archive: PathBuf, entry: String },
}

impl MoveError {
    pub(crate) fn io(operation: &'static str, path: &Path, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.to_path_buf(),
            source,
        }
    }

    fn walk(operation: &'static str, path: &Path, source: walkdir::Error) -> Self {
        Self::Walk {
            operation,
            path: path.to_path_buf(),
            source,
        }
    }

    fn zip(operation: &'static str, path: &Path, source: zip::result::ZipError) -> Self {
        Self::Zip {
            operation,
            path: path.to_path_buf(),
            source,
        }
    }

    /// Classifies this error for the resolution loop.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::DestinationExists(_) | Self::DestinationIsDirectory(_) => FailureKind::Conflict,
            Self::Io { source, .. } if is_busy(source) => FailureKind::Busy,
            Self::Walk { source, .. } if source.io_error().is_some_and(is_busy) => {
                FailureKind::Busy
            }
            Self::Zip {
                source: zip::result::ZipError::Io(source),
                ..
            } if is_busy(source) => FailureKind::Busy,
            _ => FailureKind::Unclassified,
        }
    }
}

/// Result type for filesystem operations on jobs.
pub type FsOpsResult<T> = Result<T, MoveError>;

/// Whether `err` means another process holds the file or directory.
pub fn is_busy(err: &io::Error) -> bool {
    if matches!(
        err.kind(),
        io::ErrorKind::ResourceBusy
            | io::ErrorKind::PermissionDenied
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::TimedOut
    ) {
        return true;
    }

    // EBUSY, ETXTBSY
    #[cfg(unix)]
    let busy_codes: &[i32] = &[16, 26];
    // ERROR_SHARING_VIOLATION, ERROR_LOCK_VIOLATION
    #[cfg(windows)]
    let busy_codes: &[i32] = &[32, 33];
    #[cfg(not(any(unix, windows)))]
    let busy_codes: &[i32] = &[];

    err.raw_os_error()
        .is_some_and(|code| busy_codes.contains(&code))
}

/// Whether two paths name the same filesystem entry.
pub fn same_entry(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Creates the parent directory of `path` if it is missing.
pub fn ensure_parent(path: &Path) -> FsOpsResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        fs::create_dir_all(parent)
            .map_err(|e| MoveError::io("ensure_parent.create_dir", parent, e))?;
    }
    Ok(())
}

/// Removes `path` whether it is a file or a directory tree. Missing paths
/// are not an error.
pub fn remove_path(path: &Path) -> FsOpsResult<()> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(MoveError::io("remove_path.metadata", path, e)),
    };

    debug!(path = %path.display(), "removing");
    if metadata.is_dir() {
        fs::remove_dir_all(path).map_err(|e| MoveError::io("remove_path.remove_dir", path, e))
    } else {
        fs::remove_file(path).map_err(|e| MoveError::io("remove_path.remove_file", path, e))
    }
}

/// Moves `source` to `destination`.
///
/// A rename is attempted first; if the two paths live on different
/// filesystems the entry is copied and the original removed.
pub fn relocate(source: &Path, destination: &Path) -> FsOpsResult<()> {
    match fs::rename(source, destination) {
        Ok(()) => {
            debug!(from = %source.display(), to = %destination.display(), "renamed");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            debug!(
                from = %source.display(),
                to = %destination.display(),
                "crossing filesystems, copying"
            );
            copy_tree(source, destination)?;
            remove_path(source)
        }
        Err(e) => Err(MoveError::io("relocate.rename", source, e)),
    }
}

/// Copies a file, or a directory and everything below it.
pub fn copy_tree(source: &Path, destination: &Path) -> FsOpsResult<()> {
    if source.is_file() {
        ensure_parent(destination)?;
        fs::copy(source, destination)
            .map_err(|e| MoveError::io("copy_tree.copy_file", destination, e))?;
        return Ok(());
    }

    fs::create_dir_all(destination)
        .map_err(|e| MoveError::io("copy_tree.create_dir", destination, e))?;

    for entry in WalkDir::new(source).min_depth(1) {
        let entry = entry.map_err(|e| MoveError::walk("copy_tree.walk", source, e))?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|_| {
                MoveError::io(
                    "copy_tree.strip_prefix",
                    entry.path(),
                    io::Error::other("entry is outside the copied tree"),
                )
            })?;
        let target_path = destination.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target_path)
                .map_err(|e| MoveError::io("copy_tree.create_dir", &target_path, e))?;
        } else {
            ensure_parent(&target_path)?;
            fs::copy(entry.path(), &target_path)
                .map_err(|e| MoveError::io("copy_tree.copy_entry", &target_path, e))?;
        }
    }

    Ok(())
}

/// Unpacks the zip archive at `archive` into `target`.
pub fn extract_zip(archive: &Path, target: &Path) -> FsOpsResult<()> {
    let file = File::open(archive).map_err(|e| MoveError::io("extract_zip.open", archive, e))?;
    let mut zip = ZipArchive::new(file).map_err(|e| MoveError::zip("extract_zip.decode", archive, e))?;

    fs::create_dir_all(target).map_err(|e| MoveError::io("extract_zip.create_target", target, e))?;

    for index in 0..zip.len() {
        let mut entry = zip
            .by_index(index)
            .map_err(|e| MoveError::zip("extract_zip.read_entry", archive, e))?;
        let entry_path =
            sanitize_archive_path(entry.name()).ok_or_else(|| MoveError::UnsafeArchiveEntry {
                archive: archive.to_path_buf(),
                entry: entry.name().to_string(),
            })?;
        let destination = target.join(&entry_path);

        if entry.is_dir() {
            fs::create_dir_all(&destination)
                .map_err(|e| MoveError::io("extract_zip.create_dir", &destination, e))?;
            continue;
        }

        ensure_parent(&destination)?;
        let mut output = File::create(&destination)
            .map_err(|e| MoveError::io("extract_zip.create_file", &destination, e))?;
        io::copy(&mut entry, &mut output)
            .map_err(|e| MoveError::io("extract_zip.copy", &destination, e))?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            fs::set_permissions(&destination, fs::Permissions::from_mode(mode))
                .map_err(|e| MoveError::io("extract_zip.set_permissions", &destination, e))?;
        }
    }

    debug!(archive = %archive.display(), target = %target.display(), "extracted");
    Ok(())
}

/// Turns an archive entry name into a relative path, refusing absolute paths
/// and `..` segments.
fn sanitize_archive_path(entry: &str) -> Option<PathBuf> {
    let path = Path::new(entry);
    if path.is_absolute() {
        return None;
    }

    let mut sanitized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(segment) => sanitized.push(segment),
            Component::CurDir => {}
            _ => return None,
        }
    }

    if sanitized.as_os_str().is_empty() {
        None
    } else {
        Some(sanitized)
    }
}

/// The directory holding an extracted archive's actual contents.
///
/// Archives made by zipping a folder wrap everything in that folder; when
/// `dir` holds exactly one directory and nothing else, that directory is
/// returned instead of `dir`.
pub fn content_root(dir: &Path) -> FsOpsResult<PathBuf> {
    let mut entries = fs::read_dir(dir)
        .map_err(|e| MoveError::io("content_root.read_dir", dir, e))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| MoveError::io("content_root.read_entry", dir, e))?;

    if entries.len() == 1 {
        let only = entries.remove(0);
        let is_dir = only
            .file_type()
            .map_err(|e| MoveError::io("content_root.file_type", &only.path(), e))?
            .is_dir();
        if is_dir {
            return Ok(only.path());
        }
    }
    Ok(dir.to_path_buf())
}

/// Size in bytes of a file, or the sum of all files below a directory.
pub fn tree_size(path: &Path) -> io::Result<u64> {
    let metadata = fs::metadata(path)?;
    if metadata.is_file() {
        return Ok(metadata.len());
    }

    let mut total = 0;
    for entry in WalkDir::new(path) {
        let entry = entry.map_err(io::Error::from)?;
        if entry.file_type().is_file() {
            total += entry.metadata().map_err(io::Error::from)?.len();
        }
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::FileOptions;

    fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let file = File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        for (name, content) in entries {
            writer.start_file(*name, FileOptions::default()).unwrap();
            writer.write_all(content).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn test_relocate_file() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("a.txt");
        let destination = temp_dir.path().join("b.txt");
        fs::write(&source, "content").unwrap();

        relocate(&source, &destination).unwrap();

        assert!(!source.exists());
        assert_eq!(fs::read_to_string(&destination).unwrap(), "content");
    }

    #[test]
    fn test_relocate_missing_source_is_unclassified() {
        let temp_dir = TempDir::new().unwrap();
        let err = relocate(&temp_dir.path().join("nope"), &temp_dir.path().join("dest"))
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::Unclassified);
    }

    #[test]
    fn test_copy_tree_nested() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("src");
        fs::create_dir_all(source.join("a/b")).unwrap();
        fs::write(source.join("top.txt"), "top").unwrap();
        fs::write(source.join("a/b/deep.txt"), "deep").unwrap();

        let destination = temp_dir.path().join("dst");
        copy_tree(&source, &destination).unwrap();

        assert_eq!(fs::read_to_string(destination.join("top.txt")).unwrap(), "top");
        assert_eq!(
            fs::read_to_string(destination.join("a/b/deep.txt")).unwrap(),
            "deep"
        );
        assert!(source.exists());
    }

    #[test]
    fn test_remove_path_handles_all_types() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("f");
        let dir = temp_dir.path().join("d");
        fs::write(&file, "x").unwrap();
        fs::create_dir_all(dir.join("inner")).unwrap();

        remove_path(&file).unwrap();
        remove_path(&dir).unwrap();
        remove_path(&temp_dir.path().join("missing")).unwrap();

        assert!(!file.exists());
        assert!(!dir.exists());
    }

    #[test]
    fn test_extract_zip() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("pack.zip");
        write_zip(&archive, &[("one.txt", b"1"), ("nested/two.txt", b"2")]);

        let target = temp_dir.path().join("pack");
        extract_zip(&archive, &target).unwrap();

        assert_eq!(fs::read(target.join("one.txt")).unwrap(), b"1");
        assert_eq!(fs::read(target.join("nested/two.txt")).unwrap(), b"2");
    }

    #[test]
    fn test_extract_zip_rejects_escaping_entries() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("evil.zip");
        write_zip(&archive, &[("../escape.txt", b"x")]);

        let err = extract_zip(&archive, &temp_dir.path().join("evil")).unwrap_err();
        assert!(matches!(err, MoveError::UnsafeArchiveEntry { .. }));
        assert!(!temp_dir.path().join("escape.txt").exists());
    }

    #[test]
    fn test_extract_zip_not_an_archive() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("fake.zip");
        fs::write(&archive, "not a zip").unwrap();

        let err = extract_zip(&archive, &temp_dir.path().join("fake")).unwrap_err();
        assert!(matches!(err, MoveError::Zip { .. }));
        assert_eq!(err.kind(), FailureKind::Unclassified);
    }

    #[test]
    fn test_content_root_descends_into_single_wrapper() {
        let temp_dir = TempDir::new().unwrap();
        let wrapped = temp_dir.path().join("wrapped");
        fs::create_dir_all(wrapped.join("inner")).unwrap();
        assert_eq!(content_root(&wrapped).unwrap(), wrapped.join("inner"));

        fs::write(wrapped.join("loose.txt"), "x").unwrap();
        assert_eq!(content_root(&wrapped).unwrap(), wrapped);
    }

    #[test]
    fn test_tree_size() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("d/e")).unwrap();
        fs::write(temp_dir.path().join("d/a"), "12345").unwrap();
        fs::write(temp_dir.path().join("d/e/b"), "123").unwrap();

        assert_eq!(tree_size(&temp_dir.path().join("d")).unwrap(), 8);
        assert_eq!(tree_size(&temp_dir.path().join("d/a")).unwrap(), 5);
    }

    #[test]
    fn test_failure_kind_classification() {
        let exists = MoveError::DestinationExists(PathBuf::from("x"));
        assert_eq!(exists.kind(), FailureKind::Conflict);

        let busy = MoveError::io(
            "test",
            Path::new("x"),
            io::Error::from(io::ErrorKind::PermissionDenied),
        );
        assert_eq!(busy.kind(), FailureKind::Busy);

        let other = MoveError::io(
            "test",
            Path::new("x"),
            io::Error::from(io::ErrorKind::NotFound),
        );
        assert_eq!(other.kind(), FailureKind::Unclassified);
    }
}
