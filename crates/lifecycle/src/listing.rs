//! Directory snapshots.
//!
//! A [`LogFile`] is a point-in-time view of one directory entry. Nothing
//! here is cached: once a file is compressed, decompressed, or deleted the
//! snapshot is stale and the caller should take a new one.

use crate::age;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;

/// Suffix of uncompressed, rotated log files.
pub const RAW_EXTENSION: &str = ".log";
/// Suffix appended to a raw log's name once it has been archived.
pub const ARCHIVE_EXTENSION: &str = ".zst";

/// Classification of a file by its name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FileKind {
    /// Uncompressed log, eligible for compression.
    Raw,
    /// Compressed log, eligible for decompression.
    Archived,
    /// Anything else. Only the clean policy touches these.
    Other,
}
impl FileKind {
    /// Classify a path by the suffix of its file name.
    #[must_use]
    pub fn of(path: impl AsRef<Path>) -> Self {
        let Some(name) = path.as_ref().file_name().and_then(|n| n.to_str()) else {
            return Self::Other;
        };
        if name.ends_with(RAW_EXTENSION) {
            Self::Raw
        } else if name.ends_with(ARCHIVE_EXTENSION) {
            Self::Archived
        } else {
            Self::Other
        }
    }
}

/// Name a raw log takes once archived (`app.log` → `app.log.zst`).
pub fn archived_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(ARCHIVE_EXTENSION);
    PathBuf::from(name)
}

/// Name an archive takes once restored (`app.log.zst` → `app.log`).
///
/// Returns `None` if the path does not end with the archive suffix.
pub fn restored_path(path: &Path) -> Option<PathBuf> {
    let name = path.file_name()?.to_str()?;
    let restored = name.strip_suffix(ARCHIVE_EXTENSION).filter(|s| !s.is_empty())?;
    Some(path.with_file_name(restored))
}

/// Snapshot of a single regular file in the log directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFile {
    /// Absolute (or caller-relative) path of the file.
    pub path: PathBuf,
    /// Base file name.
    pub name: String,
    /// File size in bytes.
    pub size: u64,
    /// Classification derived from the file name.
    pub kind: FileKind,
}
impl LogFile {
    /// Age in days, recomputed on every call.
    pub fn age_days(&self) -> i64 {
        age::age_days(&self.path)
    }

    /// Age in days relative to an explicit "now".
    pub fn age_days_at(&self, now: OffsetDateTime) -> i64 {
        age::age_days_at(&self.path, now)
    }

    /// Whether the file is one the compress/decompress operations accept.
    pub fn is_log(&self) -> bool {
        matches!(self.kind, FileKind::Raw | FileKind::Archived)
    }
}

/// List the regular files directly inside `directory`, sorted by name.
///
/// Subdirectories are not descended into, and entries that vanish or cannot
/// be inspected while listing are skipped.
pub fn snapshot(directory: impl AsRef<Path>) -> Result<Vec<LogFile>> {
    let directory = directory.as_ref();
    let entries = std::fs::read_dir(directory).or_raise(|| ErrorKind::Listing(directory.to_path_buf()))?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::debug!(directory = %directory.display(), error = %e, "Skipping unreadable directory entry");
                continue;
            },
        };
        let path = entry.path();
        // Follows symlinks, so a link to a regular file is listed as that file.
        let metadata = match std::fs::metadata(&path) {
            Ok(metadata) if metadata.is_file() => metadata,
            Ok(_) => continue,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "Skipping entry without metadata");
                continue;
            },
        };
        let name = entry.file_name().to_string_lossy().into_owned();
        files.push(LogFile { kind: FileKind::of(&path), path, name, size: metadata.len() });
    }
    files.sort_by(|a, b| a.name.cmp(&b.name));
    tracing::trace!(directory = %directory.display(), files = files.len(), "Listed directory");
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("app_log_20240101.log", FileKind::Raw)]
    #[case("app_log_20240101.log.zst", FileKind::Archived)]
    #[case("/var/log/app/output.log", FileKind::Raw)]
    #[case("notes.txt", FileKind::Other)]
    #[case("app.log.gz", FileKind::Other)]
    #[case("app.zst.log", FileKind::Raw)]
    #[case("", FileKind::Other)]
    fn test_file_kind(#[case] path: &str, #[case] expected: FileKind) {
        assert_eq!(FileKind::of(path), expected);
    }

    #[test]
    fn test_archived_and_restored_paths() {
        let raw = Path::new("/logs/app_log_20240101.log");
        let archived = archived_path(raw);
        assert_eq!(archived, Path::new("/logs/app_log_20240101.log.zst"));
        assert_eq!(restored_path(&archived).unwrap(), raw);
        assert_eq!(restored_path(raw), None);
        assert_eq!(restored_path(Path::new(".zst")), None);
    }

    #[test]
    fn test_restored_path_only_strips_suffix() {
        // A ".zst" earlier in the name is left alone.
        let path = Path::new("/logs/a.zst.b.log.zst");
        assert_eq!(restored_path(path).unwrap(), Path::new("/logs/a.zst.b.log"));
    }

    #[test]
    fn test_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.log"), b"0123456789").unwrap();
        std::fs::write(dir.path().join("a.log.zst"), b"xyz").unwrap();
        std::fs::write(dir.path().join("c.txt"), b"").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested/d.log"), b"ignored").unwrap();

        let files = snapshot(dir.path()).unwrap();
        let names: Vec<_> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["a.log.zst", "b.log", "c.txt"]);
        assert_eq!(files[0].kind, FileKind::Archived);
        assert_eq!(files[1].kind, FileKind::Raw);
        assert_eq!(files[1].size, 10);
        assert_eq!(files[1].path, dir.path().join("b.log"));
        assert!(!files[2].is_log());
    }

    #[test]
    fn test_snapshot_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = snapshot(dir.path().join("missing")).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Listing(_)));
    }
}
