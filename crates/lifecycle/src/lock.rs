//! Best-effort detection of files that are still in use.
//!
//! The application writing the logs keeps its current file open. The answer
//! can be out of date by the time the caller acts on it, and an operation
//! that then fails is logged and skipped rather than retried.
//!
//! On Windows the file is opened with no sharing allowed, which fails with a
//! sharing violation while any other handle is open, however it was opened.
//! Elsewhere the probe takes a non-blocking exclusive `flock` and releases it
//! straight away; that lock is advisory, so only writers that lock their
//! files are detected.

use std::fs::File;
use std::io::{Error as IoError, ErrorKind as IoErrorKind};
use std::path::Path;

/// Returns `true` if another handle holds `path`.
///
/// A missing file is reported as *not* locked; existence is the caller's
/// concern. Any other failure to open the file is treated as locked, since
/// nothing useful can be done with it either way.
pub fn is_locked(path: impl AsRef<Path>) -> bool {
    let path = path.as_ref();
    match probe(path) {
        // The probe handle (and any lock on it) is released on drop.
        Ok(_file) => false,
        Err(e) if e.kind() == IoErrorKind::NotFound => false,
        Err(e) => {
            tracing::trace!(path = %path.display(), error = %e, "File is in use");
            true
        },
    }
}

#[cfg(windows)]
fn probe(path: &Path) -> Result<File, IoError> {
    use std::os::windows::fs::OpenOptionsExt;

    // A share mode of 0 denies every other reader and writer.
    std::fs::OpenOptions::new().read(true).share_mode(0).open(path)
}

#[cfg(not(windows))]
fn probe(path: &Path) -> Result<File, IoError> {
    let file = File::open(path)?;
    fs2::FileExt::try_lock_exclusive(&file)?;
    Ok(file)
}
