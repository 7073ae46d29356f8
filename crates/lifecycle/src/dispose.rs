//! File removal: move to trash, or delete permanently.
//!
//! The engine only needs "make this file go away"; how that happens is a
//! [`Disposal`] implementation. [`TrashDirectory`] is the local one, moving
//! files into a holding directory unless asked to delete them outright.

use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::fs;

/// Shared, thread-safe handle to a disposal primitive.
pub type DisposalHandle = Arc<dyn Disposal>;

/// Removes files from the log directory.
#[async_trait]
pub trait Disposal: Send + Sync {
    /// Remove `path`, either permanently or somewhere it can be recovered from.
    ///
    /// Returns [`NotFound`](ErrorKind::NotFound) if the file does not exist.
    async fn dispose(&self, path: &Path, permanent: bool) -> Result<()>;
}

/// Moves trashed files into a directory, prefixed with the time of removal.
///
/// `app.log` trashed at Unix time `1700000000` becomes
/// `<root>/1700000000-app.log`. Repeated names within the same second get a
/// numeric suffix.
#[derive(Clone, Debug)]
pub struct TrashDirectory {
    root: PathBuf,
}
impl TrashDirectory {
    /// Create a trash backed by `root`. The directory is created on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if `root` exists but isn't a directory.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if root.exists() && !root.is_dir() {
            exn::bail!(ErrorKind::AlreadyExists(root));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn map_io_error(e: std::io::Error, path: &Path) -> ErrorKind {
        match e.kind() {
            IoErrorKind::NotFound => ErrorKind::NotFound(path.to_path_buf()),
            _ => ErrorKind::Io(e),
        }
    }

    /// Reserve a free name in the trash by creating an empty placeholder,
    /// which the caller then renames over. Concurrent disposals of files
    /// sharing a name each get their own slot.
    async fn reserve(&self, path: &Path) -> Result<PathBuf> {
        let Some(name) = path.file_name() else {
            exn::bail!(ErrorKind::NotFound(path.to_path_buf()));
        };
        let stamp = OffsetDateTime::now_utc().unix_timestamp();
        let base = format!("{stamp}-{}", name.to_string_lossy());
        let mut candidate = self.root.join(&base);
        let mut counter = 1;
        loop {
            match fs::OpenOptions::new().write(true).create_new(true).open(&candidate).await {
                Ok(_) => return Ok(candidate),
                Err(e) if e.kind() == IoErrorKind::AlreadyExists => {
                    candidate = self.root.join(format!("{base}.{counter}"));
                    counter += 1;
                },
                Err(e) => exn::bail!(ErrorKind::Io(e)),
            }
        }
    }

    async fn move_to_trash(&self, path: &Path) -> Result<PathBuf> {
        fs::create_dir_all(&self.root).await.map_err(ErrorKind::Io)?;
        let destination = self.reserve(path).await?;
        let moved = match fs::rename(path, &destination).await {
            Ok(()) => Ok(()),
            // The trash lives on another filesystem; fall back to copy + delete.
            Err(e) if e.kind() == IoErrorKind::CrossesDevices => {
                match fs::copy(path, &destination).await {
                    Ok(_) => fs::remove_file(path).await,
                    Err(e) => Err(e),
                }
            },
            Err(e) => Err(e),
        };
        if let Err(e) = moved {
            if let Err(cleanup) = fs::remove_file(&destination).await {
                tracing::debug!(path = %destination.display(), error = %cleanup, "Could not remove trash placeholder");
            }
            exn::bail!(Self::map_io_error(e, path));
        }
        Ok(destination)
    }
}

#[async_trait]
impl Disposal for TrashDirectory {
    async fn dispose(&self, path: &Path, permanent: bool) -> Result<()> {
        if permanent {
            fs::remove_file(path).await.map_err(|e| Self::map_io_error(e, path))?;
            tracing::info!(path = %path.display(), "Deleted file permanently");
        } else {
            let destination = self.move_to_trash(path).await?;
            tracing::info!(path = %path.display(), trash = %destination.display(), "Moved file to trash");
        }
        Ok(())
    }
}
