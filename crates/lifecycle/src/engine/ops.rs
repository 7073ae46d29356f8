//! Single-file operations.

use super::{Batch, LifecycleEngine};
use crate::error::{Error, ErrorKind, Result};
use crate::listing::{FileKind, archived_path, restored_path};
use crate::lock;
use derive_more::Display;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
pub(crate) enum Direction {
    #[display("compress")]
    Compress,
    #[display("decompress")]
    Decompress,
}
impl Direction {
    /// Kind of file this direction accepts as input.
    fn source_kind(self) -> FileKind {
        match self {
            Self::Compress => FileKind::Raw,
            Self::Decompress => FileKind::Archived,
        }
    }
}

#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
pub(crate) enum Action {
    #[display("{_0}")]
    Transform(Direction),
    #[display("delete")]
    Delete { permanent: bool },
}

/// An action whose preconditions have been checked.
enum Plan {
    Transform { direction: Direction, destination: PathBuf },
    Delete { permanent: bool },
}

impl LifecycleEngine {
    /// Compress a raw log into `<path>.zst` in the background.
    ///
    /// # Errors
    ///
    /// Checked before anything is scheduled, in this order:
    /// [`NotFound`](ErrorKind::NotFound), [`AlreadyExists`](ErrorKind::AlreadyExists)
    /// (the archive is already there), [`Locked`](ErrorKind::Locked), and
    /// [`WrongExtension`](ErrorKind::WrongExtension) (not a `.log` file).
    /// Failures after that point are logged by the background task.
    pub fn compress_one(&self, path: impl AsRef<Path>) -> Result<Batch> {
        let batch = Batch::new();
        self.dispatch(Action::Transform(Direction::Compress), path.as_ref(), &batch)?;
        Ok(batch)
    }

    /// Restore an archive to its original name in the background.
    ///
    /// # Errors
    ///
    /// Same as [`compress_one`](Self::compress_one), with the restored
    /// (suffix-stripped) name as the destination and `.zst` as the required
    /// extension. A name without the `.zst` suffix has no destination to
    /// check, so it reports [`WrongExtension`](ErrorKind::WrongExtension)
    /// ahead of [`AlreadyExists`](ErrorKind::AlreadyExists).
    pub fn decompress_one(&self, path: impl AsRef<Path>) -> Result<Batch> {
        let batch = Batch::new();
        self.dispatch(Action::Transform(Direction::Decompress), path.as_ref(), &batch)?;
        Ok(batch)
    }

    /// Move a file to the trash, or remove it outright, in the background.
    ///
    /// # Errors
    ///
    /// Returns [`NotFound`](ErrorKind::NotFound) if the file does not exist.
    pub fn delete_one(&self, path: impl AsRef<Path>, permanent: bool) -> Result<Batch> {
        let batch = Batch::new();
        self.dispatch(Action::Delete { permanent }, path.as_ref(), &batch)?;
        Ok(batch)
    }

    /// Check preconditions for `action` and, if they hold, schedule it as part
    /// of `batch`. Rejections are logged here so batch callers can ignore them.
    pub(crate) fn dispatch(&self, action: Action, path: &Path, batch: &Batch) -> Result<()> {
        let plan = match action {
            Action::Transform(direction) => {
                check_transform(direction, path).map(|destination| Plan::Transform { direction, destination })
            },
            Action::Delete { permanent } => check_exists(path).map(|()| Plan::Delete { permanent }),
        };
        let plan = plan.inspect_err(|e| log_rejected(action, e))?;

        let engine = self.clone();
        let source = path.to_path_buf();
        self.spawn_worker(batch, async move {
            let result = match plan {
                Plan::Transform { direction, destination } => engine.transform(direction, &source, &destination).await,
                Plan::Delete { permanent } => engine.inner.disposal.dispose(&source, permanent).await,
            };
            match result {
                Ok(()) => {
                    engine.mark_changed();
                    tracing::debug!(%action, path = %source.display(), "Background operation complete");
                },
                Err(e) => tracing::error!(%action, path = %source.display(), "Background operation failed: {e:?}"),
            }
        });
        Ok(())
    }

    /// Read, encode/decode, rewrite in place, then rename.
    async fn transform(&self, direction: Direction, source: &Path, destination: &Path) -> Result<()> {
        let input = fs::read(source).await.map_err(ErrorKind::Io)?;
        let codec = self.inner.codec.clone();
        let output = tokio::task::spawn_blocking(move || match direction {
            Direction::Compress => codec.compress(&input),
            Direction::Decompress => codec.decompress(&input),
        })
        .await
        .map_err(|e| ErrorKind::Io(io::Error::other(e)))?
        .map_err(ErrorKind::codec)?;

        overwrite(source, &output).await?;
        fs::rename(source, destination).await.map_err(ErrorKind::Io)?;
        tracing::info!(
            %direction,
            from = %source.display(),
            to = %destination.display(),
            bytes = output.len(),
            "Rewrote file"
        );
        Ok(())
    }
}

fn check_exists(path: &Path) -> Result<()> {
    if !path.is_file() {
        exn::bail!(ErrorKind::NotFound(path.to_path_buf()));
    }
    Ok(())
}

fn check_transform(direction: Direction, path: &Path) -> Result<PathBuf> {
    check_exists(path)?;
    let destination = match direction {
        Direction::Compress => archived_path(path),
        Direction::Decompress => match restored_path(path) {
            Some(destination) => destination,
            None => exn::bail!(ErrorKind::WrongExtension(path.to_path_buf())),
        },
    };
    if destination.exists() {
        exn::bail!(ErrorKind::AlreadyExists(destination));
    }
    if lock::is_locked(path) {
        exn::bail!(ErrorKind::Locked(path.to_path_buf()));
    }
    if FileKind::of(path) != direction.source_kind() {
        exn::bail!(ErrorKind::WrongExtension(path.to_path_buf()));
    }
    Ok(destination)
}

/// Truncate `path` and write `data` into it.
async fn overwrite(path: &Path, data: &[u8]) -> Result<()> {
    let mut file = fs::OpenOptions::new().write(true).truncate(true).open(path).await.map_err(ErrorKind::Io)?;
    file.write_all(data).await.map_err(ErrorKind::Io)?;
    file.sync_all().await.map_err(ErrorKind::Io)?;
    Ok(())
}

fn log_rejected(action: Action, err: &Error) {
    let kind: &ErrorKind = err;
    match kind {
        ErrorKind::NotFound(_) => tracing::debug!(%action, "Skipping: {kind}"),
        _ => tracing::error!(%action, "Rejected: {kind}"),
    }
}
