//! Multi-file operations and the retention policies built on them.
//!
//! Every call here returns immediately. A coordinating task on the blocking
//! pool walks the candidates, filters them, and dispatches one worker per
//! file. Files that fail their preconditions are logged and skipped.

use super::ops::{Action, Direction};
use super::{Batch, LifecycleEngine};
use crate::error::Result;
use crate::listing::{self, FileKind, LogFile};
use crate::{age, lock};
use std::path::{Path, PathBuf};

/// Filter applied by the coordinator before dispatching a file.
#[derive(Clone, Copy, Debug, Default)]
struct Selection {
    /// Only files of this kind.
    kind: Option<FileKind>,
    /// Only files strictly older than this many days.
    older_than: Option<i64>,
    /// Skip files another process holds open.
    unlocked: bool,
}
impl Selection {
    fn accepts(&self, path: &Path) -> bool {
        if let Some(kind) = self.kind
            && FileKind::of(path) != kind
        {
            return false;
        }
        if let Some(threshold) = self.older_than
            && age::age_days(path) <= threshold
        {
            return false;
        }
        if self.unlocked && lock::is_locked(path) {
            tracing::debug!(path = %path.display(), "Skipping file in use");
            return false;
        }
        true
    }
}

impl LifecycleEngine {
    fn coordinate(&self, action: Action, paths: Vec<PathBuf>, selection: Selection) -> Batch {
        let batch = Batch::new();
        let engine = self.clone();
        let handle = batch.clone();
        self.spawn_coordinator(&batch, move || {
            let total = paths.len();
            let mut dispatched = 0usize;
            for path in paths.iter().filter(|path| selection.accepts(path)) {
                // Rejections are already logged by `dispatch`.
                if engine.dispatch(action, path, &handle).is_ok() {
                    dispatched += 1;
                }
            }
            tracing::debug!(%action, total, dispatched, "Batch dispatched");
        });
        batch
    }

    /// Compress every path in the background. Paths that fail a precondition
    /// are skipped.
    pub fn compress_many<I>(&self, paths: I) -> Batch
    where
        I: IntoIterator,
        I::Item: Into<PathBuf>,
    {
        let paths = paths.into_iter().map(Into::into).collect();
        self.coordinate(Action::Transform(Direction::Compress), paths, Selection::default())
    }

    /// Decompress every path in the background. Paths that fail a
    /// precondition are skipped.
    pub fn decompress_many<I>(&self, paths: I) -> Batch
    where
        I: IntoIterator,
        I::Item: Into<PathBuf>,
    {
        let paths = paths.into_iter().map(Into::into).collect();
        self.coordinate(Action::Transform(Direction::Decompress), paths, Selection::default())
    }

    /// Delete every path in the background, to the trash unless `permanent`.
    pub fn delete_many<I>(&self, paths: I, permanent: bool) -> Batch
    where
        I: IntoIterator,
        I::Item: Into<PathBuf>,
    {
        let paths = paths.into_iter().map(Into::into).collect();
        self.coordinate(Action::Delete { permanent }, paths, Selection::default())
    }

    /// Compress every raw, unlocked file in a directory listing.
    pub fn compress_listing(&self, files: &[LogFile]) -> Batch {
        let selection = Selection { kind: Some(FileKind::Raw), unlocked: true, ..Selection::default() };
        self.coordinate(Action::Transform(Direction::Compress), paths_of(files), selection)
    }

    /// Decompress every archived, unlocked file in a directory listing.
    pub fn decompress_listing(&self, files: &[LogFile]) -> Batch {
        let selection = Selection { kind: Some(FileKind::Archived), unlocked: true, ..Selection::default() };
        self.coordinate(Action::Transform(Direction::Decompress), paths_of(files), selection)
    }

    /// Compress raw logs in `directory` older than `threshold_days`.
    ///
    /// Files currently held open by another process are left alone.
    ///
    /// # Errors
    ///
    /// Returns [`Listing`](crate::error::ErrorKind::Listing) if the directory
    /// can't be read. Nothing is scheduled in that case.
    pub fn auto_compress(&self, directory: impl AsRef<Path>, threshold_days: i64) -> Result<Batch> {
        let files = listing::snapshot(&directory)?;
        tracing::info!(
            directory = %directory.as_ref().display(),
            threshold_days,
            candidates = files.len(),
            "Running auto-compress"
        );
        let selection = Selection { kind: Some(FileKind::Raw), older_than: Some(threshold_days), unlocked: true };
        Ok(self.coordinate(Action::Transform(Direction::Compress), paths_of(&files), selection))
    }

    /// Delete every unlocked file in `directory` older than `threshold_days`,
    /// whatever its kind.
    ///
    /// # Errors
    ///
    /// Returns [`Listing`](crate::error::ErrorKind::Listing) if the directory
    /// can't be read. Nothing is scheduled in that case.
    pub fn auto_clean(&self, directory: impl AsRef<Path>, threshold_days: i64, permanent: bool) -> Result<Batch> {
        let files = listing::snapshot(&directory)?;
        tracing::info!(
            directory = %directory.as_ref().display(),
            threshold_days,
            permanent,
            candidates = files.len(),
            "Running auto-clean"
        );
        let selection = Selection { older_than: Some(threshold_days), unlocked: true, ..Selection::default() };
        Ok(self.coordinate(Action::Delete { permanent }, paths_of(&files), selection))
    }
}

fn paths_of(files: &[LogFile]) -> Vec<PathBuf> {
    files.iter().map(|file| file.path.clone()).collect()
}
