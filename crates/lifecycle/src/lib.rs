//! Log file lifecycle management.
//!
//! Rotated logs pile up in a single directory. This crate keeps that directory
//! in check by compressing logs past a certain age, and deleting anything past
//! a second, longer threshold. All file mutation happens on background tasks
//! owned by a [`LifecycleEngine`]; callers poll it for progress instead of
//! awaiting individual operations.
//!
//! ```no_run
//! # async fn run() -> logkeeper_lifecycle::error::Result<()> {
//! use logkeeper_lifecycle::{LifecycleEngine, TrashDirectory};
//! use std::sync::Arc;
//!
//! let trash = TrashDirectory::new("/var/lib/app/trash")?;
//! let engine = LifecycleEngine::builder(Arc::new(trash)).build(tokio::runtime::Handle::current());
//! engine.auto_compress("/var/log/app", 5)?.wait().await;
//! if engine.need_refresh() {
//!     // Re-list the directory.
//! }
//! # Ok(())
//! # }
//! ```

pub mod age;
pub mod dispose;
pub mod engine;
pub mod error;
pub mod listing;
pub mod lock;

pub use crate::dispose::{Disposal, DisposalHandle, TrashDirectory};
pub use crate::engine::{Batch, EngineBuilder, LifecycleEngine};
pub use crate::listing::{FileKind, LogFile, snapshot};
