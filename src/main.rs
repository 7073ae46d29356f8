mod cli;
mod error;
mod view;

use crate::cli::{Cli, Command};
use crate::error::{ErrorKind, Result};
use clap::Parser;
use exn::ResultExt;
use logkeeper_config::Settings;
use logkeeper_lifecycle::{LifecycleEngine, TrashDirectory, age, snapshot};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing_subscriber::EnvFilter;

const TICK: Duration = Duration::from_millis(250);

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    // Must happen while the process is still single-threaded.
    let offset = age::local_offset();
    tracing::debug!(%offset, "Counting file ages in local time");

    let result = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .or_raise(|| ErrorKind::Runtime)
        .and_then(|runtime| runtime.block_on(run(cli)));
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:?}");
            ExitCode::FAILURE
        },
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = match cli.config {
        Some(path) => path,
        None => Settings::default_path().or_raise(|| ErrorKind::Config)?,
    };
    let mut settings = Settings::load(&config_path).or_raise(|| ErrorKind::Config)?;
    if let Some(dir) = cli.dir {
        settings.log_directory = dir;
        settings.save(&config_path).or_raise(|| ErrorKind::Config)?;
        tracing::info!(path = %config_path.display(), "Saved log directory");
    }

    let directory = settings.log_directory_or_default().or_raise(|| ErrorKind::Config)?;
    let trash = settings.trash_directory_or_default().or_raise(|| ErrorKind::Config)?;
    let trash = TrashDirectory::new(trash).or_raise(|| ErrorKind::Lifecycle)?;
    let engine = LifecycleEngine::builder(Arc::new(trash))
        .max_workers(settings.max_workers())
        .build(Handle::current());

    let batches = match cli.command.unwrap_or_default() {
        Command::Status => {
            let mut batches = Vec::new();
            if settings.auto_compress {
                batches.push(
                    engine
                        .auto_compress(&directory, settings.compress_threshold_days)
                        .or_raise(|| ErrorKind::Lifecycle)?,
                );
            }
            if settings.auto_clean {
                batches.push(
                    engine
                        .auto_clean(&directory, settings.clean_threshold_days, settings.delete_permanently)
                        .or_raise(|| ErrorKind::Lifecycle)?,
                );
            }
            batches
        },
        Command::Compress { files } if files.is_empty() => {
            let listing = snapshot(&directory).or_raise(|| ErrorKind::Lifecycle)?;
            vec![engine.compress_listing(&listing)]
        },
        Command::Compress { files } => vec![engine.compress_many(resolve(&directory, files))],
        Command::Decompress { files } if files.is_empty() => {
            let listing = snapshot(&directory).or_raise(|| ErrorKind::Lifecycle)?;
            vec![engine.decompress_listing(&listing)]
        },
        Command::Decompress { files } => vec![engine.decompress_many(resolve(&directory, files))],
        Command::Clean { days, permanent } => {
            let days = days.unwrap_or(settings.clean_threshold_days);
            let permanent = permanent || settings.delete_permanently;
            vec![engine.auto_clean(&directory, days, permanent).or_raise(|| ErrorKind::Lifecycle)?]
        },
        Command::Archive { days } => {
            let days = days.unwrap_or(settings.compress_threshold_days);
            vec![engine.auto_compress(&directory, days).or_raise(|| ErrorKind::Lifecycle)?]
        },
    };

    tracing::debug!(batches = batches.len(), "Started background work");
    watch(&engine, &directory).await
}

/// Redraw the directory table whenever the engine reports a change, until
/// all background work has finished.
async fn watch(engine: &LifecycleEngine, directory: &Path) -> Result<()> {
    draw(directory)?;
    let mut ticker = tokio::time::interval(TICK);
    loop {
        ticker.tick().await;
        let idle = !engine.is_working();
        if engine.need_refresh() {
            draw(directory)?;
        }
        if idle {
            break;
        }
    }
    Ok(())
}

fn draw(directory: &Path) -> Result<()> {
    let files = snapshot(directory).or_raise(|| ErrorKind::Lifecycle)?;
    println!("{}", view::render(directory, &files));
    Ok(())
}

fn resolve(directory: &Path, files: Vec<PathBuf>) -> Vec<PathBuf> {
    files.into_iter().map(|file| if file.is_absolute() { file } else { directory.join(file) }).collect()
}
