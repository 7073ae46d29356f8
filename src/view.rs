//! Plain-text rendering of the log directory.

use logkeeper_lifecycle::{FileKind, LogFile, lock};
use std::fmt;
use std::path::Path;

const UNIT: u64 = 1000;
const SUFFIXES: [&str; 5] = ["Bytes", "KB", "MB", "GB", "TB"];

/// Human-readable size in decimal units, with two decimals.
pub fn size_convert(bytes: u64) -> String {
    if bytes == 0 {
        return "0.0 Bytes".to_string();
    }
    let mut magnitude = 0;
    let mut scale = 1u64;
    while magnitude < SUFFIXES.len() - 1 && bytes / scale >= UNIT {
        scale *= UNIT;
        magnitude += 1;
    }
    format!("{:.2} {}", bytes as f64 / scale as f64, SUFFIXES[magnitude])
}

/// Table of the raw and archived files in a directory.
pub struct Table<'a> {
    directory: &'a Path,
    rows: Vec<&'a LogFile>,
}

pub fn render<'a>(directory: &'a Path, files: &'a [LogFile]) -> Table<'a> {
    Table { directory, rows: files.iter().filter(|file| file.kind != FileKind::Other).collect() }
}

impl fmt::Display for Table<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self.rows.iter().map(|file| file.name.len()).max().unwrap_or(0).max("Name".len());
        writeln!(f, "{}", self.directory.display())?;
        writeln!(f, "{:<width$}  {:>12}  {:>6}", "Name", "Size", "Age")?;
        for file in &self.rows {
            let marker = if lock::is_locked(&file.path) { "locked" } else { "" };
            writeln!(
                f,
                "{:<width$}  {:>12}  {:>5}d  {marker}",
                file.name,
                size_convert(file.size),
                file.age_days()
            )?;
        }
        Ok(())
    }
}
