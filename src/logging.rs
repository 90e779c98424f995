//! Tracing setup for the `crumbcast` binary.
//!
//! Events go to stderr, since stdout carries command output, and to one file
//! per run. Run files are named by their start time, so sorting names sorts
//! runs; the oldest ones beyond [`LogSettings::keep_files`] are deleted at
//! startup.

use std::{
    fs::{self, OpenOptions},
    path::{Path, PathBuf},
    sync::OnceLock,
};

use time::{
    OffsetDateTime, UtcOffset, format_description::BorrowedFormatItem, macros::format_description,
};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Registry, filter::LevelFilter, fmt, prelude::*};

use crate::app_dirs::{self, AppDirError};
use crate::config::LogSettings;

const RUN_FILE_PREFIX: &str = "crumbcast-";
const RUN_FILE_EXTENSION: &str = "log";

static WRITER_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

type LocalTimer = fmt::time::OffsetTime<&'static [BorrowedFormatItem<'static>]>;

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error(transparent)]
    AppDir(#[from] AppDirError),
    #[error("Log file I/O failed at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid log level {level:?}: {message}")]
    Level { level: String, message: String },
    #[error("Failed to format log file time: {0}")]
    FormatTime(#[from] time::error::Format),
    #[error("Failed to install global tracing subscriber: {0}")]
    SetGlobal(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Install the global subscriber and return this run's log file.
///
/// `RUST_LOG` directives take precedence over `settings.level`. Once a
/// subscriber is installed, later calls return `Ok(None)`.
pub fn init(settings: &LogSettings) -> Result<Option<PathBuf>, LoggingError> {
    if WRITER_GUARD.get().is_some() {
        return Ok(None);
    }
    let filter = build_filter(&settings.level)?;
    let dir = log_dir(settings)?;
    let path = dir.join(run_file_name(now_local_or_utc())?);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(io_at(&path))?;
    let removed = prune_run_files(&dir, settings.keep_files)?;

    let (file_writer, guard) = tracing_appender::non_blocking(file);
    let console = settings.console.then(|| {
        fmt::layer()
            .with_target(false)
            .with_timer(local_timer(CONSOLE_TIME))
            .with_writer(std::io::stderr)
    });
    let file_layer = fmt::layer()
        .with_ansi(false)
        .with_timer(local_timer(FILE_TIME))
        .with_writer(file_writer);
    let subscriber = Registry::default()
        .with(filter)
        .with(console)
        .with(file_layer);
    tracing::subscriber::set_global_default(subscriber)?;
    let _ = WRITER_GUARD.set(guard);

    tracing::debug!(path = %path.display(), removed, "Logging to file");
    Ok(Some(path))
}

const CONSOLE_TIME: &[BorrowedFormatItem<'static>] =
    format_description!("[hour]:[minute]:[second]");
const FILE_TIME: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3]");

fn build_filter(level: &str) -> Result<EnvFilter, LoggingError> {
    let level = level
        .trim()
        .parse::<LevelFilter>()
        .map_err(|err| LoggingError::Level {
            level: level.to_string(),
            message: err.to_string(),
        })?;
    Ok(EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy())
}

fn log_dir(settings: &LogSettings) -> Result<PathBuf, LoggingError> {
    let Some(dir) = &settings.dir else {
        return Ok(app_dirs::logs_dir()?);
    };
    fs::create_dir_all(dir).map_err(io_at(dir))?;
    Ok(dir.clone())
}

fn io_at(path: &Path) -> impl FnOnce(std::io::Error) -> LoggingError + '_ {
    move |source| LoggingError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn is_run_file(path: &Path) -> bool {
    let name_matches = path
        .file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with(RUN_FILE_PREFIX));
    name_matches
        && path.extension().and_then(|ext| ext.to_str()) == Some(RUN_FILE_EXTENSION)
        && path.is_file()
}

/// Delete the oldest run files so that at most `keep` remain.
fn prune_run_files(dir: &Path, keep: usize) -> Result<usize, LoggingError> {
    let mut runs: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(io_at(dir))?
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| is_run_file(path))
        .collect();
    runs.sort();
    let excess = runs.len().saturating_sub(keep.max(1));
    for path in &runs[..excess] {
        fs::remove_file(path).map_err(io_at(path))?;
    }
    Ok(excess)
}

fn run_file_name(started: OffsetDateTime) -> Result<String, LoggingError> {
    const NAME_TIME: &[BorrowedFormatItem<'static>] =
        format_description!("[year][month][day]-[hour][minute][second]");
    let stamp = started.format(NAME_TIME)?;
    Ok(format!("{RUN_FILE_PREFIX}{stamp}.{RUN_FILE_EXTENSION}"))
}

fn local_timer(format: &'static [BorrowedFormatItem<'static>]) -> LocalTimer {
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    fmt::time::OffsetTime::new(offset, format)
}

fn now_local_or_utc() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}
