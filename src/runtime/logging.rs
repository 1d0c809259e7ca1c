//! Log setup. The terminal belongs to the UI, so everything goes to a file.

use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

use crate::config::{LoggingSettings, default_log_path};

/// Environment variable overriding `logging.filter`.
pub const LOG_ENV: &str = "VESPER_LOG";

/// Install the global subscriber. Returns the log file in use, if any.
///
/// Logging is best effort: an unwritable log location disables it.
pub fn init_logging(settings: &LoggingSettings) -> Option<PathBuf> {
    let path = settings.file.clone().or_else(default_log_path)?;
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).ok()?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .ok()?;

    tracing_subscriber::fmt()
        .with_env_filter(filter(settings))
        .with_ansi(false)
        .with_target(true)
        .with_thread_names(true)
        .with_writer(Mutex::new(file))
        .try_init()
        .ok()?;
    Some(path)
}

fn filter(settings: &LoggingSettings) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(&settings.filter))
}
