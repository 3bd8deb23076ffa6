use crate::config::{Config, DEFAULT_LOG_FILE};
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::{fmt, EnvFilter};

/// Starts file logging when enabled. The terminal is drawn by the board, so
/// there is no stderr fallback: if the file cannot be opened logging stays
/// off and the reason is printed once before the UI takes the screen.
pub fn init(config: &Config) -> Option<WorkerGuard> {
    if !config.log_enabled {
        return None;
    }

    let path = log_path(&config.log_file);
    let file = match open_log_file(&path) {
        Ok(file) => file,
        Err(err) => {
            eprintln!("logging disabled: cannot open {}: {err}", path.display());
            return None;
        }
    };
    let (writer, guard) = tracing_appender::non_blocking(file);

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(filter_for(&config.log_level))
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_thread_names(true)
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S%.3f".to_string()))
        .compact()
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_ok() {
        info!("logging to {}", path.display());
    }
    Some(guard)
}

fn log_path(configured: &str) -> PathBuf {
    match configured.trim() {
        "" => PathBuf::from(DEFAULT_LOG_FILE),
        path => PathBuf::from(path),
    }
}

fn open_log_file(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// `RUST_LOG` wins; otherwise the configured level, then `info`.
fn filter_for(level: &str) -> EnvFilter {
    let level = match level.trim() {
        "" => "info",
        level => level,
    };
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}
