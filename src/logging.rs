//! Log sinks
//!
//! Two destinations, mirroring how operators read this system:
//! - the application log (`LOG_FILE_APP`) through `log` + `env_logger`,
//!   filtered by `LOG_LEVEL` unless `RUST_LOG` is set
//! - the audit log (`LOG_FILE`), which always records consolidation events,
//!   notifications and flagged patterns regardless of level, and echoes them
//!   to stdout

use crate::config::ConfigStore;
use chrono::Local;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Map the configured `LOG_LEVEL` name onto a filter.
///
/// `GENERAL` keeps only errors in the application log; audit lines are
/// written separately and never filtered.
pub fn level_filter(name: &str) -> log::LevelFilter {
    match name.trim().to_ascii_uppercase().as_str() {
        "DEBUG" | "LOG_DEBUG" => log::LevelFilter::Debug,
        "INFO" | "LOG_INFO" => log::LevelFilter::Info,
        "WARNING" | "WARN" | "LOG_WARNING" => log::LevelFilter::Warn,
        "ERROR" | "LOG_ERROR" | "GENERAL" | "LOG_GENERAL" => log::LevelFilter::Error,
        _ => log::LevelFilter::Debug,
    }
}

/// Initialize the application logger for a daemon
pub fn init_logging(store: &ConfigStore) {
    let mut builder = if std::env::var("RUST_LOG").is_ok() {
        env_logger::Builder::from_env(env_logger::Env::default())
    } else {
        let mut builder = env_logger::Builder::new();
        builder.filter_level(level_filter(&store.get("LOG_LEVEL", "INFO")));
        builder
    };

    builder.format(|buf, record| {
        writeln!(
            buf,
            "{} - [{:<7}] - {}: {}",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            record.level(),
            record.target(),
            record.args()
        )
    });

    let app_log = store.get("LOG_FILE_APP", "logfile_app.log");
    match OpenOptions::new().create(true).append(true).open(&app_log) {
        Ok(file) => {
            builder.target(env_logger::Target::Pipe(Box::new(file)));
        }
        Err(e) => {
            eprintln!("Cannot open application log {}: {}, using stderr", app_log, e);
            builder.target(env_logger::Target::Stderr);
        }
    }

    // A second init (tests, embedded use) keeps the first logger
    let _ = builder.try_init();
}

/// Always-on audit trail (`YYYY-MM-DD:::HH:MM:SS:::message`)
#[derive(Debug)]
pub struct AuditLog {
    path: PathBuf,
    echo_stdout: bool,
    lock: Mutex<()>,
}

impl AuditLog {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            echo_stdout: true,
            lock: Mutex::new(()),
        }
    }

    pub fn from_store(store: &ConfigStore) -> Self {
        Self::new(store.get("LOG_FILE", "file_log.log"))
    }

    /// Disable the stdout echo (tests)
    pub fn with_stdout(mut self, echo: bool) -> Self {
        self.echo_stdout = echo;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record one audit event. Failures are reported to the application log.
    pub fn record(&self, message: &str) {
        let message = message.trim_end();
        log::info!(target: "audit", "{}", message);

        let line = format!(
            "{}:::{}\n",
            Local::now().format("%Y-%m-%d:::%H:%M:%S"),
            message
        );

        // Poisoning only means another writer panicked mid-line
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());

        match OpenOptions::new().create(true).append(true).open(&self.path) {
            Ok(mut file) => {
                if let Err(e) = file.write_all(line.as_bytes()) {
                    log::error!("Failed to write audit log {}: {}", self.path.display(), e);
                }
            }
            Err(e) => {
                log::error!("Failed to open audit log {}: {}", self.path.display(), e);
            }
        }

        if self.echo_stdout {
            print!("{}", line);
        }
    }
}
