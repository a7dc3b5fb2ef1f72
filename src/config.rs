//! Configuration service
//!
//! A read-only key/value lookup loaded once at start-up from a `KEY=value`
//! file. Values from the process environment override file values for the
//! keys both daemons understand, so a deployment can tweak a single knob
//! without editing the file.

use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Default configuration file for the ingestor daemon
pub const INGESTOR_CONFIG_FILE: &str = "conf/fp.conf";

/// Default configuration file for the detector daemon
pub const DETECTOR_CONFIG_FILE: &str = "conf/mo.conf";

/// Every key either daemon reads. Only these are taken from the environment.
pub const KNOWN_KEYS: &[&str] = &[
    "PATH_FILES",
    "PATH_SUCURSALES",
    "NOMBRE_DIRECTORIO_SUCURSAL",
    "PREFIJO_FICHEROS",
    "PREFIJO_CARPETAS_PROCESO",
    "INVENTORY_FILE",
    "NUM_PROCESOS",
    "SEMAPHORE_NAME",
    "PIPE_NAME",
    "MONITOR_ACTIVO",
    "USE_SHARED_MEMORY",
    "SHARED_MEMORY_NAME",
    "SHARED_MEMORY_INITIAL_SIZE",
    "SIMULATE_SLEEP_MIN",
    "SIMULATE_SLEEP_MAX",
    "RESULTS_FILE",
    "LOG_LEVEL",
    "LOG_FILE",
    "LOG_FILE_APP",
    "POLL_INTERVAL_MS",
    "PASS_SUMMARY_FILE",
];

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(String),
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err)
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Key/value lookup with caller-supplied defaults
#[derive(Debug, Clone, Default)]
pub struct ConfigStore {
    values: HashMap<String, String>,
    source: Option<PathBuf>,
}

impl ConfigStore {
    /// Load a configuration file, then apply environment overrides.
    ///
    /// A missing file is not an error: every lookup falls back to its default.
    /// Lines that cannot be parsed are logged and skipped.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut values = HashMap::new();

        if path.exists() {
            let entries = dotenv::from_path_iter(path).map_err(|e| match e {
                dotenv::Error::Io(io) => ConfigError::Io(io),
                other => ConfigError::Parse(other.to_string()),
            })?;

            for entry in entries {
                match entry {
                    Ok((key, value)) => {
                        values.insert(key, value);
                    }
                    Err(e) => {
                        log::warn!("Skipping configuration line in {}: {}", path.display(), e);
                    }
                }
            }
        } else {
            log::warn!(
                "Configuration file {} not found, using defaults",
                path.display()
            );
        }

        for key in KNOWN_KEYS {
            if let Ok(value) = env::var(key) {
                values.insert((*key).to_string(), value);
            }
        }

        Ok(Self {
            values,
            source: Some(path.to_path_buf()),
        })
    }

    /// Build a store from explicit pairs (no file, no environment)
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            source: None,
        }
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn get(&self, key: &str, default: &str) -> String {
        self.values
            .get(key)
            .map(|v| v.trim().to_string())
            .unwrap_or_else(|| default.to_string())
    }

    /// Parse a value, falling back to `default` when absent or invalid
    pub fn get_parsed<T: FromStr>(&self, key: &str, default: T) -> T {
        match self.values.get(key) {
            Some(raw) => match raw.trim().parse() {
                Ok(value) => value,
                Err(_) => {
                    log::warn!("Invalid value '{}' for {}, using default", raw, key);
                    default
                }
            },
            None => default,
        }
    }

    /// `NO`, `FALSE`, `0` and `OFF` (any case) are false; anything else is true.
    pub fn get_flag(&self, key: &str, default: bool) -> bool {
        match self.values.get(key) {
            Some(raw) => !matches!(
                raw.trim().to_ascii_uppercase().as_str(),
                "NO" | "FALSE" | "0" | "OFF" | ""
            ),
            None => default,
        }
    }
}

/// Filesystem layout shared by both daemons
#[derive(Debug, Clone)]
pub struct DataLayout {
    pub data_root: PathBuf,
    pub branches_dir: String,
    pub branch_dir_prefix: String,
    pub file_prefix: String,
    pub processing_prefix: String,
    pub ledger_file: String,
    pub results_prefix: String,
}

impl DataLayout {
    pub fn from_store(store: &ConfigStore) -> Self {
        Self {
            data_root: PathBuf::from(store.get("PATH_FILES", "../Datos")),
            branches_dir: store.get("PATH_SUCURSALES", "files_data"),
            branch_dir_prefix: store.get("NOMBRE_DIRECTORIO_SUCURSAL", "Sucursal"),
            file_prefix: store.get("PREFIJO_FICHEROS", "SU"),
            processing_prefix: store.get("PREFIJO_CARPETAS_PROCESO", "procesados"),
            ledger_file: store.get("INVENTORY_FILE", "consolidado.csv"),
            results_prefix: store.get("RESULTS_FILE", "resultado_patron_"),
        }
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.data_root.join(&self.ledger_file)
    }

    /// `<data-root>/<results-prefix><NN>.csv`
    pub fn result_path(&self, pattern_id: u8) -> PathBuf {
        self.data_root
            .join(format!("{}{:02}.csv", self.results_prefix, pattern_id))
    }
}

/// Shared memory arena settings
#[derive(Debug, Clone)]
pub struct ArenaConfig {
    pub name: String,
    pub capacity: usize,
}

/// Ledger backing selected by `USE_SHARED_MEMORY`
#[derive(Debug, Clone)]
pub enum BackendType {
    File,
    Arena(ArenaConfig),
}

impl BackendType {
    pub fn from_store(store: &ConfigStore) -> Self {
        if store.get_parsed::<u32>("USE_SHARED_MEMORY", 0) == 1 {
            BackendType::Arena(ArenaConfig {
                name: store.get("SHARED_MEMORY_NAME", "/my_shared_memory"),
                capacity: store.get_parsed("SHARED_MEMORY_INITIAL_SIZE", 1024),
            })
        } else {
            BackendType::File
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendType::File => "file",
            BackendType::Arena(_) => "shared-memory",
        }
    }
}

/// Ingestor daemon configuration
#[derive(Debug, Clone)]
pub struct IngestorConfig {
    pub layout: DataLayout,
    pub backend: BackendType,
    pub branch_count: u32,
    pub semaphore_name: String,
    pub pipe_path: PathBuf,
    pub notifications_enabled: bool,
    pub sleep_min_secs: u64,
    pub sleep_max_secs: u64,
    pub poll_interval_ms: u64,
}

impl IngestorConfig {
    pub fn from_store(store: &ConfigStore) -> Self {
        Self {
            layout: DataLayout::from_store(store),
            backend: BackendType::from_store(store),
            branch_count: store.get_parsed("NUM_PROCESOS", 5),
            semaphore_name: store.get("SEMAPHORE_NAME", "/semaforo"),
            pipe_path: PathBuf::from(store.get("PIPE_NAME", "/tmp/pipeAudita")),
            notifications_enabled: store.get_flag("MONITOR_ACTIVO", false),
            sleep_min_secs: store.get_parsed("SIMULATE_SLEEP_MIN", 1),
            sleep_max_secs: store.get_parsed("SIMULATE_SLEEP_MAX", 2),
            poll_interval_ms: store.get_parsed("POLL_INTERVAL_MS", 1_000),
        }
    }
}

/// Detector daemon configuration
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    pub layout: DataLayout,
    pub backend: BackendType,
    pub semaphore_name: String,
    pub pipe_path: PathBuf,
    pub sleep_min_secs: u64,
    pub sleep_max_secs: u64,
    pub pass_summary_path: Option<PathBuf>,
}

impl DetectorConfig {
    pub fn from_store(store: &ConfigStore) -> Self {
        let summary = store.get("PASS_SUMMARY_FILE", "");
        Self {
            layout: DataLayout::from_store(store),
            backend: BackendType::from_store(store),
            semaphore_name: store.get("SEMAPHORE_NAME", "/semaforo"),
            pipe_path: PathBuf::from(store.get("PIPE_NAME", "/tmp/pipeAudita")),
            sleep_min_secs: store.get_parsed("SIMULATE_SLEEP_MIN", 1),
            sleep_max_secs: store.get_parsed("SIMULATE_SLEEP_MAX", 2),
            pass_summary_path: if summary.is_empty() {
                None
            } else {
                Some(PathBuf::from(summary))
            },
        }
    }
}

/// Parse `--config <path>` from the command line, falling back to `default`
pub fn config_path_from_args(args: &[String], default: &str) -> PathBuf {
    if let Some(idx) = args.iter().position(|x| x == "--config") {
        if let Some(path) = args.get(idx + 1) {
            return PathBuf::from(path);
        }
    }
    PathBuf::from(default)
}
