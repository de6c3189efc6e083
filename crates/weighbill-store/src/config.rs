//! Store configuration.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::lock::DEFAULT_LOCK_FILE;

/// Default root directory holding one subdirectory per ledger.
pub const DEFAULT_DATA_DIR: &str = "./database";

/// Where weighbill keeps its ledgers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Root directory of the catalog (default: "./database").
    pub data_dir: PathBuf,

    /// Lock file name inside each ledger directory (default: ".weighbill.lock").
    pub lock_file: String,
}

/// Optional JSON config file structure.
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    /// Root directory of the catalog.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    /// Lock file name.
    #[serde(default)]
    pub lock_file: Option<String>,
}

impl StoreConfig {
    /// Load configuration from an optional `weighbill.json` and the environment.
    ///
    /// The file named by `WEIGHBILL_CONFIG` is tried first, then
    /// `weighbill.json` and `config/weighbill.json`. `WEIGHBILL_DATA_DIR` and
    /// `WEIGHBILL_LOCK_FILE` override whatever the file says.
    #[must_use]
    pub fn from_env() -> Self {
        let file = load_config_file();
        Self::from_sources(file, |key| std::env::var(key).ok())
    }

    /// Merge defaults, a parsed file and an environment lookup.
    #[must_use]
    pub fn from_sources<F>(file: Option<FileConfig>, env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(file) = file {
            if let Some(dir) = file.data_dir {
                config.data_dir = dir;
            }
            if let Some(lock) = file.lock_file {
                config.lock_file = lock;
            }
        }
        if let Some(dir) = env("WEIGHBILL_DATA_DIR").filter(|v| !v.trim().is_empty()) {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(lock) = env("WEIGHBILL_LOCK_FILE").filter(|v| !v.trim().is_empty()) {
            config.lock_file = lock;
        }
        config
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            lock_file: DEFAULT_LOCK_FILE.into(),
        }
    }
}

fn load_config_file() -> Option<FileConfig> {
    let explicit = std::env::var("WEIGHBILL_CONFIG").ok();
    let candidates = explicit
        .iter()
        .map(String::as_str)
        .chain(["weighbill.json", "config/weighbill.json"]);

    for path in candidates {
        match read_config_file(Path::new(path)) {
            Ok(config) => {
                tracing::info!(path = %path, "Loaded config file");
                return Some(config);
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %path, error = %e, "Ignoring unreadable config file"),
        }
    }

    tracing::debug!("No config file found, using environment variables");
    None
}

/// Parse a JSON config file.
///
/// # Errors
///
/// `NotFound` if the file does not exist, `InvalidData` if it is not valid JSON.
pub fn read_config_file(path: &Path) -> Result<FileConfig, std::io::Error> {
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}
