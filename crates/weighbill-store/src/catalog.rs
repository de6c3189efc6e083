//! Catalog of ledgers under one data directory.
//!
//! Each ledger is a sub-directory holding its own `Bill.csv` and `Item.csv`,
//! typically one per season or per weighbridge.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use weighbill_core::Violations;

use crate::config::StoreConfig;
use crate::csv_store::CsvStore;
use crate::error::{Result, StoreError};
use crate::ledger::Ledger;
use crate::listing::LedgerSummary;
use crate::schema::table;

/// Summaries of every ledger in a catalog.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CatalogSummary {
    /// Per-ledger summaries by name.
    pub ledgers: BTreeMap<String, LedgerSummary>,
    /// All ledgers folded together.
    pub overall: LedgerSummary,
}

/// The set of ledgers under a root directory.
#[derive(Debug, Clone)]
pub struct Catalog {
    root: PathBuf,
    lock_file: String,
}

impl Catalog {
    /// Catalog rooted at `root` with the default lock file name.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::from_config(&StoreConfig {
            data_dir: root.into(),
            ..StoreConfig::default()
        })
    }

    /// Catalog described by a configuration.
    #[must_use]
    pub fn from_config(config: &StoreConfig) -> Self {
        Self {
            root: config.data_dir.clone(),
            lock_file: config.lock_file.clone(),
        }
    }

    /// Root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Names of all ledgers, sorted.
    ///
    /// A missing root directory is an empty catalog.
    ///
    /// # Errors
    ///
    /// `StoreUnavailable` if the root cannot be read.
    pub fn list(&self) -> Result<Vec<String>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::unavailable(&self.root, e)),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::unavailable(&self.root, e))?;
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            if is_hidden(&name) {
                continue;
            }
            let path = entry.path();
            if path.is_dir() && path.join(format!("{}.csv", table::BILL)).is_file() {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    /// Create an empty ledger, or open it if it already exists.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for a bad name, store errors otherwise.
    pub fn create(&self, name: &str) -> Result<Ledger<CsvStore>> {
        validate_name(name)?;
        let existed = self.root.join(name).is_dir();
        let ledger = self.ledger(name)?;
        ledger.ensure_tables()?;
        if !existed {
            tracing::info!(root = %self.root.display(), ledger = %name, "Created ledger");
        }
        Ok(ledger)
    }

    /// Open an existing ledger.
    ///
    /// # Errors
    ///
    /// `NotFound` if no ledger has this name, `InvalidInput` for a bad name.
    pub fn open(&self, name: &str) -> Result<Ledger<CsvStore>> {
        validate_name(name)?;
        let dir = self.root.join(name);
        if !dir.join(format!("{}.csv", table::BILL)).is_file() {
            return Err(StoreError::not_found("ledger", name));
        }
        let ledger = self.ledger(name)?;
        ledger.ensure_tables()?;
        Ok(ledger)
    }

    /// Summaries of every ledger, plus their sum.
    ///
    /// # Errors
    ///
    /// The first store error met while reading a ledger.
    pub fn summary(&self) -> Result<CatalogSummary> {
        let mut summary = CatalogSummary::default();
        for name in self.list()? {
            let ledger_summary = self.open(&name)?.summary()?;
            summary.overall.merge(&ledger_summary);
            summary.ledgers.insert(name, ledger_summary);
        }
        Ok(summary)
    }

    fn ledger(&self, name: &str) -> Result<Ledger<CsvStore>> {
        let store = CsvStore::open(self.root.join(name))?.with_lock_file(self.lock_file.clone());
        Ok(Ledger::new(store))
    }
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.') || name.starts_with("~$")
}

fn validate_name(name: &str) -> Result<()> {
    let mut v = Violations::new();
    if name.trim().is_empty() {
        v.push("name", "must not be blank");
    } else if name.contains(['/', '\\']) {
        v.push("name", "must not contain path separators");
    } else if is_hidden(name) {
        v.push("name", "must not start with '.' or '~$'");
    }
    v.finish(()).map_err(StoreError::from)
}
