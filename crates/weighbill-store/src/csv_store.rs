//! CSV directory storage implementation.
//!
//! This module provides the `CsvStore` implementation of the `RecordStore`
//! trait: one directory per ledger, one `<Table>.csv` per table.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, StoreError};
use crate::lock::{WriteLock, DEFAULT_LOCK_FILE};
use crate::schema::Record;
use crate::table::{self, Table};
use crate::RecordStore;

/// Directory-of-CSV-files storage.
#[derive(Debug, Clone)]
pub struct CsvStore {
    dir: PathBuf,
    lock_file: String,
}

impl CsvStore {
    /// Open or create a ledger directory.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if the directory cannot be created.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| StoreError::unavailable(&dir, e))?;
        Ok(Self {
            dir,
            lock_file: DEFAULT_LOCK_FILE.to_string(),
        })
    }

    /// Use a different lock file name inside the directory.
    #[must_use]
    pub fn with_lock_file(mut self, name: impl Into<String>) -> Self {
        self.lock_file = name.into();
        self
    }

    /// The ledger directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File backing table `R`.
    #[must_use]
    pub fn table_path<R: Record>(&self) -> PathBuf {
        self.dir.join(format!("{}.csv", R::TABLE))
    }
}

impl RecordStore for CsvStore {
    fn location(&self) -> &Path {
        &self.dir
    }

    fn load<R: Record>(&self) -> Result<Table<R>> {
        table::ensure_table(&self.table_path::<R>())
    }

    fn check<R: Record>(&self, table: &Table<R>) -> Result<()> {
        table::check(&self.table_path::<R>(), table)
    }

    fn save<R: Record>(&self, table: &mut Table<R>) -> Result<()> {
        table::save(&self.table_path::<R>(), table)
    }

    fn lock(&self) -> Result<WriteLock> {
        WriteLock::acquire(&self.dir.join(&self.lock_file))
    }
}
