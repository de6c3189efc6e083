//! In-memory storage implementation.
//!
//! Tables are kept as the same CSV bytes a `CsvStore` would write, so the
//! codec, schema checks and fingerprints behave identically without a disk.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{Result, StoreError};
use crate::lock::WriteLock;
use crate::schema::Record;
use crate::table::{fingerprint, Table};
use crate::RecordStore;

#[derive(Debug, Clone)]
struct StoredTable {
    bytes: Vec<u8>,
    high_water: u64,
}

/// Storage held in process memory.
#[derive(Debug)]
pub struct MemoryStore {
    location: PathBuf,
    tables: Mutex<HashMap<&'static str, StoredTable>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            location: PathBuf::from("memory"),
            tables: Mutex::new(HashMap::new()),
        }
    }

    /// Replace the raw bytes of table `R`, e.g. to seed fixtures.
    ///
    /// # Errors
    ///
    /// `StoreUnavailable` if the internal mutex is poisoned.
    pub fn put_raw<R: Record>(&self, bytes: impl Into<Vec<u8>>) -> Result<()> {
        let mut tables = self.tables()?;
        tables.insert(
            R::TABLE,
            StoredTable {
                bytes: bytes.into(),
                high_water: 0,
            },
        );
        Ok(())
    }

    /// Raw bytes of table `R`, if it was ever loaded or saved.
    ///
    /// # Errors
    ///
    /// `StoreUnavailable` if the internal mutex is poisoned.
    pub fn raw<R: Record>(&self) -> Result<Option<Vec<u8>>> {
        Ok(self.tables()?.get(R::TABLE).map(|t| t.bytes.clone()))
    }

    fn tables(&self) -> Result<std::sync::MutexGuard<'_, HashMap<&'static str, StoredTable>>> {
        self.tables
            .lock()
            .map_err(|_| StoreError::unavailable(&self.location, "memory store mutex poisoned"))
    }

    fn table_location<R: Record>(&self) -> PathBuf {
        self.location.join(R::TABLE)
    }

    fn check_locked<R: Record>(
        &self,
        tables: &HashMap<&'static str, StoredTable>,
        table: &Table<R>,
    ) -> Result<()> {
        let Some(expected) = table.fingerprint() else {
            return Ok(());
        };
        let current = tables.get(R::TABLE).map(|t| fingerprint(&t.bytes));
        if current.as_deref() != Some(expected) {
            return Err(StoreError::ConcurrentWriteConflict {
                path: self.table_location::<R>(),
            });
        }
        Ok(())
    }
}

impl RecordStore for MemoryStore {
    fn location(&self) -> &Path {
        &self.location
    }

    fn load<R: Record>(&self) -> Result<Table<R>> {
        let mut tables = self.tables()?;
        let stored = match tables.get(R::TABLE) {
            Some(stored) => stored.clone(),
            None => {
                let bytes = Table::<R>::new().encode()?;
                let stored = StoredTable {
                    bytes,
                    high_water: 0,
                };
                tables.insert(R::TABLE, stored.clone());
                stored
            }
        };
        drop(tables);

        let mut table = Table::decode(&stored.bytes, &self.table_location::<R>())?;
        table.set_high_water(stored.high_water);
        Ok(table)
    }

    fn check<R: Record>(&self, table: &Table<R>) -> Result<()> {
        let tables = self.tables()?;
        self.check_locked(&tables, table)
    }

    fn save<R: Record>(&self, table: &mut Table<R>) -> Result<()> {
        let mut tables = self.tables()?;
        self.check_locked(&tables, table)?;
        let bytes = table.encode()?;
        let print = fingerprint(&bytes);
        tables.insert(
            R::TABLE,
            StoredTable {
                bytes,
                high_water: table.high_water(),
            },
        );
        table.mark_saved(print);
        Ok(())
    }

    fn lock(&self) -> Result<WriteLock> {
        Ok(WriteLock::none())
    }
}
