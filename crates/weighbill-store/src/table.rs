//! Table files.
//!
//! A table is loaded whole, mutated in memory and written back whole. Writes go
//! to a temporary file in the same directory which is then renamed over the
//! target, so a reader sees either the old or the new contents, never a mix.
//!
//! Every loaded table remembers the SHA-256 of the bytes it came from. `save`
//! refuses to overwrite a file whose bytes have changed since, reporting
//! `ConcurrentWriteConflict` instead.
//!
//! Next to `<Table>.csv` lives `<Table>.seq`, the highest key ever handed out.
//! It keeps a deleted top key from being allocated again.

use std::collections::BTreeSet;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;

use crate::error::{Result, StoreError};
use crate::ids;
use crate::schema::Record;

/// SHA-256 of `bytes`, hex encoded.
#[must_use]
pub fn fingerprint(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// All rows of one table plus the bookkeeping needed to write it back.
#[derive(Debug, Clone)]
pub struct Table<R> {
    rows: Vec<R>,
    fingerprint: Option<String>,
    high_water: u64,
    dirty: bool,
}

impl<R: Record> Default for Table<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Record> Table<R> {
    /// An empty table not backed by any file yet.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            rows: Vec::new(),
            fingerprint: None,
            high_water: 0,
            dirty: false,
        }
    }

    /// A table holding `rows`, not backed by any file yet.
    #[must_use]
    pub fn from_rows(rows: Vec<R>) -> Self {
        Self {
            rows,
            fingerprint: None,
            high_water: 0,
            dirty: true,
        }
    }

    /// Rows in storage order.
    #[must_use]
    pub fn rows(&self) -> &[R] {
        &self.rows
    }

    /// Consume the table, returning its rows.
    #[must_use]
    pub fn into_rows(self) -> Vec<R> {
        self.rows
    }

    /// Iterate rows in storage order.
    pub fn iter(&self) -> std::slice::Iter<'_, R> {
        self.rows.iter()
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Row with the given key.
    #[must_use]
    pub fn get(&self, key: u64) -> Option<&R> {
        self.rows.iter().find(|r| r.key() == key)
    }

    /// Mutable row with the given key; marks the table dirty when found.
    pub fn get_mut(&mut self, key: u64) -> Option<&mut R> {
        let row = self.rows.iter_mut().find(|r| r.key() == key)?;
        self.dirty = true;
        Some(row)
    }

    /// Whether a row with the given key exists.
    #[must_use]
    pub fn contains(&self, key: u64) -> bool {
        self.get(key).is_some()
    }

    /// Key the next appended row should take.
    ///
    /// `max(key) + 1`, but never at or below a key handed out earlier.
    /// `None` if that would pass `u64::MAX`.
    #[must_use]
    pub fn allocate_id(&self) -> Option<u64> {
        let after_rows = ids::next_id(&self.rows)?;
        let after_mark = self.high_water.checked_add(1)?;
        Some(after_rows.max(after_mark))
    }

    /// Append a row.
    pub fn push(&mut self, row: R) {
        self.high_water = self.high_water.max(row.key());
        self.rows.push(row);
        self.dirty = true;
    }

    /// Keep only rows matching `keep`; returns how many were removed.
    pub fn retain<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&R) -> bool,
    {
        let before = self.rows.len();
        self.rows.retain(|r| keep(r));
        let removed = before - self.rows.len();
        if removed > 0 {
            self.dirty = true;
        }
        removed
    }

    /// Highest key ever allocated in this table.
    #[must_use]
    pub fn high_water(&self) -> u64 {
        self.high_water.max(self.rows.iter().map(Record::key).max().unwrap_or(0))
    }

    /// Fingerprint of the bytes this table was loaded from or last saved as.
    #[must_use]
    pub fn fingerprint(&self) -> Option<&str> {
        self.fingerprint.as_deref()
    }

    /// Whether rows changed since load or the last save.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Parse CSV bytes read from `source`.
    ///
    /// # Errors
    ///
    /// `CorruptStore` if the header is not exactly `R::COLUMNS`, a row does not
    /// parse, or two rows share a key.
    pub fn decode(bytes: &[u8], source: &Path) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::Headers)
            .from_reader(bytes);
        let headers = reader
            .headers()
            .map_err(|e| StoreError::corrupt(source, e))?
            .clone();
        check_columns::<R>(&headers, source)?;

        let mut rows: Vec<R> = Vec::new();
        let mut keys = BTreeSet::new();
        for (index, record) in reader.deserialize::<R>().enumerate() {
            let line = index + 2;
            let mut row =
                record.map_err(|e| StoreError::corrupt(source, format!("line {line}: {e}")))?;
            if !keys.insert(row.key()) {
                return Err(StoreError::corrupt(
                    source,
                    format!("line {line}: duplicate id {}", row.key()),
                ));
            }
            row.normalize();
            rows.push(row);
        }

        Ok(Self {
            rows,
            fingerprint: Some(fingerprint(bytes)),
            high_water: 0,
            dirty: false,
        })
    }

    /// Serialize the header and every row.
    ///
    /// # Errors
    ///
    /// `Serialization` if a row cannot be written.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        writer
            .write_record(R::COLUMNS)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        for row in &self.rows {
            writer
                .serialize(row)
                .map_err(|e| StoreError::Serialization(e.to_string()))?;
        }
        writer
            .into_inner()
            .map_err(|e| StoreError::Serialization(e.to_string()))
    }

    pub(crate) fn set_high_water(&mut self, high_water: u64) {
        self.high_water = high_water;
    }

    pub(crate) fn mark_saved(&mut self, fingerprint: String) {
        self.high_water = self.high_water();
        self.fingerprint = Some(fingerprint);
        self.dirty = false;
    }
}

fn check_columns<R: Record>(headers: &csv::StringRecord, source: &Path) -> Result<()> {
    let mut seen = BTreeSet::new();
    let mut duplicate = Vec::new();
    for name in headers {
        if !seen.insert(name) {
            duplicate.push(name);
        }
    }
    let missing: Vec<&str> = R::COLUMNS
        .iter()
        .copied()
        .filter(|c| !seen.contains(c))
        .collect();
    let unexpected: Vec<&str> = seen
        .iter()
        .copied()
        .filter(|h| !R::COLUMNS.contains(h))
        .collect();

    if missing.is_empty() && unexpected.is_empty() && duplicate.is_empty() {
        return Ok(());
    }

    let mut problems = Vec::new();
    if !missing.is_empty() {
        problems.push(format!("missing columns {missing:?}"));
    }
    if !unexpected.is_empty() {
        problems.push(format!("unexpected columns {unexpected:?}"));
    }
    if !duplicate.is_empty() {
        problems.push(format!("duplicate columns {duplicate:?}"));
    }
    Err(StoreError::corrupt(
        source,
        format!("{} table: {}", R::TABLE, problems.join("; ")),
    ))
}

/// Path of the key high-water file kept next to a table file.
#[must_use]
pub fn sequence_path(path: &Path) -> PathBuf {
    path.with_extension("seq")
}

/// Read the table at `path`, or `None` if there is no file.
///
/// # Errors
///
/// `StoreUnavailable` if the file cannot be read, `CorruptStore` if it does
/// not parse.
pub fn read_table<R: Record>(path: &Path) -> Result<Option<Table<R>>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StoreError::unavailable(path, e)),
    };
    let mut table = Table::decode(&bytes, path)?;
    table.set_high_water(read_high_water(&sequence_path(path))?);
    tracing::debug!(path = %path.display(), rows = table.len(), "Loaded table");
    Ok(Some(table))
}

/// Load the table at `path`, creating an empty one if no file exists.
///
/// A new file carries exactly `R::COLUMNS` and no rows, and is written before
/// this returns. An existing file is never migrated.
///
/// # Errors
///
/// `StoreUnavailable` on I/O failure, `CorruptStore` if the existing file does
/// not match the schema.
pub fn ensure_table<R: Record>(path: &Path) -> Result<Table<R>> {
    if let Some(table) = read_table(path)? {
        return Ok(table);
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| StoreError::unavailable(parent, e))?;
    }
    let mut table = Table::new();
    let bytes = table.encode()?;
    write_atomic(path, &bytes)?;
    table.mark_saved(fingerprint(&bytes));
    tracing::info!(path = %path.display(), table = R::TABLE, "Created table");
    Ok(table)
}

/// Confirm the file at `path` still holds the bytes `table` was loaded from.
///
/// A table that was never loaded from a file always passes.
///
/// # Errors
///
/// `ConcurrentWriteConflict` if the file changed since load, `StoreUnavailable`
/// on I/O failure.
pub fn check<R: Record>(path: &Path, table: &Table<R>) -> Result<()> {
    let Some(expected) = table.fingerprint() else {
        return Ok(());
    };
    let current = match fs::read(path) {
        Ok(bytes) => Some(fingerprint(&bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => None,
        Err(e) => return Err(StoreError::unavailable(path, e)),
    };
    if current.as_deref() != Some(expected) {
        tracing::warn!(path = %path.display(), "Table changed on disk since it was loaded");
        return Err(StoreError::ConcurrentWriteConflict {
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

/// Write the whole table to `path`.
///
/// If the table was loaded from a file, the file must still hold the same
/// bytes; otherwise nothing is written.
///
/// # Errors
///
/// `ConcurrentWriteConflict` if the file changed since load, `StoreUnavailable`
/// on I/O failure.
pub fn save<R: Record>(path: &Path, table: &mut Table<R>) -> Result<()> {
    check(path, table)?;

    let bytes = table.encode()?;
    write_atomic(path, &bytes)?;
    write_atomic(
        &sequence_path(path),
        table.high_water().to_string().as_bytes(),
    )?;
    table.mark_saved(fingerprint(&bytes));
    tracing::debug!(path = %path.display(), rows = table.len(), "Saved table");
    Ok(())
}

fn read_high_water(path: &Path) -> Result<u64> {
    match fs::read_to_string(path) {
        Ok(text) => text
            .trim()
            .parse()
            .map_err(|_| StoreError::corrupt(path, "sequence file is not an integer")),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(0),
        Err(e) => Err(StoreError::unavailable(path, e)),
    }
}

/// Replace `path` with `bytes` via a synced temporary file and a rename.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut file = NamedTempFile::new_in(dir).map_err(|e| StoreError::unavailable(path, e))?;
    file.write_all(bytes)
        .map_err(|e| StoreError::unavailable(path, e))?;
    file.as_file()
        .sync_all()
        .map_err(|e| StoreError::unavailable(path, e))?;
    file.persist(path)
        .map_err(|e| StoreError::unavailable(path, e.error))?;
    Ok(())
}
