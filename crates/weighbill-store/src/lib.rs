//! Spreadsheet-style storage layer for weighbill.
//!
//! This crate persists bills and their line items as two tables, one CSV file
//! each, so the data stays readable in any spreadsheet program.
//!
//! # Architecture
//!
//! A ledger directory holds:
//!
//! - `Bill.csv`: one row per bill, keyed by `id`
//! - `Item.csv`: one row per item, keyed by `id`, with `billId` referencing a bill
//! - `<Table>.seq`: highest key ever allocated, so deleted keys are never reused
//! - `.weighbill.lock`: advisory-locked while a writer holds the ledger
//!
//! Tables are loaded and saved whole. Saves go through a synced temporary file
//! and a rename, and are refused if the file changed since it was loaded.
//!
//! # Example
//!
//! ```no_run
//! use weighbill_core::{BillInput, ItemInput};
//! use weighbill_store::Ledger;
//!
//! let ledger = Ledger::open("./database/main").unwrap();
//!
//! let bill = ledger
//!     .create_bill(
//!         BillInput::new("INV1", "Acme")
//!             .with_item(ItemInput::new("wheat", 10.0, 5.0).with_weights(1000.0, 1500.0)),
//!     )
//!     .unwrap();
//!
//! assert_eq!(bill.bill.total, 50.0);
//! assert_eq!(bill.items[0].net_weight, 500.0);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod catalog;
pub mod config;
pub mod csv_store;
pub mod error;
pub mod ids;
pub mod items;
pub mod ledger;
pub mod legacy;
pub mod listing;
pub mod lock;
pub mod memory;
pub mod schema;
pub mod table;

use std::path::Path;

pub use catalog::{Catalog, CatalogSummary};
pub use config::StoreConfig;
pub use csv_store::CsvStore;
pub use error::{Result, StoreError};
pub use ledger::Ledger;
pub use legacy::{read_flat, FlatRecord, ImportReport};
pub use listing::{DailyTotal, LedgerSummary};
pub use lock::WriteLock;
pub use memory::MemoryStore;
pub use schema::Record;
pub use table::{check, ensure_table, save, Table};

/// The storage trait for whole-table persistence.
///
/// This trait abstracts where tables live, allowing for different
/// implementations (e.g. a CSV directory, in-memory for testing).
pub trait RecordStore: Send + Sync {
    /// Where this store keeps its tables, for error messages.
    fn location(&self) -> &Path;

    /// Load table `R`, creating an empty one if it does not exist yet.
    ///
    /// # Errors
    ///
    /// `StoreUnavailable` on I/O failure, `CorruptStore` if the stored table
    /// does not match `R::COLUMNS` or a row does not parse.
    fn load<R: Record>(&self) -> Result<Table<R>>;

    /// Confirm the stored table is unchanged since `table` was loaded.
    ///
    /// Lets a caller verify every table of a multi-table write before
    /// writing any of them.
    ///
    /// # Errors
    ///
    /// `ConcurrentWriteConflict` if it changed, `StoreUnavailable` on I/O
    /// failure.
    fn check<R: Record>(&self, table: &Table<R>) -> Result<()>;

    /// Persist all rows of `table`, replacing the stored table.
    ///
    /// # Errors
    ///
    /// `ConcurrentWriteConflict` if the stored table changed since `table` was
    /// loaded, `StoreUnavailable` on I/O failure.
    fn save<R: Record>(&self, table: &mut Table<R>) -> Result<()>;

    /// Take the exclusive writer lock for one mutation.
    ///
    /// # Errors
    ///
    /// `StoreUnavailable` if another writer holds it.
    fn lock(&self) -> Result<WriteLock>;
}
