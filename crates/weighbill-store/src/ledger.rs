//! The ledger handle and bill operations.
//!
//! A `Ledger` is the explicit handle every repository call goes through. Each
//! call re-reads the tables it needs, so nothing cached outlives one call.
//! Mutations run under the ledger's writer mutex and the store's writer lock,
//! and persist only the tables they changed.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use serde_json::{Map, Value};
use weighbill_core::{Bill, BillChanges, BillId, BillInput, BillTotals, BillWithItems, Item, ItemId};

use crate::csv_store::CsvStore;
use crate::error::{Result, StoreError};
use crate::table::Table;
use crate::RecordStore;

/// Both tables of a ledger, loaded for one operation.
#[derive(Debug)]
pub(crate) struct Tables {
    pub(crate) bills: Table<Bill>,
    pub(crate) items: Table<Item>,
    location: PathBuf,
}

impl Tables {
    /// Allocate the next bill key.
    ///
    /// `CorruptStore` once the key space is used up.
    pub(crate) fn next_bill_id(&self) -> Result<BillId> {
        self.bills
            .allocate_id()
            .and_then(|id| BillId::new(id).ok())
            .ok_or_else(|| StoreError::corrupt(&self.location, "bill key space exhausted"))
    }

    /// Allocate the next item key.
    ///
    /// `CorruptStore` once the key space is used up.
    pub(crate) fn next_item_id(&self) -> Result<ItemId> {
        self.items
            .allocate_id()
            .and_then(|id| ItemId::new(id).ok())
            .ok_or_else(|| StoreError::corrupt(&self.location, "item key space exhausted"))
    }

    /// Items grouped by owning bill, each group in storage order.
    pub(crate) fn items_by_bill(&self) -> BTreeMap<BillId, Vec<Item>> {
        let mut index: BTreeMap<BillId, Vec<Item>> = BTreeMap::new();
        for item in self.items.iter() {
            index.entry(item.bill_id).or_default().push(item.clone());
        }
        index
    }

    /// Totals of one bill computed from the item table.
    pub(crate) fn totals_for(&self, bill_id: BillId) -> BillTotals {
        BillTotals::from_items(self.items.iter().filter(|i| i.bill_id == bill_id))
    }

    /// Store freshly computed totals on a bill, touching the table only if they changed.
    pub(crate) fn refresh_totals(&mut self, bill_id: BillId) {
        let totals = self.totals_for(bill_id);
        let stale = self
            .bills
            .get(bill_id.get())
            .is_some_and(|b| b.totals() != totals);
        if stale {
            if let Some(bill) = self.bills.get_mut(bill_id.get()) {
                bill.set_totals(totals);
            }
        }
    }
}

/// Handle to one ledger: a bill table and an item table in one store.
#[derive(Debug)]
pub struct Ledger<S = CsvStore> {
    store: S,
    writer: Mutex<()>,
}

impl Ledger<CsvStore> {
    /// Open (creating if needed) the ledger stored in `dir`.
    ///
    /// # Errors
    ///
    /// `StoreUnavailable` if the directory or files cannot be created,
    /// `CorruptStore` if existing files do not match the schema.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let ledger = Self::new(CsvStore::open(dir)?);
        ledger.ensure_tables()?;
        Ok(ledger)
    }
}

impl<S: RecordStore> Ledger<S> {
    /// Wrap a store.
    pub fn new(store: S) -> Self {
        Self {
            store,
            writer: Mutex::new(()),
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Make sure both tables exist with the expected columns.
    ///
    /// # Errors
    ///
    /// `StoreUnavailable` or `CorruptStore` from the store.
    pub fn ensure_tables(&self) -> Result<()> {
        self.read(|_| Ok(()))
    }

    fn guard(&self) -> Result<MutexGuard<'_, ()>> {
        self.writer
            .lock()
            .map_err(|_| StoreError::unavailable(self.store.location(), "ledger writer mutex poisoned"))
    }

    fn load_tables(&self) -> Result<Tables> {
        Ok(Tables {
            bills: self.store.load()?,
            items: self.store.load()?,
            location: self.store.location().to_path_buf(),
        })
    }

    /// Run `f` over freshly loaded tables.
    pub(crate) fn read<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Tables) -> Result<T>,
    {
        let _guard = self.guard()?;
        let tables = self.load_tables()?;
        f(&tables)
    }

    /// Run `f` over freshly loaded tables and persist what it changed.
    ///
    /// If `f` fails nothing is written. Every changed table is checked for
    /// outside edits before any of them is written, then bills are written
    /// before items.
    pub(crate) fn write<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Tables) -> Result<T>,
    {
        let _guard = self.guard()?;
        let _lock = self.store.lock()?;
        let mut tables = self.load_tables()?;
        let out = f(&mut tables)?;
        if tables.bills.is_dirty() {
            self.store.check(&tables.bills)?;
        }
        if tables.items.is_dirty() {
            self.store.check(&tables.items)?;
        }
        if tables.bills.is_dirty() {
            self.store.save(&mut tables.bills)?;
        }
        if tables.items.is_dirty() {
            self.store.save(&mut tables.items)?;
        }
        Ok(out)
    }

    // =========================================================================
    // Bill Operations
    // =========================================================================

    /// Create a bill together with any attached items.
    ///
    /// Keys are allocated bill first, then items in input order. Totals are
    /// computed from the items and `createdAt` is stamped now.
    ///
    /// # Errors
    ///
    /// `InvalidInput` listing every offending field; store errors otherwise.
    pub fn create_bill(&self, input: BillInput) -> Result<BillWithItems> {
        input.validate()?;
        self.write(move |t| {
            let bill_id = t.next_bill_id()?;
            let bill = Bill::from_input(bill_id, &input, Utc::now());

            let mut items = Vec::with_capacity(input.items.len());
            for item_input in input.items {
                let item = Item::from_input(t.next_item_id()?, bill_id, item_input);
                t.items.push(item.clone());
                items.push(item);
            }

            let created = BillWithItems::assemble(bill, items);
            t.bills.push(created.bill.clone());
            tracing::info!(
                bill_id = %bill_id,
                invoice_no = %created.bill.invoice_no,
                items = created.items.len(),
                total = created.bill.total,
                "Created bill"
            );
            Ok(created)
        })
    }

    /// Get a bill by key, totals recomputed from its items.
    ///
    /// # Errors
    ///
    /// `NotFound` if no bill has this key.
    pub fn get_bill(&self, id: BillId) -> Result<Bill> {
        self.read(|t| {
            let mut bill = t
                .bills
                .get(id.get())
                .cloned()
                .ok_or_else(|| StoreError::not_found("bill", id))?;
            bill.set_totals(t.totals_for(id));
            Ok(bill)
        })
    }

    /// All bills in storage order, totals recomputed.
    ///
    /// Storage order is insertion order, not key order; sort if needed.
    ///
    /// # Errors
    ///
    /// Store errors only.
    pub fn list_bills(&self) -> Result<Vec<Bill>> {
        self.read(|t| {
            let index = t.items_by_bill();
            Ok(t
                .bills
                .iter()
                .map(|bill| {
                    let mut bill = bill.clone();
                    let items = index.get(&bill.id).map_or(&[][..], Vec::as_slice);
                    bill.set_totals(BillTotals::from_items(items));
                    bill
                })
                .collect())
        })
    }

    /// Apply field changes to a bill.
    ///
    /// # Errors
    ///
    /// `NotFound` if absent, `InvalidInput` if a changed value is invalid.
    pub fn update_bill(&self, id: BillId, changes: &BillChanges) -> Result<Bill> {
        if changes.is_empty() {
            return self.get_bill(id);
        }
        self.write(|t| {
            let totals = t.totals_for(id);
            let bill = t
                .bills
                .get_mut(id.get())
                .ok_or_else(|| StoreError::not_found("bill", id))?;
            if let Err(e) = changes.apply(bill) {
                tracing::warn!(bill_id = %id, error = %e, "Rejected bill update");
                return Err(e.into());
            }
            bill.set_totals(totals);
            tracing::info!(bill_id = %id, "Updated bill");
            Ok(bill.clone())
        })
    }

    /// Apply a column-name → value map to a bill.
    ///
    /// Unknown columns, derived columns and ill-typed values are all reported
    /// in one `InvalidInput`; nothing is applied in that case.
    ///
    /// # Errors
    ///
    /// `InvalidInput`, `NotFound` or store errors.
    pub fn update_bill_fields(&self, id: BillId, fields: &Map<String, Value>) -> Result<Bill> {
        let changes = BillChanges::from_fields(fields).map_err(|e| {
            tracing::warn!(bill_id = %id, error = %e, "Rejected bill update");
            e
        })?;
        self.update_bill(id, &changes)
    }

    /// Delete a bill and every item that references it.
    ///
    /// Returns `false` if there was no such bill.
    ///
    /// # Errors
    ///
    /// Store errors only.
    pub fn delete_bill(&self, id: BillId) -> Result<bool> {
        self.write(|t| {
            if t.bills.retain(|b| b.id != id) == 0 {
                tracing::debug!(bill_id = %id, "No bill to delete");
                return Ok(false);
            }
            let items = t.items.retain(|i| i.bill_id != id);
            tracing::info!(bill_id = %id, items, "Deleted bill and its items");
            Ok(true)
        })
    }
}
