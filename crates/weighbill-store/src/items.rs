//! Item operations.
//!
//! Every item mutation refreshes the stored totals of the bill(s) it touches,
//! so `Bill.csv` stays consistent with `Item.csv` for external readers.

use serde_json::{Map, Value};
use weighbill_core::{BillId, Item, ItemChanges, ItemId, ItemInput};

use crate::error::{Result, StoreError};
use crate::ledger::Ledger;
use crate::RecordStore;

impl<S: RecordStore> Ledger<S> {
    /// Add an item to an existing bill.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for bad fields, `ParentNotFound` if the bill does not
    /// exist. Neither table is written in either case.
    pub fn create_item(&self, input: ItemInput, bill_id: BillId) -> Result<Item> {
        input.validate()?;
        self.write(move |t| {
            if !t.bills.contains(bill_id.get()) {
                return Err(StoreError::ParentNotFound { bill_id });
            }
            let item = Item::from_input(t.next_item_id()?, bill_id, input);
            t.items.push(item.clone());
            t.refresh_totals(bill_id);
            tracing::info!(
                item_id = %item.id,
                bill_id = %bill_id,
                amount = item.amount,
                net_weight = item.net_weight,
                "Created item"
            );
            Ok(item)
        })
    }

    /// Get an item by key.
    ///
    /// # Errors
    ///
    /// `NotFound` if no item has this key.
    pub fn get_item(&self, id: ItemId) -> Result<Item> {
        self.read(|t| {
            t.items
                .get(id.get())
                .cloned()
                .ok_or_else(|| StoreError::not_found("item", id))
        })
    }

    /// Items of one bill in storage order; empty if the bill has none.
    ///
    /// # Errors
    ///
    /// Store errors only.
    pub fn list_items_by_bill(&self, bill_id: BillId) -> Result<Vec<Item>> {
        self.read(|t| {
            Ok(t.items
                .iter()
                .filter(|i| i.bill_id == bill_id)
                .cloned()
                .collect())
        })
    }

    /// Apply field changes to an item, recomputing `amount` and `net_weight`.
    ///
    /// Moving an item to another bill refreshes the totals of both bills.
    ///
    /// # Errors
    ///
    /// `NotFound`, `ParentNotFound` for a missing target bill, or
    /// `InvalidInput`.
    pub fn update_item(&self, id: ItemId, changes: &ItemChanges) -> Result<Item> {
        self.write(|t| {
            if !t.items.contains(id.get()) {
                return Err(StoreError::not_found("item", id));
            }
            if let Some(target) = changes.bill_id {
                if !t.bills.contains(target.get()) {
                    tracing::warn!(item_id = %id, bill_id = %target, "Rejected item move");
                    return Err(StoreError::ParentNotFound { bill_id: target });
                }
            }

            let item = t
                .items
                .get_mut(id.get())
                .ok_or_else(|| StoreError::not_found("item", id))?;
            let previous = item.bill_id;
            if let Err(e) = changes.apply(item) {
                tracing::warn!(item_id = %id, error = %e, "Rejected item update");
                return Err(e.into());
            }
            let updated = item.clone();

            t.refresh_totals(previous);
            if updated.bill_id != previous {
                t.refresh_totals(updated.bill_id);
            }
            tracing::info!(item_id = %id, bill_id = %updated.bill_id, "Updated item");
            Ok(updated)
        })
    }

    /// Apply a column-name → value map to an item.
    ///
    /// # Errors
    ///
    /// `InvalidInput` listing every unknown, derived or ill-typed field, then
    /// the errors of [`Ledger::update_item`].
    pub fn update_item_fields(&self, id: ItemId, fields: &Map<String, Value>) -> Result<Item> {
        let changes = ItemChanges::from_fields(fields).map_err(|e| {
            tracing::warn!(item_id = %id, error = %e, "Rejected item update");
            e
        })?;
        self.update_item(id, &changes)
    }

    /// Delete one item. Returns `false` if there was no such item.
    ///
    /// # Errors
    ///
    /// Store errors only.
    pub fn delete_item(&self, id: ItemId) -> Result<bool> {
        self.write(|t| {
            let Some(bill_id) = t.items.get(id.get()).map(|i| i.bill_id) else {
                return Ok(false);
            };
            t.items.retain(|i| i.id != id);
            t.refresh_totals(bill_id);
            tracing::info!(item_id = %id, bill_id = %bill_id, "Deleted item");
            Ok(true)
        })
    }
}
