//! Joined listings and ledger summaries.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;
use weighbill_core::{BillWithItems, Item};

use crate::error::Result;
use crate::ledger::{Ledger, Tables};
use crate::RecordStore;

/// Totals for one calendar day (by bill `createdAt`, UTC).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DailyTotal {
    /// Bills created that day.
    pub bills: usize,
    /// Sum of bill totals.
    pub amount: f64,
    /// Sum of item net weights.
    pub net_weight: f64,
}

/// Aggregate view of a ledger.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LedgerSummary {
    /// Number of bills.
    pub bill_count: usize,
    /// Number of items.
    pub item_count: usize,
    /// Sum of all bill totals.
    pub total_amount: f64,
    /// Sum of all item quantities.
    pub total_quantity: f64,
    /// Sum of all item net weights.
    pub total_net_weight: f64,
    /// Per-day breakdown, oldest first.
    pub daily: BTreeMap<NaiveDate, DailyTotal>,
}

impl LedgerSummary {
    /// Fold another summary into this one.
    pub fn merge(&mut self, other: &Self) {
        self.bill_count += other.bill_count;
        self.item_count += other.item_count;
        self.total_amount += other.total_amount;
        self.total_quantity += other.total_quantity;
        self.total_net_weight += other.total_net_weight;
        for (day, totals) in &other.daily {
            let entry = self.daily.entry(*day).or_default();
            entry.bills += totals.bills;
            entry.amount += totals.amount;
            entry.net_weight += totals.net_weight;
        }
    }
}

fn join(tables: &Tables) -> Vec<BillWithItems> {
    let mut index = tables.items_by_bill();
    tables
        .bills
        .iter()
        .map(|bill| {
            let items: Vec<Item> = index.remove(&bill.id).unwrap_or_default();
            BillWithItems::assemble(bill.clone(), items)
        })
        .collect()
}

impl<S: RecordStore> Ledger<S> {
    /// Every bill with its items, bills in storage order.
    ///
    /// A bill without items appears with an empty list. Items whose bill is
    /// missing are not listed.
    ///
    /// # Errors
    ///
    /// Store errors only.
    pub fn list_bills_with_items(&self) -> Result<Vec<BillWithItems>> {
        self.read(|t| Ok(join(t)))
    }

    /// Aggregate counts and totals for the whole ledger.
    ///
    /// # Errors
    ///
    /// Store errors only.
    pub fn summary(&self) -> Result<LedgerSummary> {
        self.read(|t| {
            let mut summary = LedgerSummary {
                item_count: t.items.len(),
                ..LedgerSummary::default()
            };
            for joined in join(t) {
                let net_weight = joined.net_weight();
                summary.bill_count += 1;
                summary.total_amount += joined.bill.total;
                summary.total_quantity += joined.bill.total_quantity;
                summary.total_net_weight += net_weight;

                let day = summary.daily.entry(joined.bill.created_at.date_naive()).or_default();
                day.bills += 1;
                day.amount += joined.bill.total;
                day.net_weight += net_weight;
            }
            Ok(summary)
        })
    }
}
