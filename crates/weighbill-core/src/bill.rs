//! Bill types for weighbill.
//!
//! A bill is the parent record of an invoice. Its money and quantity fields are
//! aggregates over its items and are never taken from the caller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, Violations};
use crate::ids::BillId;
use crate::item::{Item, ItemInput};

/// Aggregates derived from a bill's items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BillTotals {
    /// Sum of item amounts.
    pub total: f64,
    /// Sum of item quantities.
    pub total_quantity: f64,
    /// Taxable value; equal to `total` (no tax lines are modelled).
    pub taxable_value: f64,
}

impl BillTotals {
    /// Sum the given items.
    pub fn from_items<'a, I>(items: I) -> Self
    where
        I: IntoIterator<Item = &'a Item>,
    {
        let (total, total_quantity) = items
            .into_iter()
            .fold((0.0, 0.0), |(total, qty), item| {
                (total + item.amount, qty + item.quantity)
            });
        Self {
            total,
            total_quantity,
            taxable_value: total,
        }
    }
}

/// A stored bill.
///
/// Field order matches the `Bill` table columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bill {
    /// Surrogate key.
    pub id: BillId,

    /// Invoice number; not unique.
    #[serde(rename = "invoiceNo")]
    pub invoice_no: String,

    /// Supplier name.
    #[serde(rename = "supplierName")]
    pub supplier_name: String,

    /// Free-form supplier details (address, GSTIN, ...).
    #[serde(rename = "supplierOtherInfo")]
    pub supplier_other_info: String,

    /// Derived: equal to `total`.
    #[serde(rename = "taxableValue")]
    pub taxable_value: f64,

    /// Derived: sum of item amounts.
    pub total: f64,

    /// Derived: sum of item quantities.
    pub total_quantity: f64,

    /// Creation instant; set once.
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl Bill {
    /// Materialize a bill from validated input, with zero totals.
    #[must_use]
    pub fn from_input(id: BillId, input: &BillInput, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            invoice_no: input.invoice_no.clone(),
            supplier_name: input.supplier_name.clone(),
            supplier_other_info: input.supplier_other_info.clone(),
            taxable_value: 0.0,
            total: 0.0,
            total_quantity: 0.0,
            created_at,
        }
    }

    /// Current aggregates.
    #[must_use]
    pub fn totals(&self) -> BillTotals {
        BillTotals {
            total: self.total,
            total_quantity: self.total_quantity,
            taxable_value: self.taxable_value,
        }
    }

    /// Overwrite the aggregates.
    pub fn set_totals(&mut self, totals: BillTotals) {
        self.total = totals.total;
        self.total_quantity = totals.total_quantity;
        self.taxable_value = totals.taxable_value;
    }

    /// Check the user-supplied fields of a stored bill.
    ///
    /// # Errors
    ///
    /// Returns every offending field.
    pub fn validate(&self) -> Result<()> {
        let mut v = Violations::new();
        v.require_text("invoiceNo", &self.invoice_no);
        v.require_text("supplierName", &self.supplier_name);
        v.finish(())
    }
}

/// Caller-supplied fields for a new bill, optionally with its items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillInput {
    /// Invoice number.
    #[serde(rename = "invoiceNo")]
    pub invoice_no: String,
    /// Supplier name.
    #[serde(rename = "supplierName")]
    pub supplier_name: String,
    /// Supplier details.
    #[serde(rename = "supplierOtherInfo", default)]
    pub supplier_other_info: String,
    /// Items created together with the bill.
    #[serde(default)]
    pub items: Vec<ItemInput>,
}

impl BillInput {
    /// Input without items.
    pub fn new(invoice_no: impl Into<String>, supplier_name: impl Into<String>) -> Self {
        Self {
            invoice_no: invoice_no.into(),
            supplier_name: supplier_name.into(),
            supplier_other_info: String::new(),
            items: Vec::new(),
        }
    }

    /// Attach an item.
    #[must_use]
    pub fn with_item(mut self, item: ItemInput) -> Self {
        self.items.push(item);
        self
    }

    /// Set the supplier details.
    #[must_use]
    pub fn with_other_info(mut self, info: impl Into<String>) -> Self {
        self.supplier_other_info = info.into();
        self
    }

    /// Check the bill fields and every attached item.
    ///
    /// Item errors are reported as `items[i].field`.
    ///
    /// # Errors
    ///
    /// Returns every offending field.
    pub fn validate(&self) -> Result<()> {
        let mut v = Violations::new();
        v.require_text("invoiceNo", &self.invoice_no);
        v.require_text("supplierName", &self.supplier_name);
        for (i, item) in self.items.iter().enumerate() {
            if let Err(err) = item.validate() {
                v.extend_prefixed(&format!("items[{i}]"), err);
            }
        }
        v.finish(())
    }
}

/// A bill with its items nested under it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillWithItems {
    /// The bill, totals consistent with `items`.
    #[serde(flatten)]
    pub bill: Bill,
    /// Items in storage order; empty for a bill without lines.
    pub items: Vec<Item>,
}

impl BillWithItems {
    /// Nest `items` under `bill`, recomputing every derived field.
    #[must_use]
    pub fn assemble(mut bill: Bill, mut items: Vec<Item>) -> Self {
        for item in &mut items {
            item.recompute();
        }
        bill.set_totals(BillTotals::from_items(&items));
        Self { bill, items }
    }

    /// Sum of item net weights.
    #[must_use]
    pub fn net_weight(&self) -> f64 {
        self.items.iter().map(|i| i.net_weight).sum()
    }
}
