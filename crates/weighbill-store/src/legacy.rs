//! Flat single-sheet format.
//!
//! Older ledgers were kept as one sheet where every row repeats the bill
//! columns next to one item. These helpers read such a sheet, import it into a
//! relational ledger, and write a ledger back out in the same shape.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use weighbill_core::{
    Bill, BillId, BillInput, BillWithItems, Item, ItemId, ItemInput, ValidationError, Violations,
};

use crate::error::{Result, StoreError};
use crate::ledger::Ledger;
use crate::schema::Record;
use crate::table::{self, Table};
use crate::RecordStore;

/// Columns of the flat sheet, in writer order.
pub const FLAT_COLUMNS: &[&str] = &[
    "id",
    "invoiceNo",
    "taxableValue",
    "total",
    "total_quantity",
    "supplierName",
    "supplierOtherInfo",
    "createdAt",
    "goods",
    "hsn_sac",
    "quantity",
    "rate",
    "par",
    "amount",
    "villagerName",
    "vehicle_no",
    "goodType",
    "before_wight",
    "after_wight",
    "net_wight",
];

const LEGACY_DAY_FORMAT: &str = "%d-%b-%y";
const LEGACY_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// One row of the flat sheet.
///
/// Field names follow the sheet's own spelling through `serde` renames.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatRecord {
    /// Row key.
    pub id: u64,
    #[serde(rename = "invoiceNo")]
    pub invoice_no: String,
    #[serde(rename = "taxableValue")]
    pub taxable_value: f64,
    pub total: f64,
    pub total_quantity: f64,
    #[serde(rename = "supplierName")]
    pub supplier_name: String,
    #[serde(rename = "supplierOtherInfo")]
    pub supplier_other_info: String,
    /// Creation time as written in the sheet.
    #[serde(rename = "createdAt")]
    pub created_at: String,
    pub goods: String,
    pub hsn_sac: String,
    pub quantity: f64,
    pub rate: f64,
    pub par: String,
    pub amount: f64,
    #[serde(rename = "villagerName")]
    pub villager_name: String,
    pub vehicle_no: String,
    #[serde(rename = "goodType")]
    pub good_type: String,
    #[serde(rename = "before_wight")]
    pub before_weight: f64,
    #[serde(rename = "after_wight")]
    pub after_weight: f64,
    /// Net weight as stored; may carry the old `before − after` sign.
    #[serde(rename = "net_wight")]
    pub net_weight: f64,
}

impl Record for FlatRecord {
    const TABLE: &'static str = "flat";
    const COLUMNS: &'static [&'static str] = FLAT_COLUMNS;

    fn key(&self) -> u64 {
        self.id
    }
}

impl FlatRecord {
    fn from_pair(id: u64, bill: &Bill, item: Option<&Item>) -> Self {
        let mut row = Self {
            id,
            invoice_no: bill.invoice_no.clone(),
            taxable_value: bill.taxable_value,
            total: bill.total,
            total_quantity: bill.total_quantity,
            supplier_name: bill.supplier_name.clone(),
            supplier_other_info: bill.supplier_other_info.clone(),
            created_at: bill.created_at.to_rfc3339(),
            goods: String::new(),
            hsn_sac: String::new(),
            quantity: 0.0,
            rate: 0.0,
            par: String::new(),
            amount: 0.0,
            villager_name: String::new(),
            vehicle_no: String::new(),
            good_type: String::new(),
            before_weight: 0.0,
            after_weight: 0.0,
            net_weight: 0.0,
        };
        if let Some(item) = item {
            row.goods.clone_from(&item.goods);
            row.hsn_sac.clone_from(&item.hsn_sac);
            row.quantity = item.quantity;
            row.rate = item.rate;
            row.par.clone_from(&item.par);
            row.amount = item.amount;
            row.villager_name.clone_from(&item.farmer_name);
            row.vehicle_no.clone_from(&item.vehicle_no);
            row.good_type.clone_from(&item.good_type);
            row.before_weight = item.before_weight;
            row.after_weight = item.after_weight;
            row.net_weight = item.net_weight;
        }
        row
    }

    /// Parse `createdAt`.
    ///
    /// Accepts RFC 3339, `2024-03-01 10:15:00` and the day-only `01-Mar-24`;
    /// `None` if no format matches.
    #[must_use]
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        let text = self.created_at.trim();
        if let Ok(t) = DateTime::parse_from_rfc3339(text) {
            return Some(t.with_timezone(&Utc));
        }
        if let Ok(t) = NaiveDateTime::parse_from_str(text, LEGACY_DATETIME_FORMAT) {
            return Some(t.and_utc());
        }
        NaiveDate::parse_from_str(text, LEGACY_DAY_FORMAT)
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|t| t.and_utc())
    }

    /// Whether the stored net weight carries the old `before − after` sign.
    #[must_use]
    pub fn has_flipped_sign(&self) -> bool {
        let flipped = self.before_weight - self.after_weight;
        self.before_weight != self.after_weight && (self.net_weight - flipped).abs() < 1e-9
    }

    fn item_input(&self) -> ItemInput {
        ItemInput {
            goods: self.goods.clone(),
            hsn_sac: self.hsn_sac.clone(),
            quantity: self.quantity,
            rate: self.rate,
            par: self.par.clone(),
            farmer_name: self.villager_name.clone(),
            farmer_code: None,
            vehicle_no: self.vehicle_no.clone(),
            good_type: self.good_type.clone(),
            before_weight: self.before_weight,
            after_weight: self.after_weight,
            in_time: None,
            out_time: None,
        }
    }

    fn bill_input(&self) -> BillInput {
        BillInput::new(self.invoice_no.clone(), self.supplier_name.clone())
            .with_other_info(self.supplier_other_info.clone())
            .with_item(self.item_input())
    }
}

/// Outcome of [`Ledger::import_flat`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    /// Rows imported, one bill each.
    pub imported: usize,
    /// Rows whose stored net weight had the opposite sign.
    pub sign_flipped: usize,
    /// Keys of the new bills, in row order.
    pub bill_ids: Vec<BillId>,
}

// A sheet is a lone file; no `.seq` sidecar is consulted.
fn read_rows(path: &Path) -> Result<Vec<FlatRecord>> {
    let bytes = fs::read(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => StoreError::not_found("flat sheet", path.display()),
        _ => StoreError::unavailable(path, e),
    })?;
    Ok(Table::<FlatRecord>::decode(&bytes, path)?.into_rows())
}

fn parse_created_at(path: &Path, row: &FlatRecord) -> Result<DateTime<Utc>> {
    row.created_at().ok_or_else(|| {
        StoreError::corrupt(
            path,
            format!("row {}: unrecognised createdAt {:?}", row.id, row.created_at),
        )
    })
}

/// Read a flat sheet as bills with one item each.
///
/// Bill and item keys are the row key. Derived fields are recomputed; the
/// stored `net_wight` is not trusted.
///
/// # Errors
///
/// `NotFound` if the file does not exist, `CorruptStore` if its header is not
/// exactly the flat column set or a row does not parse.
pub fn read_flat(path: &Path) -> Result<Vec<BillWithItems>> {
    read_rows(path)?
        .iter()
        .map(|row| {
            let created_at = parse_created_at(path, row)?;
            let bill_id = BillId::new(row.id).map_err(|e| StoreError::corrupt(path, e))?;
            let item_id = ItemId::new(row.id).map_err(|e| StoreError::corrupt(path, e))?;
            let bill = Bill::from_input(bill_id, &row.bill_input(), created_at);
            let item = Item::from_input(item_id, bill_id, row.item_input());
            Ok(BillWithItems::assemble(bill, vec![item]))
        })
        .collect()
}

impl<S: RecordStore> Ledger<S> {
    /// Append every row of a flat sheet as a new bill with one item.
    ///
    /// Keys are freshly allocated; `createdAt` is kept from the sheet. All
    /// rows are validated first and nothing is written if any fails.
    ///
    /// # Errors
    ///
    /// Errors of [`read_flat`], `InvalidInput` listing offending fields as
    /// `row N.field`, or store errors.
    pub fn import_flat(&self, path: &Path) -> Result<ImportReport> {
        let rows = read_rows(path)?;

        let mut v = Violations::new();
        let mut prepared = Vec::with_capacity(rows.len());
        for row in &rows {
            let input = row.bill_input();
            if let Err(e) = input.validate() {
                v.extend_prefixed(&format!("row {}", row.id), e);
            }
            prepared.push((input, parse_created_at(path, row)?, row.has_flipped_sign()));
        }
        v.finish(()).map_err(|e: ValidationError| {
            tracing::warn!(path = %path.display(), error = %e, "Rejected flat import");
            e
        })?;

        let report = self.write(move |t| {
            let mut report = ImportReport::default();
            for (input, created_at, flipped) in prepared {
                let bill_id = t.next_bill_id()?;
                let bill = Bill::from_input(bill_id, &input, created_at);
                let mut items = Vec::with_capacity(input.items.len());
                for item_input in input.items {
                    let item = Item::from_input(t.next_item_id()?, bill_id, item_input);
                    t.items.push(item.clone());
                    items.push(item);
                }
                t.bills.push(BillWithItems::assemble(bill, items).bill);

                if flipped {
                    tracing::warn!(bill_id = %bill_id, "Legacy row stored net weight as before minus after");
                    report.sign_flipped += 1;
                }
                report.imported += 1;
                report.bill_ids.push(bill_id);
            }
            Ok(report)
        })?;

        tracing::info!(
            path = %path.display(),
            imported = report.imported,
            sign_flipped = report.sign_flipped,
            "Imported flat sheet"
        );
        Ok(report)
    }

    /// Write the ledger as a flat sheet, one row per (bill, item) pair.
    ///
    /// A bill without items yields one row with zero and empty item cells.
    /// Rows are numbered from 1. The file is replaced atomically. Returns the
    /// number of rows written.
    ///
    /// # Errors
    ///
    /// Store errors only.
    pub fn export_flat(&self, path: &Path) -> Result<usize> {
        let joined = self.list_bills_with_items()?;
        let mut rows = Vec::new();
        for entry in &joined {
            if entry.items.is_empty() {
                rows.push(FlatRecord::from_pair(rows.len() as u64 + 1, &entry.bill, None));
            }
            for item in &entry.items {
                rows.push(FlatRecord::from_pair(rows.len() as u64 + 1, &entry.bill, Some(item)));
            }
        }

        let count = rows.len();
        let bytes = Table::from_rows(rows).encode()?;
        table::write_atomic(path, &bytes)?;
        tracing::info!(path = %path.display(), rows = count, "Exported flat sheet");
        Ok(count)
    }
}
