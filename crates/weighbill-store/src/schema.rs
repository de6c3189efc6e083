//! Table definitions.
//!
//! Each table is a CSV file named after the table. The column lists below are
//! the exact headers a file must carry; files with any other column set are
//! rejected rather than migrated.

use serde::de::DeserializeOwned;
use serde::Serialize;

use weighbill_core::{Bill, Item};

/// Table names, used as file stems.
pub mod table {
    /// Parent records.
    pub const BILL: &str = "Bill";

    /// Line items, keyed to a bill by `billId`.
    pub const ITEM: &str = "Item";
}

/// `Bill` columns in write order.
pub const BILL_COLUMNS: &[&str] = &[
    "id",
    "invoiceNo",
    "supplierName",
    "supplierOtherInfo",
    "taxableValue",
    "total",
    "total_quantity",
    "createdAt",
];

/// `Item` columns in write order.
pub const ITEM_COLUMNS: &[&str] = &[
    "id",
    "billId",
    "goods",
    "hsn_sac",
    "quantity",
    "rate",
    "par",
    "amount",
    "farmerName",
    "farmerCode",
    "vehicle_no",
    "goodType",
    "before_weight",
    "after_weight",
    "net_weight",
    "in_time",
    "out_time",
];

/// A row type that can live in a table file.
///
/// Field declaration order of the implementing struct must match `COLUMNS`,
/// since rows are written positionally under an explicit header.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Table name; the file is `<TABLE>.csv`.
    const TABLE: &'static str;

    /// Exact header set.
    const COLUMNS: &'static [&'static str];

    /// Surrogate key of this row.
    fn key(&self) -> u64;

    /// Recompute derived fields after a row is read back.
    fn normalize(&mut self) {}
}

impl Record for Bill {
    const TABLE: &'static str = table::BILL;
    const COLUMNS: &'static [&'static str] = BILL_COLUMNS;

    fn key(&self) -> u64 {
        self.id.get()
    }
}

impl Record for Item {
    const TABLE: &'static str = table::ITEM;
    const COLUMNS: &'static [&'static str] = ITEM_COLUMNS;

    fn key(&self) -> u64 {
        self.id.get()
    }

    fn normalize(&mut self) {
        self.recompute();
    }
}
