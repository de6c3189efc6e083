//! Field-level changes for stored bills and items.
//!
//! Callers usually hold a name → value map (a submitted form, a JSON body).
//! `from_fields` turns it into a typed patch and rejects, in one error, every
//! unknown column, every derived column and every value of the wrong type.
//! Nothing is applied unless the whole map is valid.

use serde_json::{Map, Value};

use crate::bill::Bill;
use crate::error::{Result, Violations};
use crate::ids::BillId;
use crate::item::Item;

/// Bill columns computed by the store.
pub const BILL_DERIVED_COLUMNS: &[&str] =
    &["id", "taxableValue", "total", "total_quantity", "createdAt"];

/// Item columns computed by the store.
pub const ITEM_DERIVED_COLUMNS: &[&str] = &["id", "amount", "net_weight"];

/// Changes to a bill's own fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BillChanges {
    /// New invoice number.
    pub invoice_no: Option<String>,
    /// New supplier name.
    pub supplier_name: Option<String>,
    /// New supplier details.
    pub supplier_other_info: Option<String>,
}

impl BillChanges {
    /// Parse and validate a column-name map.
    ///
    /// # Errors
    ///
    /// Lists every unknown, derived or ill-typed field.
    pub fn from_fields(fields: &Map<String, Value>) -> Result<Self> {
        let mut reader = FieldReader::default();
        let mut changes = Self::default();
        for (name, value) in fields {
            match name.as_str() {
                "invoiceNo" => changes.invoice_no = reader.text(name, value),
                "supplierName" => changes.supplier_name = reader.text(name, value),
                "supplierOtherInfo" => changes.supplier_other_info = reader.string(name, value),
                other => reader.reject(other, BILL_DERIVED_COLUMNS),
            }
        }
        reader.v.finish(changes)
    }

    /// Whether no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Apply the set fields to `bill`.
    ///
    /// # Errors
    ///
    /// Returns the offending fields if the result would be invalid.
    pub fn apply(&self, bill: &mut Bill) -> Result<()> {
        let mut next = bill.clone();
        if let Some(v) = &self.invoice_no {
            next.invoice_no.clone_from(v);
        }
        if let Some(v) = &self.supplier_name {
            next.supplier_name.clone_from(v);
        }
        if let Some(v) = &self.supplier_other_info {
            next.supplier_other_info.clone_from(v);
        }
        next.validate()?;
        *bill = next;
        Ok(())
    }
}

/// Changes to an item's own fields.
///
/// Nullable columns use `Option<Option<_>>`: `Some(None)` clears the value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemChanges {
    /// Move the item to another bill.
    pub bill_id: Option<BillId>,
    /// Goods description.
    pub goods: Option<String>,
    /// HSN/SAC code.
    pub hsn_sac: Option<String>,
    /// Quantity.
    pub quantity: Option<f64>,
    /// Rate.
    pub rate: Option<f64>,
    /// Unit label.
    pub par: Option<String>,
    /// Farmer name.
    pub farmer_name: Option<String>,
    /// Farmer code.
    pub farmer_code: Option<Option<String>>,
    /// Vehicle number.
    pub vehicle_no: Option<String>,
    /// Goods type.
    pub good_type: Option<String>,
    /// Reading before unloading.
    pub before_weight: Option<f64>,
    /// Reading after unloading.
    pub after_weight: Option<f64>,
    /// Gate-in time.
    pub in_time: Option<Option<String>>,
    /// Gate-out time.
    pub out_time: Option<Option<String>>,
}

impl ItemChanges {
    /// Parse and validate a column-name map.
    ///
    /// # Errors
    ///
    /// Lists every unknown, derived or ill-typed field.
    pub fn from_fields(fields: &Map<String, Value>) -> Result<Self> {
        let mut reader = FieldReader::default();
        let mut c = Self::default();
        for (name, value) in fields {
            match name.as_str() {
                "billId" => c.bill_id = reader.bill_id(name, value),
                "goods" => c.goods = reader.text(name, value),
                "hsn_sac" => c.hsn_sac = reader.string(name, value),
                "quantity" => c.quantity = reader.number(name, value),
                "rate" => c.rate = reader.number(name, value),
                "par" => c.par = reader.string(name, value),
                "farmerName" => c.farmer_name = reader.string(name, value),
                "farmerCode" => c.farmer_code = reader.nullable(name, value),
                "vehicle_no" => c.vehicle_no = reader.string(name, value),
                "goodType" => c.good_type = reader.string(name, value),
                "before_weight" => c.before_weight = reader.number(name, value),
                "after_weight" => c.after_weight = reader.number(name, value),
                "in_time" => c.in_time = reader.nullable(name, value),
                "out_time" => c.out_time = reader.nullable(name, value),
                other => reader.reject(other, ITEM_DERIVED_COLUMNS),
            }
        }
        reader.v.finish(c)
    }

    /// Whether any field feeding `amount` or `net_weight` changes.
    #[must_use]
    pub fn touches_derived(&self) -> bool {
        self.quantity.is_some()
            || self.rate.is_some()
            || self.before_weight.is_some()
            || self.after_weight.is_some()
    }

    /// Apply the set fields to `item` and recompute derived fields.
    ///
    /// `bill_id` is applied as given; the store checks that the bill exists.
    ///
    /// # Errors
    ///
    /// Returns the offending fields if the result would be invalid.
    pub fn apply(&self, item: &mut Item) -> Result<()> {
        let mut next = item.clone();
        if let Some(v) = self.bill_id {
            next.bill_id = v;
        }
        set(&mut next.goods, &self.goods);
        set(&mut next.hsn_sac, &self.hsn_sac);
        set(&mut next.par, &self.par);
        set(&mut next.farmer_name, &self.farmer_name);
        set(&mut next.farmer_code, &self.farmer_code);
        set(&mut next.vehicle_no, &self.vehicle_no);
        set(&mut next.good_type, &self.good_type);
        set(&mut next.in_time, &self.in_time);
        set(&mut next.out_time, &self.out_time);
        set(&mut next.quantity, &self.quantity);
        set(&mut next.rate, &self.rate);
        set(&mut next.before_weight, &self.before_weight);
        set(&mut next.after_weight, &self.after_weight);
        next.validate()?;
        next.recompute();
        *item = next;
        Ok(())
    }
}

fn set<T: Clone>(target: &mut T, change: &Option<T>) {
    if let Some(v) = change {
        target.clone_from(v);
    }
}

#[derive(Default)]
struct FieldReader {
    v: Violations,
}

impl FieldReader {
    fn reject(&mut self, name: &str, derived: &[&str]) {
        if derived.contains(&name) {
            self.v.push(name, "derived column cannot be set");
        } else {
            self.v.push(name, "unknown column");
        }
    }

    fn string(&mut self, name: &str, value: &Value) -> Option<String> {
        match value {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => {
                self.v.push(name, "expected a string");
                None
            }
        }
    }

    fn text(&mut self, name: &str, value: &Value) -> Option<String> {
        let s = self.string(name, value)?;
        if s.trim().is_empty() {
            self.v.push(name, "must not be blank");
            return None;
        }
        Some(s)
    }

    fn nullable(&mut self, name: &str, value: &Value) -> Option<Option<String>> {
        if value.is_null() {
            return Some(None);
        }
        self.string(name, value).map(Some)
    }

    fn number(&mut self, name: &str, value: &Value) -> Option<f64> {
        let n = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        match n {
            Some(n) if n.is_finite() && n >= 0.0 => Some(n),
            _ => {
                self.v.push(name, "must be a finite non-negative number");
                None
            }
        }
    }

    fn bill_id(&mut self, name: &str, value: &Value) -> Option<BillId> {
        let id = match value {
            Value::Number(n) => n.as_u64().and_then(|n| BillId::new(n).ok()),
            Value::String(s) => s.parse().ok(),
            _ => None,
        };
        if id.is_none() {
            self.v.push(name, "expected a bill id");
        }
        id
    }
}
