//! Item types for weighbill.
//!
//! An item is one weighbridge transaction line: the goods delivered, how much
//! at what rate, and the vehicle's weight before and after unloading.

use serde::{Deserialize, Serialize};

use crate::error::{Result, Violations};
use crate::ids::{BillId, ItemId};

/// Line amount: `quantity × rate`.
#[must_use]
pub fn line_amount(quantity: f64, rate: f64) -> f64 {
    quantity * rate
}

/// Net weight: the later reading minus the earlier one, `after − before`.
#[must_use]
pub fn net_weight(before_weight: f64, after_weight: f64) -> f64 {
    after_weight - before_weight
}

/// A stored line item belonging to exactly one bill.
///
/// Field order matches the `Item` table columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Surrogate key.
    pub id: ItemId,

    /// Owning bill.
    #[serde(rename = "billId")]
    pub bill_id: BillId,

    /// Goods description.
    pub goods: String,

    /// HSN/SAC classification code.
    pub hsn_sac: String,

    /// Quantity delivered.
    pub quantity: f64,

    /// Rate per unit.
    pub rate: f64,

    /// Unit label the rate applies to (e.g. "kg", "qtl").
    pub par: String,

    /// Derived: `quantity × rate`.
    pub amount: f64,

    /// Farmer (villager) who brought the goods.
    #[serde(rename = "farmerName")]
    pub farmer_name: String,

    /// Farmer code, when the desk assigns one.
    #[serde(rename = "farmerCode")]
    pub farmer_code: Option<String>,

    /// Vehicle registration number.
    pub vehicle_no: String,

    /// Goods type or grade.
    #[serde(rename = "goodType")]
    pub good_type: String,

    /// Weighbridge reading before unloading.
    pub before_weight: f64,

    /// Weighbridge reading after unloading.
    pub after_weight: f64,

    /// Derived: `after_weight − before_weight`.
    pub net_weight: f64,

    /// Gate-in time as written on the slip.
    pub in_time: Option<String>,

    /// Gate-out time as written on the slip.
    pub out_time: Option<String>,
}

impl Item {
    /// Materialize an item from validated input.
    #[must_use]
    pub fn from_input(id: ItemId, bill_id: BillId, input: ItemInput) -> Self {
        let mut item = Self {
            id,
            bill_id,
            goods: input.goods,
            hsn_sac: input.hsn_sac,
            quantity: input.quantity,
            rate: input.rate,
            par: input.par,
            amount: 0.0,
            farmer_name: input.farmer_name,
            farmer_code: input.farmer_code,
            vehicle_no: input.vehicle_no,
            good_type: input.good_type,
            before_weight: input.before_weight,
            after_weight: input.after_weight,
            net_weight: 0.0,
            in_time: input.in_time,
            out_time: input.out_time,
        };
        item.recompute();
        item
    }

    /// Recompute `amount` and `net_weight` from their source fields.
    ///
    /// Also turns blank `farmerCode`, `in_time` and `out_time` into `None`,
    /// since an empty CSV cell reads back as absent.
    pub fn recompute(&mut self) {
        self.amount = line_amount(self.quantity, self.rate);
        self.net_weight = net_weight(self.before_weight, self.after_weight);
        for field in [&mut self.farmer_code, &mut self.in_time, &mut self.out_time] {
            if field.as_deref().is_some_and(|s| s.trim().is_empty()) {
                *field = None;
            }
        }
    }

    /// Check the user-supplied fields of a stored item.
    ///
    /// # Errors
    ///
    /// Returns every offending field.
    pub fn validate(&self) -> Result<()> {
        let mut v = Violations::new();
        check_item_fields(
            &mut v,
            &self.goods,
            self.quantity,
            self.rate,
            self.before_weight,
            self.after_weight,
        );
        v.finish(())
    }
}

/// Caller-supplied fields for a new item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemInput {
    /// Goods description.
    pub goods: String,
    /// HSN/SAC classification code.
    #[serde(default)]
    pub hsn_sac: String,
    /// Quantity delivered.
    pub quantity: f64,
    /// Rate per unit.
    pub rate: f64,
    /// Unit label.
    #[serde(default)]
    pub par: String,
    /// Farmer name.
    #[serde(rename = "farmerName", default)]
    pub farmer_name: String,
    /// Farmer code.
    #[serde(rename = "farmerCode", default)]
    pub farmer_code: Option<String>,
    /// Vehicle registration number.
    #[serde(default)]
    pub vehicle_no: String,
    /// Goods type or grade.
    #[serde(rename = "goodType", default)]
    pub good_type: String,
    /// Reading before unloading.
    #[serde(default)]
    pub before_weight: f64,
    /// Reading after unloading.
    #[serde(default)]
    pub after_weight: f64,
    /// Gate-in time.
    #[serde(default)]
    pub in_time: Option<String>,
    /// Gate-out time.
    #[serde(default)]
    pub out_time: Option<String>,
}

impl ItemInput {
    /// Minimal input: goods, quantity and rate, everything else empty.
    pub fn new(goods: impl Into<String>, quantity: f64, rate: f64) -> Self {
        Self {
            goods: goods.into(),
            hsn_sac: String::new(),
            quantity,
            rate,
            par: String::new(),
            farmer_name: String::new(),
            farmer_code: None,
            vehicle_no: String::new(),
            good_type: String::new(),
            before_weight: 0.0,
            after_weight: 0.0,
            in_time: None,
            out_time: None,
        }
    }

    /// Set the weighbridge readings.
    #[must_use]
    pub fn with_weights(mut self, before_weight: f64, after_weight: f64) -> Self {
        self.before_weight = before_weight;
        self.after_weight = after_weight;
        self
    }

    /// Set the vehicle number.
    #[must_use]
    pub fn with_vehicle(mut self, vehicle_no: impl Into<String>) -> Self {
        self.vehicle_no = vehicle_no.into();
        self
    }

    /// Set the farmer name.
    #[must_use]
    pub fn with_farmer(mut self, farmer_name: impl Into<String>) -> Self {
        self.farmer_name = farmer_name.into();
        self
    }

    /// Check types and ranges.
    ///
    /// # Errors
    ///
    /// Returns every offending field.
    pub fn validate(&self) -> Result<()> {
        let mut v = Violations::new();
        check_item_fields(
            &mut v,
            &self.goods,
            self.quantity,
            self.rate,
            self.before_weight,
            self.after_weight,
        );
        v.finish(())
    }
}

fn check_item_fields(
    v: &mut Violations,
    goods: &str,
    quantity: f64,
    rate: f64,
    before_weight: f64,
    after_weight: f64,
) {
    v.require_text("goods", goods);
    v.require_non_negative("quantity", quantity);
    v.require_non_negative("rate", rate);
    v.require_non_negative("before_weight", before_weight);
    v.require_non_negative("after_weight", after_weight);
}
