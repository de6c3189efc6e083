//! Core types and utilities for weighbill.
//!
//! This crate provides the domain types shared by the weighbridge record store
//! and whatever presentation layer renders bills, gate passes and weight slips:
//!
//! - **Identifiers**: `BillId`, `ItemId`
//! - **Bills**: `Bill`, `BillInput`, `BillTotals`, `BillWithItems`
//! - **Items**: `Item`, `ItemInput`
//! - **Changes**: `BillChanges`, `ItemChanges`
//! - **Validation**: `ValidationError`, `FieldError`
//!
//! # Derived fields
//!
//! - `amount = quantity × rate`
//! - `net_weight = after_weight − before_weight`
//! - `total = Σ amount`, `total_quantity = Σ quantity`, `taxableValue = total`
//!
//! Derived fields are recomputed from their sources whenever a record is built,
//! changed or read back; callers never supply them.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod bill;
pub mod changes;
pub mod error;
pub mod ids;
pub mod item;

pub use bill::{Bill, BillInput, BillTotals, BillWithItems};
pub use changes::{BillChanges, ItemChanges, BILL_DERIVED_COLUMNS, ITEM_DERIVED_COLUMNS};
pub use error::{FieldError, Result, ValidationError, Violations};
pub use ids::{BillId, IdError, ItemId};
pub use item::{line_amount, net_weight, Item, ItemInput};
