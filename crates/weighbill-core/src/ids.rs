//! Identifier types for weighbill.
//!
//! Bills and items are keyed by integer surrogate keys that start at 1. The
//! newtypes keep a bill key from being passed where an item key is expected.
//!
//! # Macro-based ID Types
//!
//! The `int_id_type!` macro generates the shared plumbing: serialization as a
//! bare integer, parsing, display and the rejection of zero.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Macro to define an integer surrogate key type with standard trait implementations.
///
/// This macro generates a newtype wrapper around `u64` with implementations for:
/// - `Clone`, `Copy`, `PartialEq`, `Eq`, `PartialOrd`, `Ord`, `Hash`
/// - `Serialize`, `Deserialize` (as a bare integer, zero rejected)
/// - `FromStr`, `Display`, `Debug`
/// - `TryFrom<u64>`, `Into<u64>`
///
/// # Example
///
/// ```ignore
/// int_id_type!(MyId, "A custom identifier type.");
/// let id = MyId::new(7).unwrap();
/// let parsed: MyId = id.to_string().parse().unwrap();
/// ```
macro_rules! int_id_type {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "u64", into = "u64")]
        pub struct $name(u64);

        impl $name {
            /// Create an identifier, rejecting zero.
            ///
            /// # Errors
            ///
            /// Returns `IdError::Zero` for `0`; keys start at 1.
            pub const fn new(value: u64) -> Result<Self, IdError> {
                if value == 0 {
                    return Err(IdError::Zero);
                }
                Ok(Self(value))
            }

            /// The first key handed out in an empty table.
            #[must_use]
            pub const fn first() -> Self {
                Self(1)
            }

            /// Return the raw integer value.
            #[must_use]
            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let value = s.trim().parse::<u64>().map_err(|_| IdError::InvalidInteger)?;
                Self::new(value)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl TryFrom<u64> for $name {
            type Error = IdError;

            fn try_from(value: u64) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for u64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

int_id_type!(BillId, "Surrogate key of a bill row.\n\nUnrelated to the invoice number, which may repeat.");
int_id_type!(ItemId, "Surrogate key of an item row.\n\nUnique within the item table of one ledger.");

/// Errors that can occur when parsing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// The input is not an unsigned integer.
    #[error("identifier is not an unsigned integer")]
    InvalidInteger,

    /// Zero is never a valid key.
    #[error("identifier must be at least 1")]
    Zero,
}
