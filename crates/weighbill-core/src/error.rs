//! Error types for weighbill input validation.

use std::fmt;

use serde::Serialize;

/// Result type for validation.
pub type Result<T> = std::result::Result<T, ValidationError>;

/// One offending field and why it was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Column or input path, e.g. `quantity` or `items[1].rate`.
    pub field: String,
    /// Short reason, e.g. "must not be blank".
    pub reason: String,
}

impl FieldError {
    /// Create a field error.
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.field, self.reason)
    }
}

/// Input rejected at create or update time.
///
/// Always lists every offending field, never just the first one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
pub struct ValidationError {
    /// The offending fields, in input order.
    pub fields: Vec<FieldError>,
}

impl ValidationError {
    /// A validation error for a single field.
    pub fn single(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            fields: vec![FieldError::new(field, reason)],
        }
    }

    /// Names of the offending fields.
    #[must_use]
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.field.as_str()).collect()
    }

    /// Whether `field` is among the offenders.
    #[must_use]
    pub fn has_field(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f.field == field)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("invalid input: ")?;
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{field}")?;
        }
        Ok(())
    }
}

/// Collects field errors and turns them into a single `ValidationError`.
#[derive(Debug, Default)]
pub struct Violations {
    fields: Vec<FieldError>,
}

impl Violations {
    /// Start an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one offending field.
    pub fn push(&mut self, field: impl Into<String>, reason: impl Into<String>) {
        self.fields.push(FieldError::new(field, reason));
    }

    /// Merge another error, prefixing its field names with `prefix`.
    pub fn extend_prefixed(&mut self, prefix: &str, error: ValidationError) {
        self.fields.extend(error.fields.into_iter().map(|f| FieldError {
            field: format!("{prefix}.{}", f.field),
            reason: f.reason,
        }));
    }

    /// Require `value` to contain something other than whitespace.
    pub fn require_text(&mut self, field: &str, value: &str) {
        if value.trim().is_empty() {
            self.push(field, "must not be blank");
        }
    }

    /// Require `value` to be a finite, non-negative number.
    pub fn require_non_negative(&mut self, field: &str, value: f64) {
        if !value.is_finite() || value < 0.0 {
            self.push(field, "must be a finite non-negative number");
        }
    }

    /// Whether nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// `Ok(value)` if nothing was recorded, otherwise the collected error.
    ///
    /// # Errors
    ///
    /// Returns every recorded field as one `ValidationError`.
    pub fn finish<T>(self, value: T) -> Result<T> {
        if self.fields.is_empty() {
            Ok(value)
        } else {
            Err(ValidationError {
                fields: self.fields,
            })
        }
    }
}
