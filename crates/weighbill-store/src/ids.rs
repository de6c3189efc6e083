//! Surrogate key allocation.

use crate::schema::Record;

/// Next unused key for a table: `1` when empty, else `max(key) + 1`.
///
/// Pure; a linear scan is fine for hand-entered tables. `None` once the
/// largest key is `u64::MAX`.
#[must_use]
pub fn next_id<R: Record>(rows: &[R]) -> Option<u64> {
    rows.iter()
        .map(Record::key)
        .max()
        .map_or(Some(1), |max| max.checked_add(1))
}
