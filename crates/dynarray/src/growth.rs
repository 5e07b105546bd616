//! Amortized growth.
//!
//! A full array grows to `len + len / 2 + 1` slots. The `+ 1` lets an empty array grow at all,
//! and the 1.5x factor keeps `n` appends at `O(log n)` reallocations and `O(n)` element moves.

use crate::error::AllocError;

/// Returns the capacity a full array of `len` elements grows to.
///
/// # Errors
///
/// Returns `Err` if the result would overflow `usize`.
#[inline]
pub fn next_capacity(len: usize) -> Result<usize, AllocError> {
    len.checked_add(len / 2)
        .and_then(|n| n.checked_add(1))
        .ok_or(AllocError::CapacityOverflow)
}
