//! In-place construction and destruction of elements.
//!
//! Every element of an array is written by [`construct`] (or [`construct_n`]) and torn down by
//! [`destroy`] (or [`destroy_range`]). None of these touch the block itself.

use core::{mem, ops::Range, ptr};

/// Moves `value` into an uninitialized slot.
///
/// # Safety
///
/// `slot` must be valid for writes, properly aligned, and must not hold a live value.
#[inline]
pub(crate) unsafe fn construct<T>(slot: *mut T, value: T) {
    slot.write(value);
}

/// Runs the destructor of the value in `slot`, leaving it uninitialized.
///
/// # Safety
///
/// `slot` must hold a live value that nothing else will drop or read afterwards.
#[inline]
pub(crate) unsafe fn destroy<T>(slot: *mut T) {
    ptr::drop_in_place(slot);
}

/// Destroys the values at `base[range]`, last to first.
///
/// # Safety
///
/// Every slot in the range must hold a live value that nothing else will drop or read afterwards.
pub(crate) unsafe fn destroy_range<T>(base: *mut T, range: Range<usize>) {
    if !mem::needs_drop::<T>() {
        return;
    }

    for index in range.rev() {
        destroy(base.add(index));
    }
}

/// Destroys a partially constructed run of slots if construction unwinds.
struct ConstructGuard<T> {
    base: *mut T,
    start: usize,
    constructed: usize,
}

impl<T> Drop for ConstructGuard<T> {
    fn drop(&mut self) {
        // SAFETY: exactly `constructed` slots after `start` were written
        unsafe { destroy_range(self.base, self.start..self.start + self.constructed) };
    }
}

/// Constructs `count` values at `base[start..start + count]`, the `i`-th one produced by
/// `make(i)`.
///
/// This is all-or-nothing: if `make` panics, the values already constructed by this call are
/// destroyed in reverse order before the panic continues, and the slots are left uninitialized.
///
/// # Safety
///
/// The slots must be valid for writes, properly aligned, and must not hold live values.
pub(crate) unsafe fn construct_n<T, F>(base: *mut T, start: usize, count: usize, mut make: F)
where
    F: FnMut(usize) -> T,
{
    let mut guard = ConstructGuard {
        base,
        start,
        constructed: 0,
    };

    for i in 0..count {
        construct(base.add(start + i), make(i));
        guard.constructed += 1;
    }

    mem::forget(guard);
}
