use core::{mem, ptr};

use bytesize::ByteSize;
use log::trace;

use crate::{error::AllocError, lifecycle, raw::RawBlock, traits::Allocator};

/// Moves the first `live` values of `block` into a new block of exactly `target` slots, then
/// releases the old block.
///
/// The new block is fully populated before the old one is released. If allocation fails,
/// `block` is left exactly as it was.
///
/// Values are moved bitwise, which cannot fail and leaves nothing in the old block to destroy.
///
/// # Safety
///
/// The first `live` slots of `block` must hold live values, and `live <= target`.
pub(crate) unsafe fn reallocate_to<T, A: Allocator>(
    block: &mut RawBlock<T, A>,
    live: usize,
    target: usize,
) -> Result<(), AllocError> {
    debug_assert!(live <= target);

    let new = block.allocate_slots(target)?;
    ptr::copy_nonoverlapping(block.ptr(), new.as_ptr(), live);

    let (old, old_cap) = block.replace_block(new, target);
    block.deallocate_slots(old, old_cap);

    trace!(
        "reallocated {live} values: {old_cap} -> {target} slots ({})",
        ByteSize::b((target * mem::size_of::<T>()) as u64).to_string_as(true)
    );

    Ok(())
}

/// Frees an unowned block if construction into it unwinds.
struct BlockGuard<'a, T, A: Allocator> {
    owner: &'a RawBlock<T, A>,
    ptr: ptr::NonNull<T>,
    cap: usize,
}

impl<T, A: Allocator> Drop for BlockGuard<'_, T, A> {
    fn drop(&mut self) {
        // SAFETY: the slots were allocated by `owner` and hold no live values
        unsafe { self.owner.deallocate_slots(self.ptr, self.cap) };
    }
}

/// Like [`reallocate_to`], but also constructs values `live..target` in the new block, the
/// `i`-th one produced by `make(i)`.
///
/// The tail is built before any live value moves. If `make` panics, the values it produced are
/// destroyed, the new block is released, and `block` is left exactly as it was.
///
/// # Safety
///
/// The first `live` slots of `block` must hold live values, and `live <= target`.
pub(crate) unsafe fn reallocate_and_fill<T, A, F>(
    block: &mut RawBlock<T, A>,
    live: usize,
    target: usize,
    make: F,
) -> Result<(), AllocError>
where
    A: Allocator,
    F: FnMut(usize) -> T,
{
    debug_assert!(live <= target);

    let new = block.allocate_slots(target)?;
    let guard = BlockGuard {
        owner: &*block,
        ptr: new,
        cap: target,
    };
    lifecycle::construct_n(new.as_ptr(), live, target - live, make);
    mem::forget(guard);

    ptr::copy_nonoverlapping(block.ptr(), new.as_ptr(), live);

    let (old, old_cap) = block.replace_block(new, target);
    block.deallocate_slots(old, old_cap);

    trace!(
        "reallocated {live} values and filled {}: {old_cap} -> {target} slots ({})",
        target - live,
        ByteSize::b((target * mem::size_of::<T>()) as u64).to_string_as(true)
    );

    Ok(())
}
