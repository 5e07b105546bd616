use core::{alloc::Layout, ptr::NonNull};
use std::alloc;

use crate::error::AllocError;

/// A provider of raw memory blocks.
///
/// An allocator deals in bytes only. It never constructs or destroys values; that is the job of
/// whatever container owns the block.
///
/// # Safety
///
/// Implementors must return blocks that are valid for reads and writes of `layout.size()` bytes,
/// aligned to `layout.align()`, and not aliased by any other live block. A block stays valid until
/// it is passed to [`deallocate`](Allocator::deallocate) on the same allocator (or a reference to
/// it).
pub unsafe trait Allocator {
    /// Allocates a block that fits `layout`.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the request exceeds [`max_bytes`](Allocator::max_bytes) or the allocator
    /// has no memory left that meets it.
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError>;

    /// Frees a block.
    ///
    /// # Safety
    ///
    /// - `ptr` must have been returned by [`allocate`](Allocator::allocate) on this allocator.
    /// - `layout` must be the layout it was allocated with.
    /// - The block must not have been freed already.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout);

    /// Returns the size (in bytes) of the largest block this allocator can ever return.
    fn max_bytes(&self) -> usize {
        isize::MAX as usize
    }
}

unsafe impl<A: Allocator + ?Sized> Allocator for &A {
    #[inline]
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        (**self).allocate(layout)
    }

    #[inline]
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        (**self).deallocate(ptr, layout)
    }

    #[inline]
    fn max_bytes(&self) -> usize {
        (**self).max_bytes()
    }
}

/// The process heap.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Global;

unsafe impl Allocator for Global {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        if layout.size() == 0 {
            // well-aligned and never dereferenced
            return NonNull::new(layout.align() as *mut u8).ok_or(AllocError::CapacityOverflow);
        }

        // SAFETY: layout has a non-zero size
        let ptr = unsafe { alloc::alloc(layout) };
        NonNull::new(ptr).ok_or(AllocError::OutOfMemory {
            requested: layout.size(),
        })
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        if layout.size() != 0 {
            alloc::dealloc(ptr.as_ptr(), layout);
        }
    }
}
