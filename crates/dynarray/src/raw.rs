use core::{
    alloc::Layout,
    marker::PhantomData,
    mem::{self, ManuallyDrop},
    ptr::{self, NonNull},
};

use crate::{error::AllocError, traits::Allocator};

/// An owned, uninitialized block of `cap` slots for values of type `T`.
///
/// `RawBlock` only deals in capacity. It never reads, writes, or drops the values in its slots;
/// whoever owns it must destroy any live values before the block is released or dropped.
///
/// Zero-capacity blocks and blocks of zero-sized types never touch the allocator.
pub(crate) struct RawBlock<T, A: Allocator> {
    ptr: NonNull<T>,
    cap: usize,
    alloc: A,
    _marker: PhantomData<T>,
}

unsafe impl<T: Send, A: Allocator + Send> Send for RawBlock<T, A> {}
unsafe impl<T: Sync, A: Allocator + Sync> Sync for RawBlock<T, A> {}

impl<T, A: Allocator> RawBlock<T, A> {
    const IS_ZST: bool = mem::size_of::<T>() == 0;

    /// Constructs an unallocated block.
    pub(crate) const fn new_in(alloc: A) -> Self {
        Self {
            ptr: NonNull::dangling(),
            cap: 0,
            alloc,
            _marker: PhantomData,
        }
    }

    /// Allocates a block with room for exactly `capacity` values.
    pub(crate) fn with_capacity_in(capacity: usize, alloc: A) -> Result<Self, AllocError> {
        let ptr = allocate_slots::<T, A>(&alloc, capacity)?;
        Ok(Self {
            ptr,
            cap: capacity,
            alloc,
            _marker: PhantomData,
        })
    }

    /// Reassembles a block from its parts.
    ///
    /// # Safety
    ///
    /// `ptr` must have been allocated by `alloc` (or an equivalent allocator) for exactly `cap`
    /// slots of `T`, or be dangling with `cap == 0` or a zero-sized `T`.
    pub(crate) unsafe fn from_raw_parts_in(ptr: NonNull<T>, cap: usize, alloc: A) -> Self {
        Self {
            ptr,
            cap,
            alloc,
            _marker: PhantomData,
        }
    }

    /// Gives up the block without releasing it. The slot count is [`capacity`](Self::capacity).
    pub(crate) fn into_raw_parts(self) -> (NonNull<T>, usize, A) {
        let this = ManuallyDrop::new(self);
        // SAFETY: `this` is never dropped, so the allocator is moved out exactly once
        let alloc = unsafe { ptr::read(&this.alloc) };
        (this.ptr, this.capacity(), alloc)
    }

    #[inline]
    pub(crate) fn ptr(&self) -> *mut T {
        self.ptr.as_ptr()
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        if Self::IS_ZST {
            usize::MAX
        } else {
            self.cap
        }
    }

    #[inline]
    pub(crate) fn allocator(&self) -> &A {
        &self.alloc
    }

    /// Returns the largest number of slots a single block can hold.
    #[inline]
    pub(crate) fn max_slots(&self) -> usize {
        max_slots::<T, A>(&self.alloc)
    }

    /// Allocates a fresh block of `n` slots from this block's allocator.
    ///
    /// The new block is not owned by anything; pair it with [`replace_block`](Self::replace_block)
    /// or [`deallocate_slots`](Self::deallocate_slots).
    pub(crate) fn allocate_slots(&self, n: usize) -> Result<NonNull<T>, AllocError> {
        allocate_slots::<T, A>(&self.alloc, n)
    }

    /// Releases `n` slots at `ptr` back to this block's allocator.
    ///
    /// # Safety
    ///
    /// `ptr` must come from [`allocate_slots`](Self::allocate_slots) with the same `n`, must hold
    /// no live values, and must not be released twice.
    pub(crate) unsafe fn deallocate_slots(&self, ptr: NonNull<T>, n: usize) {
        if n == 0 || Self::IS_ZST {
            return;
        }

        // SAFETY: the layout was computed successfully when the block was allocated
        let layout = Layout::array::<T>(n).unwrap_unchecked();
        self.alloc.deallocate(ptr.cast(), layout);
    }

    /// Points this handle at another block, returning the previous one unreleased.
    ///
    /// # Safety
    ///
    /// Same as [`from_raw_parts_in`](Self::from_raw_parts_in), and the caller takes over
    /// releasing the returned block.
    pub(crate) unsafe fn replace_block(&mut self, ptr: NonNull<T>, cap: usize) -> (NonNull<T>, usize) {
        let old = (self.ptr, self.cap);
        self.ptr = ptr;
        self.cap = cap;
        old
    }

    /// Releases the block and returns to the unallocated state.
    ///
    /// # Safety
    ///
    /// The block must hold no live values.
    pub(crate) unsafe fn release_block(&mut self) {
        let (ptr, cap) = self.replace_block(NonNull::dangling(), 0);
        self.deallocate_slots(ptr, cap);
    }

    /// Returns to the unallocated state without releasing the block. The slot count is
    /// [`capacity`](Self::capacity).
    pub(crate) fn forget_block(&mut self) -> (NonNull<T>, usize) {
        let capacity = self.capacity();
        // SAFETY: a dangling zero-capacity block is always valid
        let (ptr, _) = unsafe { self.replace_block(NonNull::dangling(), 0) };
        (ptr, capacity)
    }
}

impl<T, A: Allocator> Drop for RawBlock<T, A> {
    fn drop(&mut self) {
        // SAFETY: the owner destroyed every live value before letting go of the block
        unsafe { self.deallocate_slots(self.ptr, self.cap) };
    }
}

fn max_slots<T, A: Allocator>(alloc: &A) -> usize {
    match mem::size_of::<T>() {
        0 => usize::MAX,
        size => alloc.max_bytes().min(isize::MAX as usize) / size,
    }
}

fn allocate_slots<T, A: Allocator>(alloc: &A, n: usize) -> Result<NonNull<T>, AllocError> {
    if n == 0 || mem::size_of::<T>() == 0 {
        return Ok(NonNull::dangling());
    }

    let max = max_slots::<T, A>(alloc);
    if n > max {
        return Err(AllocError::RequestTooLarge { requested: n, max });
    }

    let layout = Layout::array::<T>(n).map_err(|_| AllocError::CapacityOverflow)?;
    alloc.allocate(layout).map(NonNull::cast)
}
