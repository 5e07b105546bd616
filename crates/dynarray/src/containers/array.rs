use core::{
    fmt,
    mem::{self, ManuallyDrop},
    ops::{Deref, DerefMut},
    ptr::NonNull,
    slice,
};

use crate::{
    error::{AllocError, OutOfRange},
    growth, lifecycle, realloc,
    raw::RawBlock,
    traits::{Allocator, Global},
};

/// A contiguous growable array, generic over the allocator that backs it.
///
/// The array owns one block of `capacity()` slots. The first `len()` slots hold live values, the
/// rest are uninitialized. A full array grows to `len + len / 2 + 1` slots (see
/// [`growth`](crate::growth)), and never shrinks unless it is cleared.
///
/// Operations that need memory return `Err` instead of aborting when the allocator refuses, and
/// leave the array as it was.
///
/// ```
/// use dynarray::DynamicArray;
///
/// let mut arr = DynamicArray::new();
/// arr.push_back(1).unwrap();
/// arr.push_back(2).unwrap();
/// arr.push_back(3).unwrap();
///
/// assert_eq!(arr.len(), 3);
/// assert_eq!(*arr.front(), 1);
/// assert_eq!(*arr.back(), 3);
/// assert!(arr.at(5).is_err());
/// ```
pub struct DynamicArray<T, A: Allocator = Global> {
    buf: RawBlock<T, A>,
    len: usize,
}

/// A block handed out by [`DynamicArray::release`].
///
/// The first `len` slots hold live values. Whoever holds the parts must either rebuild an array
/// with [`DynamicArray::from_raw_parts_in`] (using the allocator the block came from) or destroy
/// the values and free the block themselves.
///
/// For zero-sized `T`, `capacity` is `usize::MAX` and `ptr` is dangling.
#[derive(Debug, PartialEq, Eq)]
pub struct RawParts<T> {
    pub ptr: NonNull<T>,
    pub len: usize,
    pub capacity: usize,
}

#[cold]
fn alloc_failure(err: AllocError) -> ! {
    panic!("dynamic array allocation failed: {err}")
}

impl<T> DynamicArray<T> {
    /// Constructs an empty array on the heap. Does not allocate.
    pub const fn new() -> Self {
        Self::new_in(Global)
    }

    /// Constructs an array of `n` clones of `value` on the heap.
    pub fn from_elem(n: usize, value: T) -> Result<Self, AllocError>
    where
        T: Clone,
    {
        Self::from_elem_in(n, value, Global)
    }

    /// Constructs an empty array on the heap with room for exactly `capacity` values.
    pub fn with_capacity(capacity: usize) -> Result<Self, AllocError> {
        Self::with_capacity_in(capacity, Global)
    }
}

impl<T, A: Allocator> DynamicArray<T, A> {
    /// Constructs an empty array backed by `alloc`. Does not allocate.
    pub const fn new_in(alloc: A) -> Self {
        Self {
            buf: RawBlock::new_in(alloc),
            len: 0,
        }
    }

    /// Constructs an empty array backed by `alloc` with room for exactly `capacity` values.
    pub fn with_capacity_in(capacity: usize, alloc: A) -> Result<Self, AllocError> {
        Ok(Self {
            buf: RawBlock::with_capacity_in(capacity, alloc)?,
            len: 0,
        })
    }

    /// Constructs an array of `n` clones of `value`, backed by `alloc`.
    ///
    /// The block holds exactly `n` slots. If a clone panics, the clones made so far are dropped
    /// and the block is released before the panic continues.
    pub fn from_elem_in(n: usize, value: T, alloc: A) -> Result<Self, AllocError>
    where
        T: Clone,
    {
        let buf = RawBlock::with_capacity_in(n, alloc)?;
        // SAFETY: the block has `n` uninitialized slots
        unsafe { lifecycle::construct_n(buf.ptr(), 0, n, |_| value.clone()) };
        Ok(Self { buf, len: n })
    }

    /// Rebuilds an array from a block given up by [`release`](Self::release).
    ///
    /// # Safety
    ///
    /// `parts` must come from `release` (or [`into_raw_parts`](Self::into_raw_parts)) on an array
    /// whose allocator is `alloc` or can free its blocks, and the first `parts.len` slots must
    /// still hold live values.
    pub unsafe fn from_raw_parts_in(parts: RawParts<T>, alloc: A) -> Self {
        Self {
            buf: RawBlock::from_raw_parts_in(parts.ptr, parts.capacity, alloc),
            len: parts.len,
        }
    }

    /// Returns the allocator backing the array.
    #[inline]
    pub fn allocator(&self) -> &A {
        self.buf.allocator()
    }

    /// Returns the number of live values.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns the number of slots in the block.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }

    /// Returns `true` if the array holds no values.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the largest number of values the allocator could ever hand out room for.
    #[inline]
    pub fn max_size(&self) -> usize {
        self.buf.max_slots()
    }

    /// Returns a pointer to the first slot. Dangling while nothing is allocated.
    #[inline]
    pub fn as_ptr(&self) -> *const T {
        self.buf.ptr()
    }

    /// Returns a mutable pointer to the first slot. Dangling while nothing is allocated.
    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut T {
        self.buf.ptr()
    }

    /// Returns the live values as a slice.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        // SAFETY: the first `len` slots are live
        unsafe { slice::from_raw_parts(self.buf.ptr(), self.len) }
    }

    /// Returns the live values as a mutable slice.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        // SAFETY: the first `len` slots are live
        unsafe { slice::from_raw_parts_mut(self.buf.ptr(), self.len) }
    }

    /// Returns the value at `index`.
    ///
    /// # Errors
    ///
    /// Returns `Err` if `index >= self.len()`.
    pub fn at(&self, index: usize) -> Result<&T, OutOfRange> {
        if index >= self.len {
            return Err(OutOfRange {
                index,
                len: self.len,
            });
        }

        // SAFETY: bounds checked above
        Ok(unsafe { self.get_unchecked(index) })
    }

    /// Returns the value at `index` mutably.
    ///
    /// # Errors
    ///
    /// Returns `Err` if `index >= self.len()`.
    pub fn at_mut(&mut self, index: usize) -> Result<&mut T, OutOfRange> {
        if index >= self.len {
            return Err(OutOfRange {
                index,
                len: self.len,
            });
        }

        // SAFETY: bounds checked above
        Ok(unsafe { self.get_unchecked_mut(index) })
    }

    /// Returns the value at `index` without bounds checking.
    ///
    /// # Safety
    ///
    /// `index` must be less than `self.len()`.
    #[inline]
    pub unsafe fn get_unchecked(&self, index: usize) -> &T {
        debug_assert!(index < self.len);
        &*self.buf.ptr().add(index)
    }

    /// Returns the value at `index` mutably without bounds checking.
    ///
    /// # Safety
    ///
    /// `index` must be less than `self.len()`.
    #[inline]
    pub unsafe fn get_unchecked_mut(&mut self, index: usize) -> &mut T {
        debug_assert!(index < self.len);
        &mut *self.buf.ptr().add(index)
    }

    /// Returns the first value.
    ///
    /// # Panics
    ///
    /// Panics if the array is empty.
    pub fn front(&self) -> &T {
        match self.as_slice() {
            [first, ..] => first,
            [] => panic!("front() called on an empty array"),
        }
    }

    /// # Panics
    ///
    /// Panics if the array is empty.
    pub fn front_mut(&mut self) -> &mut T {
        match self.as_mut_slice() {
            [first, ..] => first,
            [] => panic!("front_mut() called on an empty array"),
        }
    }

    /// Returns the last value.
    ///
    /// # Panics
    ///
    /// Panics if the array is empty.
    pub fn back(&self) -> &T {
        match self.as_slice() {
            [.., last] => last,
            [] => panic!("back() called on an empty array"),
        }
    }

    /// # Panics
    ///
    /// Panics if the array is empty.
    pub fn back_mut(&mut self) -> &mut T {
        match self.as_mut_slice() {
            [.., last] => last,
            [] => panic!("back_mut() called on an empty array"),
        }
    }

    /// Appends `value`, growing the block if it is full.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the block is full and a larger one cannot be allocated. The array is left
    /// unchanged and `value` is dropped.
    pub fn push_back(&mut self, value: T) -> Result<(), AllocError> {
        if self.len == self.buf.capacity() {
            let target = growth::next_capacity(self.len)?;
            // SAFETY: the first `len` slots are live and `len < target`
            unsafe { realloc::reallocate_to(&mut self.buf, self.len, target)? };
        }

        // SAFETY: `len < capacity`, so the slot is allocated and uninitialized
        unsafe { lifecycle::construct(self.buf.ptr().add(self.len), value) };
        self.len += 1;
        Ok(())
    }

    /// Drops the last value in place.
    ///
    /// # Panics
    ///
    /// Panics if the array is empty.
    pub fn pop_back(&mut self) {
        assert!(!self.is_empty(), "pop_back() called on an empty array");
        self.len -= 1;
        // SAFETY: the slot was live and is now past the end
        unsafe { lifecycle::destroy(self.buf.ptr().add(self.len)) };
    }

    /// Removes the last value and returns it, or `None` if the array is empty.
    pub fn pop(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }

        self.len -= 1;
        // SAFETY: the slot was live and is now past the end
        Some(unsafe { self.buf.ptr().add(self.len).read() })
    }

    /// Grows the block to exactly `capacity` slots if it is smaller. Otherwise does nothing.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the larger block cannot be allocated. The array is left unchanged.
    pub fn reserve(&mut self, capacity: usize) -> Result<(), AllocError> {
        if capacity > self.buf.capacity() {
            // SAFETY: the first `len` slots are live and `len <= capacity`
            unsafe { realloc::reallocate_to(&mut self.buf, self.len, capacity)? };
        }

        Ok(())
    }

    /// Resizes the array to `new_len` values, filling new slots with clones of `value`.
    ///
    /// Shrinking drops the trailing values back to front and keeps the capacity. Growing past the
    /// capacity reallocates to exactly `new_len` slots.
    ///
    /// # Errors
    ///
    /// Returns `Err` if a larger block cannot be allocated. The array is left unchanged.
    pub fn resize(&mut self, new_len: usize, value: T) -> Result<(), AllocError>
    where
        T: Clone,
    {
        self.resize_with(new_len, || value.clone())
    }

    /// Resizes the array to `new_len` values, filling new slots with `T::default()`.
    ///
    /// # Errors
    ///
    /// Returns `Err` if a larger block cannot be allocated. The array is left unchanged.
    pub fn resize_default(&mut self, new_len: usize) -> Result<(), AllocError>
    where
        T: Default,
    {
        self.resize_with(new_len, T::default)
    }

    /// Resizes the array to `new_len` values, filling new slots with values returned by `f`.
    ///
    /// Growing past the capacity fills the new block before moving any value into it. If `f`
    /// panics, the values it already produced are dropped and the array is left unchanged.
    ///
    /// # Errors
    ///
    /// Returns `Err` if a larger block cannot be allocated. The array is left unchanged.
    pub fn resize_with<F>(&mut self, new_len: usize, mut f: F) -> Result<(), AllocError>
    where
        F: FnMut() -> T,
    {
        if new_len > self.buf.capacity() {
            // SAFETY: the first `len` slots are live and `len < new_len`
            unsafe { realloc::reallocate_and_fill(&mut self.buf, self.len, new_len, |_| f())? };
            self.len = new_len;
        } else if new_len > self.len {
            // SAFETY: `[len, new_len)` is allocated and uninitialized
            unsafe { lifecycle::construct_n(self.buf.ptr(), self.len, new_len - self.len, |_| f()) };
            self.len = new_len;
        } else {
            self.truncate(new_len);
        }

        Ok(())
    }

    /// Drops every value at or past `len`, back to front. Keeps the capacity.
    pub fn truncate(&mut self, len: usize) {
        if len >= self.len {
            return;
        }

        let old_len = mem::replace(&mut self.len, len);
        // SAFETY: `[len, old_len)` was live and is now past the end
        unsafe { lifecycle::destroy_range(self.buf.ptr(), len..old_len) };
    }

    /// Drops every value back to front, then releases the block.
    pub fn clear(&mut self) {
        self.truncate(0);
        // SAFETY: no live values remain
        unsafe { self.buf.release_block() };
    }

    /// Gives up the block and its live values, leaving the array empty and unallocated.
    ///
    /// Nothing is dropped or freed. See [`RawParts`].
    #[must_use = "the released block leaks unless it is rebuilt or freed"]
    pub fn release(&mut self) -> RawParts<T> {
        let len = mem::replace(&mut self.len, 0);
        let (ptr, capacity) = self.buf.forget_block();
        RawParts { ptr, len, capacity }
    }

    /// Decomposes the array into its block and allocator without dropping anything.
    #[must_use = "the released block leaks unless it is rebuilt or freed"]
    pub fn into_raw_parts(self) -> (RawParts<T>, A) {
        let this = ManuallyDrop::new(self);
        // SAFETY: `this` is never dropped, so the block is moved out exactly once
        let buf = unsafe { core::ptr::read(&this.buf) };
        let len = this.len;
        let (ptr, capacity, alloc) = buf.into_raw_parts();
        (RawParts { ptr, len, capacity }, alloc)
    }

    /// Moves the values out, leaving this array empty and unallocated.
    pub fn take(&mut self) -> Self
    where
        A: Clone,
    {
        let empty = Self::new_in(self.allocator().clone());
        mem::replace(self, empty)
    }

    /// Deep-copies the array into a block of exactly `len()` slots from `alloc`.
    pub fn try_clone_in<B: Allocator>(&self, alloc: B) -> Result<DynamicArray<T, B>, AllocError>
    where
        T: Clone,
    {
        let buf = RawBlock::with_capacity_in(self.len, alloc)?;
        let src = self.as_slice();
        // SAFETY: the block has `len` uninitialized slots
        unsafe { lifecycle::construct_n(buf.ptr(), 0, src.len(), |i| src[i].clone()) };
        Ok(DynamicArray { buf, len: src.len() })
    }

    /// Deep-copies the array into a block of exactly `len()` slots from the same allocator.
    pub fn try_clone(&self) -> Result<Self, AllocError>
    where
        T: Clone,
        A: Clone,
    {
        self.try_clone_in(self.allocator().clone())
    }

    /// Replaces the contents with a deep copy of `other`.
    ///
    /// The copy is built in full before the previous block is dropped.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the copy cannot be allocated. The array is left unchanged.
    pub fn assign_from(&mut self, other: &Self) -> Result<(), AllocError>
    where
        T: Clone,
        A: Clone,
    {
        let copy = other.try_clone_in(self.allocator().clone())?;
        *self = copy;
        Ok(())
    }
}

impl<T, A: Allocator> Drop for DynamicArray<T, A> {
    fn drop(&mut self) {
        // SAFETY: the first `len` slots are live; the block is released by `RawBlock`
        unsafe { lifecycle::destroy_range(self.buf.ptr(), 0..self.len) };
    }
}

impl<T> Default for DynamicArray<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone, A: Allocator + Clone> Clone for DynamicArray<T, A> {
    fn clone(&self) -> Self {
        self.try_clone().unwrap_or_else(|err| alloc_failure(err))
    }

    fn clone_from(&mut self, source: &Self) {
        self.assign_from(source).unwrap_or_else(|err| alloc_failure(err));
    }
}

impl<T, A: Allocator> Deref for DynamicArray<T, A> {
    type Target = [T];

    #[inline]
    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T, A: Allocator> DerefMut for DynamicArray<T, A> {
    #[inline]
    fn deref_mut(&mut self) -> &mut [T] {
        self.as_mut_slice()
    }
}

impl<T, A: Allocator> AsRef<[T]> for DynamicArray<T, A> {
    fn as_ref(&self) -> &[T] {
        self
    }
}

impl<T, A: Allocator> AsMut<[T]> for DynamicArray<T, A> {
    fn as_mut(&mut self) -> &mut [T] {
        self
    }
}

impl<T: fmt::Debug, A: Allocator> fmt::Debug for DynamicArray<T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_slice(), f)
    }
}

impl<T, U, A, B> PartialEq<DynamicArray<U, B>> for DynamicArray<T, A>
where
    T: PartialEq<U>,
    A: Allocator,
    B: Allocator,
{
    fn eq(&self, other: &DynamicArray<U, B>) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl<T: Eq, A: Allocator> Eq for DynamicArray<T, A> {}

impl<T, U, A: Allocator, const N: usize> PartialEq<[U; N]> for DynamicArray<T, A>
where
    T: PartialEq<U>,
{
    fn eq(&self, other: &[U; N]) -> bool {
        self.as_slice() == other
    }
}

impl<T, U, A: Allocator> PartialEq<[U]> for DynamicArray<T, A>
where
    T: PartialEq<U>,
{
    fn eq(&self, other: &[U]) -> bool {
        self.as_slice() == other
    }
}

impl<T, U, A: Allocator> PartialEq<&[U]> for DynamicArray<T, A>
where
    T: PartialEq<U>,
{
    fn eq(&self, other: &&[U]) -> bool {
        self.as_slice() == *other
    }
}

impl<T, A: Allocator> Extend<T> for DynamicArray<T, A> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.push_back(value).unwrap_or_else(|err| alloc_failure(err));
        }
    }
}

impl<T> FromIterator<T> for DynamicArray<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut arr = Self::new();
        arr.extend(iter);
        arr
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{catch_unwind, AssertUnwindSafe};

    use super::*;
    use crate::testing::{CountingAlloc, DropLog};

    #[test]
    fn push_three_then_query() {
        let mut arr = DynamicArray::new();
        arr.push_back(1).unwrap();
        arr.push_back(2).unwrap();
        arr.push_back(3).unwrap();

        assert_eq!(arr.len(), 3);
        assert!(arr.capacity() >= 3);
        assert_eq!(*arr.front(), 1);
        assert_eq!(*arr.back(), 3);
        assert_eq!(arr.at(5), Err(OutOfRange { index: 5, len: 3 }));
    }

    #[test]
    fn sized_construction_then_resize() {
        let mut arr = DynamicArray::from_elem(3, 7).unwrap();
        assert_eq!(arr, [7, 7, 7]);
        assert_eq!(arr.capacity(), 3);

        arr.resize(5, 9).unwrap();
        assert_eq!(arr, [7, 7, 7, 9, 9]);
        let grown = arr.capacity();
        assert_eq!(grown, 5);

        arr.resize_default(2).unwrap();
        assert_eq!(arr, [7, 7]);
        assert_eq!(arr.capacity(), grown);
    }

    #[test]
    fn at_is_exclusive_of_len() {
        let arr = DynamicArray::from_elem(2, 'x').unwrap();
        assert_eq!(arr.at(1), Ok(&'x'));
        assert_eq!(arr.at(2), Err(OutOfRange { index: 2, len: 2 }));
        assert_eq!(unsafe { arr.get_unchecked(1) }, arr.at(1).unwrap());
    }

    #[test]
    fn at_mut_writes_through() {
        let mut arr = DynamicArray::from_elem(2, 0).unwrap();
        *arr.at_mut(1).unwrap() = 5;
        *arr.front_mut() += 1;
        assert_eq!(arr, [1, 5]);
        assert!(arr.at_mut(2).is_err());
    }

    #[test]
    fn capacity_follows_growth_policy() {
        let mut arr = DynamicArray::new();
        let mut seen = vec![arr.capacity()];
        for i in 0..12 {
            arr.push_back(i).unwrap();
            if *seen.last().unwrap() != arr.capacity() {
                seen.push(arr.capacity());
            }
        }
        assert_eq!(seen, vec![0, 1, 2, 4, 7, 11, 17]);
    }

    #[test]
    fn push_then_pop_restores_len() {
        let mut arr: DynamicArray<i32> = (0..5).collect();
        arr.push_back(99).unwrap();
        arr.pop_back();
        assert_eq!(arr, [0, 1, 2, 3, 4]);
        assert_eq!(arr.pop(), Some(4));
        assert_eq!(arr.len(), 4);
    }

    #[test]
    fn pop_on_empty_is_none() {
        let mut arr = DynamicArray::<u8>::new();
        assert_eq!(arr.pop(), None);
    }

    #[test]
    #[should_panic(expected = "pop_back() called on an empty array")]
    fn pop_back_on_empty_panics() {
        DynamicArray::<u8>::new().pop_back();
    }

    #[test]
    #[should_panic(expected = "back() called on an empty array")]
    fn back_on_empty_panics() {
        DynamicArray::<u8>::new().back();
    }

    #[test]
    fn reserve_is_exact_and_never_shrinks() {
        let mut arr: DynamicArray<u32> = (0..3).collect();
        arr.reserve(10).unwrap();
        assert_eq!(arr.capacity(), 10);
        assert_eq!(arr, [0, 1, 2]);

        arr.reserve(4).unwrap();
        assert_eq!(arr.capacity(), 10);
        assert_eq!(arr.len(), 3);
    }

    #[test]
    fn clear_releases_the_block() {
        let alloc = CountingAlloc::default();
        let mut arr = DynamicArray::from_elem_in(4, 1u64, &alloc).unwrap();
        arr.clear();
        assert!(arr.is_empty());
        assert_eq!(arr.capacity(), 0);
        assert_eq!(alloc.deallocations(), 1);
        assert_eq!(alloc.live_bytes(), 0);

        arr.push_back(2).unwrap();
        assert_eq!(arr, [2]);
    }

    #[test]
    fn drops_back_to_front() {
        let log = DropLog::default();
        let mut arr = DynamicArray::new();
        for id in 0..5 {
            arr.push_back(log.track(id)).unwrap();
        }

        arr.truncate(3);
        assert_eq!(log.dropped(), vec![4, 3]);

        arr.clear();
        assert_eq!(log.dropped(), vec![4, 3, 2, 1, 0]);

        arr.push_back(log.track(7)).unwrap();
        drop(arr);
        assert_eq!(log.live(), 0);
    }

    #[test]
    fn growth_does_not_drop_moved_values() {
        let log = DropLog::default();
        let mut arr = DynamicArray::new();
        for id in 0..20 {
            arr.push_back(log.track(id)).unwrap();
        }
        assert!(log.dropped().is_empty());
        assert_eq!(log.live(), 20);
        assert_eq!(arr.iter().map(|t| t.id).collect::<Vec<_>>(), (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn clone_is_deep_and_sized_to_len() {
        let mut a: DynamicArray<String> = ["a", "b"].into_iter().map(String::from).collect();
        a.reserve(10).unwrap();

        let mut b = a.clone();
        assert_eq!(b, a);
        assert_eq!(b.capacity(), 2);

        b[0].push('!');
        b.push_back("c".to_string()).unwrap();
        assert_eq!(a, ["a", "b"]);
        assert_eq!(b, ["a!", "b", "c"]);
    }

    #[test]
    fn assignment_builds_before_releasing() {
        let alloc = CountingAlloc::default();
        let mut a = DynamicArray::from_elem_in(3, 1u8, &alloc).unwrap();
        let b = DynamicArray::from_elem_in(2, 2u8, &alloc).unwrap();

        for _ in 0..4 {
            a.assign_from(&b).unwrap();
        }
        assert_eq!(a, [2, 2]);
        // a's original block, plus one per assignment, all but the last released
        assert_eq!(alloc.allocations(), 6);
        assert_eq!(alloc.deallocations(), 4);

        let copy = a.clone();
        a.clone_from(&copy);
        assert_eq!(a, [2, 2]);

        drop((a, b, copy));
        assert_eq!(alloc.live_bytes(), 0);
    }

    #[test]
    fn failed_assignment_keeps_previous_contents() {
        let alloc = CountingAlloc::default();
        let mut a = DynamicArray::from_elem_in(3, 1u8, &alloc).unwrap();
        let b = DynamicArray::from_elem_in(2, 2u8, &alloc).unwrap();

        alloc.fail_after(0);
        assert!(a.assign_from(&b).is_err());
        assert_eq!(a, [1, 1, 1]);
    }

    #[test]
    fn take_moves_the_block() {
        let mut a: DynamicArray<i32> = (1..=3).collect();
        let ptr = a.as_ptr();

        let b = a.take();
        assert_eq!(b, [1, 2, 3]);
        assert_eq!(b.as_ptr(), ptr);
        assert_eq!(a.len(), 0);
        assert_eq!(a.capacity(), 0);

        a.push_back(4).unwrap();
        assert_eq!(a, [4]);
    }

    #[test]
    fn move_assignment_drops_previous_values() {
        let log = DropLog::default();
        let mut a = DynamicArray::new();
        a.push_back(log.track(1)).unwrap();
        let mut b = DynamicArray::new();
        b.push_back(log.track(2)).unwrap();

        a = mem::take(&mut b);
        assert_eq!(log.dropped(), vec![1]);
        assert_eq!(a.len(), 1);
        assert!(b.is_empty());
    }

    #[test]
    fn release_hands_over_ownership() {
        let alloc = CountingAlloc::default();
        let log = DropLog::default();
        let mut arr = DynamicArray::new_in(&alloc);
        for id in 0..3 {
            arr.push_back(log.track(id)).unwrap();
        }

        let freed = alloc.deallocations();
        let parts = arr.release();
        assert_eq!(parts.len, 3);
        assert!(arr.is_empty());
        assert_eq!(arr.capacity(), 0);
        drop(arr);
        assert_eq!(log.live(), 3);
        assert_eq!(alloc.deallocations(), freed);

        let arr = unsafe { DynamicArray::from_raw_parts_in(parts, &alloc) };
        assert_eq!(arr.iter().map(|t| t.id).collect::<Vec<_>>(), vec![0, 1, 2]);
        drop(arr);
        assert_eq!(log.live(), 0);
        assert_eq!(alloc.live_bytes(), 0);
    }

    #[test]
    fn into_raw_parts_returns_the_allocator() {
        let alloc = CountingAlloc::default();
        let arr = DynamicArray::from_elem_in(2, 5u32, &alloc).unwrap();
        let (parts, alloc_ref) = arr.into_raw_parts();
        assert_eq!(alloc.deallocations(), 0);

        let arr = unsafe { DynamicArray::from_raw_parts_in(parts, alloc_ref) };
        assert_eq!(arr, [5, 5]);
    }

    #[test]
    fn failed_push_leaves_array_unchanged() {
        let alloc = CountingAlloc::default();
        let mut arr = DynamicArray::new_in(&alloc);
        arr.push_back(1).unwrap();
        let capacity = arr.capacity();

        alloc.fail_after(0);
        assert!(matches!(
            arr.push_back(2),
            Err(AllocError::OutOfMemory { .. })
        ));
        assert_eq!(arr, [1]);
        assert_eq!(arr.capacity(), capacity);
    }

    #[test]
    fn oversized_requests_fail_without_side_effects() {
        let mut arr: DynamicArray<u64> = (0..4).collect();
        let capacity = arr.capacity();
        let max = arr.max_size();

        assert_eq!(
            arr.reserve(max + 1),
            Err(AllocError::RequestTooLarge {
                requested: max + 1,
                max,
            })
        );
        assert!(arr.resize(usize::MAX, 0).is_err());
        assert_eq!(arr, [0, 1, 2, 3]);
        assert_eq!(arr.capacity(), capacity);
        assert!(DynamicArray::from_elem(usize::MAX, 0u64).is_err());
    }

    #[test]
    fn panicking_clone_releases_the_new_block() {
        let alloc = CountingAlloc::default();
        let log = DropLog::default();
        let mut arr = DynamicArray::new_in(&alloc);
        for id in 0..4 {
            arr.push_back(log.track(id)).unwrap();
        }
        let allocated = alloc.live_bytes();

        log.panic_after_clones(2);
        let result = catch_unwind(AssertUnwindSafe(|| arr.try_clone()));
        assert!(result.is_err());

        assert_eq!(log.dropped(), vec![1, 0]);
        assert_eq!(log.live(), 4);
        assert_eq!(alloc.live_bytes(), allocated);
    }

    #[test]
    fn panicking_fill_keeps_previous_len() {
        let log = DropLog::default();
        let mut arr = DynamicArray::new();
        arr.push_back(log.track(0)).unwrap();
        let capacity = arr.capacity();

        log.panic_after_clones(2);
        let template = log.track(9);
        let result = catch_unwind(AssertUnwindSafe(|| arr.resize(6, template.clone())));
        assert!(result.is_err());

        assert_eq!(arr.len(), 1);
        assert_eq!(arr.capacity(), capacity);
        assert_eq!(arr[0].id, 0);
        drop((arr, template));
        assert_eq!(log.live(), 0);
    }

    #[test]
    fn panicking_fill_past_capacity_keeps_the_block() {
        let alloc = CountingAlloc::default();
        let log = DropLog::default();
        let mut arr = DynamicArray::new_in(&alloc);
        arr.push_back(log.track(0)).unwrap();
        let before = arr.as_ptr();
        let capacity = arr.capacity();

        let template = log.track(9);
        log.panic_after_clones(1);
        let result = catch_unwind(AssertUnwindSafe(|| arr.resize(6, template.clone())));
        assert!(result.is_err());

        assert_eq!(arr.as_ptr(), before);
        assert_eq!(arr.capacity(), capacity);
        assert_eq!(arr.len(), 1);
        assert_eq!(alloc.allocations(), 2);
        assert_eq!(alloc.deallocations(), 1);
        drop((arr, template));
        assert_eq!(log.live(), 0);
        assert_eq!(alloc.live_bytes(), 0);
    }

    #[test]
    fn panicking_fill_within_capacity_keeps_the_block() {
        let log = DropLog::default();
        let mut arr = DynamicArray::new();
        arr.push_back(log.track(0)).unwrap();
        arr.reserve(8).unwrap();
        let before = arr.as_ptr();

        let mut made = 0;
        let result = catch_unwind(AssertUnwindSafe(|| {
            arr.resize_with(5, || {
                made += 1;
                assert!(made < 3, "fill failed");
                log.track(made)
            })
        }));
        assert!(result.is_err());

        assert_eq!(arr.as_ptr(), before);
        assert_eq!(arr.capacity(), 8);
        assert_eq!(arr.len(), 1);
        assert_eq!(log.dropped(), vec![2, 1]);
    }

    #[test]
    fn zero_sized_values() {
        let mut arr = DynamicArray::new();
        for _ in 0..100 {
            arr.push_back(()).unwrap();
        }
        assert_eq!(arr.len(), 100);
        assert_eq!(arr.capacity(), usize::MAX);
        arr.truncate(10);
        assert_eq!(arr.len(), 10);

        let parts = arr.release();
        assert_eq!(parts.len, 10);
        assert_eq!(parts.capacity, usize::MAX);
        let arr = unsafe { DynamicArray::from_raw_parts_in(parts, Global) };
        assert_eq!(arr.len(), 10);
    }

    #[test]
    fn size_never_exceeds_capacity() {
        let mut arr = DynamicArray::new();
        for i in 0..50u16 {
            arr.push_back(i).unwrap();
            assert!(arr.len() <= arr.capacity());
            assert!(arr.capacity() <= arr.max_size());
        }
    }
}
