use core::{
    fmt,
    iter::FusedIterator,
    slice::{self, Iter, IterMut},
};

use super::array::DynamicArray;
use crate::{lifecycle, raw::RawBlock, traits::Allocator};

/// An iterator that moves values out of a [`DynamicArray`], front to back.
///
/// Values not yet yielded are dropped back to front when the iterator is dropped, and then the
/// block is released.
pub struct IntoIter<T, A: Allocator> {
    buf: RawBlock<T, A>,
    start: usize,
    end: usize,
}

impl<T, A: Allocator> IntoIter<T, A> {
    /// Returns the values not yet yielded.
    pub fn as_slice(&self) -> &[T] {
        // SAFETY: `[start, end)` is live
        unsafe { slice::from_raw_parts(self.buf.ptr().add(self.start), self.end - self.start) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        // SAFETY: `[start, end)` is live
        unsafe { slice::from_raw_parts_mut(self.buf.ptr().add(self.start), self.end - self.start) }
    }

    pub fn allocator(&self) -> &A {
        self.buf.allocator()
    }
}

impl<T, A: Allocator> Iterator for IntoIter<T, A> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        if self.start == self.end {
            return None;
        }

        let index = self.start;
        self.start += 1;
        // SAFETY: the slot was live and is now outside `[start, end)`
        Some(unsafe { self.buf.ptr().add(index).read() })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.end - self.start;
        (len, Some(len))
    }

    fn count(self) -> usize {
        self.len()
    }
}

impl<T, A: Allocator> DoubleEndedIterator for IntoIter<T, A> {
    fn next_back(&mut self) -> Option<T> {
        if self.start == self.end {
            return None;
        }

        self.end -= 1;
        // SAFETY: the slot was live and is now outside `[start, end)`
        Some(unsafe { self.buf.ptr().add(self.end).read() })
    }
}

impl<T, A: Allocator> ExactSizeIterator for IntoIter<T, A> {}

impl<T, A: Allocator> FusedIterator for IntoIter<T, A> {}

impl<T, A: Allocator> Drop for IntoIter<T, A> {
    fn drop(&mut self) {
        // SAFETY: `[start, end)` is live; the block is released by `RawBlock`
        unsafe { lifecycle::destroy_range(self.buf.ptr(), self.start..self.end) };
    }
}

impl<T: fmt::Debug, A: Allocator> fmt::Debug for IntoIter<T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("IntoIter").field(&self.as_slice()).finish()
    }
}

impl<T, A: Allocator> IntoIterator for DynamicArray<T, A> {
    type Item = T;
    type IntoIter = IntoIter<T, A>;

    fn into_iter(self) -> IntoIter<T, A> {
        let (parts, alloc) = self.into_raw_parts();
        IntoIter {
            // SAFETY: the parts come straight from an array backed by `alloc`
            buf: unsafe { RawBlock::from_raw_parts_in(parts.ptr, parts.capacity, alloc) },
            start: 0,
            end: parts.len,
        }
    }
}

impl<'a, T, A: Allocator> IntoIterator for &'a DynamicArray<T, A> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Iter<'a, T> {
        self.iter()
    }
}

impl<'a, T, A: Allocator> IntoIterator for &'a mut DynamicArray<T, A> {
    type Item = &'a mut T;
    type IntoIter = IterMut<'a, T>;

    fn into_iter(self) -> IterMut<'a, T> {
        self.iter_mut()
    }
}
