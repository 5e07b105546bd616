//! Allocators and element types that record what happens to them.

use std::{
    alloc::Layout,
    cell::{Cell, RefCell},
    ptr::NonNull,
    rc::Rc,
};

use crate::{
    error::AllocError,
    traits::{Allocator, Global},
};

/// Forwards to [`Global`] and counts calls. Can be told to fail after a number of allocations.
#[derive(Default)]
pub(crate) struct CountingAlloc {
    allocations: Cell<usize>,
    deallocations: Cell<usize>,
    live_bytes: Cell<usize>,
    remaining: Cell<Option<usize>>,
}

impl CountingAlloc {
    /// Lets `n` more allocations succeed, then fails every one after.
    pub(crate) fn fail_after(&self, n: usize) {
        self.remaining.set(Some(n));
    }

    pub(crate) fn allocations(&self) -> usize {
        self.allocations.get()
    }

    pub(crate) fn deallocations(&self) -> usize {
        self.deallocations.get()
    }

    pub(crate) fn live_bytes(&self) -> usize {
        self.live_bytes.get()
    }
}

unsafe impl Allocator for CountingAlloc {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        if let Some(remaining) = self.remaining.get() {
            if remaining == 0 {
                return Err(AllocError::OutOfMemory {
                    requested: layout.size(),
                });
            }
            self.remaining.set(Some(remaining - 1));
        }

        let ptr = Global.allocate(layout)?;
        self.allocations.set(self.allocations.get() + 1);
        self.live_bytes.set(self.live_bytes.get() + layout.size());
        Ok(ptr)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        self.deallocations.set(self.deallocations.get() + 1);
        self.live_bytes.set(self.live_bytes.get() - layout.size());
        Global.deallocate(ptr, layout);
    }
}

#[derive(Default)]
struct LogInner {
    dropped: RefCell<Vec<u32>>,
    live: Cell<usize>,
    clones_left: Cell<Option<usize>>,
}

/// Records the ids of dropped [`Tracked`] values, in drop order.
#[derive(Clone, Default)]
pub(crate) struct DropLog(Rc<LogInner>);

impl DropLog {
    pub(crate) fn track(&self, id: u32) -> Tracked {
        self.0.live.set(self.0.live.get() + 1);
        Tracked {
            id,
            log: self.clone(),
        }
    }

    /// Lets `n` more clones succeed, then panics on the next one.
    pub(crate) fn panic_after_clones(&self, n: usize) {
        self.0.clones_left.set(Some(n));
    }

    pub(crate) fn dropped(&self) -> Vec<u32> {
        self.0.dropped.borrow().clone()
    }

    pub(crate) fn live(&self) -> usize {
        self.0.live.get()
    }
}

/// A value that reports its own drop to a [`DropLog`].
pub(crate) struct Tracked {
    pub(crate) id: u32,
    log: DropLog,
}

impl Clone for Tracked {
    fn clone(&self) -> Self {
        if let Some(left) = self.log.0.clones_left.get() {
            if left == 0 {
                panic!("clone budget exhausted");
            }
            self.log.0.clones_left.set(Some(left - 1));
        }
        self.log.track(self.id)
    }
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.log.0.live.set(self.log.0.live.get() - 1);
        self.log.0.dropped.borrow_mut().push(self.id);
    }
}
