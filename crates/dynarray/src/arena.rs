use core::{alloc::Layout, cell::RefCell, fmt, ptr::NonNull};
use std::{alloc, error::Error};

use bitvec::{bitvec, order::Lsb0, vec::BitVec};
use bytesize::ByteSize;
use log::{debug, error};
use nonmax::NonMaxUsize;

use crate::{
    config::{ArenaConfig, OS_PAGE_SIZE},
    error::AllocError,
    ptr::RelPtr,
    traits::Allocator,
};

// 16 block sizes in each group
// group | step size | min. size
//     0 |       8 B |       0 B
//     1 |       8 B |     128 B  <--  BASE_SIZE
//     2 |      16 B |     256 B
//     3 |      32 B |     512 B
//     4 |      64 B |     1 KiB
//     5 |     128 B |     2 KiB
//     6 |     256 B |     4 KiB
//     7 |     512 B |     8 KiB
//     8 |     1 KiB |    16 KiB
//     9 |     2 KiB |    32 KiB
//    10 |     4 KiB |    64 KiB

const BINS_PER_GROUP: usize = 16;
const BASE_STEP: usize = 8;
const BASE_SIZE: usize = BASE_STEP * BINS_PER_GROUP;

/// Returns the index of the page bin corresponding to the given block size (in bytes).
const fn size_to_bin(mut bytes: usize) -> usize {
    let group = if bytes < BASE_SIZE {
        0
    } else {
        (1 + bytes.ilog2() - BASE_SIZE.ilog2()) as usize
    };
    let step = if group == 0 {
        BASE_STEP
    } else {
        BASE_STEP << (group - 1)
    };
    let min_bytes = if group == 0 { 0 } else { BINS_PER_GROUP * step };

    bytes -= min_bytes;
    (group * BINS_PER_GROUP) + (bytes / step) + (((bytes % step) != 0) as usize)
}

/// Returns the block size (in bytes) corresponding to the given bin index.
const fn bin_to_size(index: usize) -> usize {
    let group = index / BINS_PER_GROUP;
    let step = if group == 0 {
        BASE_STEP
    } else {
        BASE_STEP << (group - 1)
    };
    let min_bytes = if group == 0 { 0 } else { BINS_PER_GROUP * step };

    min_bytes + ((index % BINS_PER_GROUP) * step)
}

/// Returns the number of bytes a block must have to satisfy `layout`.
///
/// Blocks sit at multiples of their size within a page-aligned page, so any power-of-two size is
/// aligned to itself. Other sizes are only guaranteed 8-byte alignment.
fn block_bytes(layout: Layout) -> usize {
    let size = layout.size().max(1);
    if layout.align() <= BASE_STEP {
        size
    } else {
        size.max(layout.align()).next_power_of_two()
    }
}

/// An error with returning a block to an [`Arena`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeallocError {
    /// The pointer does not point into the arena's region.
    PointerOutsideRange,
    /// The pointer does not point to the start of a block.
    PointerNotAligned,
    /// The block is not in use.
    BlockAlreadyFree,
}

impl fmt::Display for DeallocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PointerOutsideRange => write!(f, "pointer is outside the arena"),
            Self::PointerNotAligned => write!(f, "pointer is not at the start of a block"),
            Self::BlockAlreadyFree => write!(f, "block is already free"),
        }
    }
}

impl Error for DeallocError {}

/// A (free) block of memory.
#[repr(C)]
struct FreeBlock {
    // offset of next free block (in the same page)
    next: Option<RelPtr<FreeBlock, u32>>,
}

/// A contiguous memory region containing blocks of a fixed size.
#[derive(Default)]
struct Page {
    // number of blocks that have been allocated
    used: usize,
    // offset of the first free block (in the page)
    free: Option<RelPtr<FreeBlock, u32>>,
    // next page in the same list
    next: Option<NonMaxUsize>,
    // previous page in the same list
    prev: Option<NonMaxUsize>,
    // index of bin corresponding to block size, `None` while the page is unbound
    bin: Option<usize>,
    // 1 bit per block, guards against double-frees
    in_use: BitVec<usize, Lsb0>,
}

/// A collection of pages with the same block size.
struct Bin {
    // number of bytes in each block
    block_size: usize,
    // number of blocks in each page
    block_capacity: usize,
    // next page with free blocks (of size)
    free_page: Option<NonMaxUsize>,
}

struct State {
    bins: Vec<Bin>,
    pages: Vec<Page>,
    // unbound pages
    free_pages: Option<NonMaxUsize>,
}

fn link(index: usize) -> Option<NonMaxUsize> {
    NonMaxUsize::new(index)
}

fn push_page(pages: &mut [Page], list: &mut Option<NonMaxUsize>, index: usize) {
    debug_assert!(pages[index].prev.is_none());
    debug_assert!(pages[index].next.is_none());
    if let Some(head) = *list {
        pages[head.get()].prev = link(index);
        pages[index].next = Some(head);
    }

    *list = link(index);
}

fn remove_page(pages: &mut [Page], list: &mut Option<NonMaxUsize>, index: usize) {
    let prev = pages[index].prev.take();
    let next = pages[index].next.take();

    match prev {
        Some(prev) => pages[prev.get()].next = next,
        None if *list == link(index) => *list = next,
        None => {}
    }

    if let Some(next) = next {
        pages[next.get()].prev = prev;
    }
}

fn pop_page(pages: &mut [Page], list: &mut Option<NonMaxUsize>) -> Option<usize> {
    let index = (*list)?.get();
    remove_page(pages, list, index);
    Some(index)
}

/// A non-global allocator that hands out blocks of fixed sizes from one contiguous memory region.
/// Blocks can be individually freed and reused.
///
/// The region is split into pages. A page is bound to a single block size while any of its blocks
/// are in use, and goes back to the pool of unbound pages once they are all freed. The largest
/// block is one page.
///
/// The arena is single-threaded. Arrays borrow it, so it must outlive them:
///
/// ```
/// use dynarray::{Arena, DynamicArray};
///
/// let arena = Arena::default();
/// let mut arr = DynamicArray::new_in(&arena);
/// arr.push_back(1u32).unwrap();
/// assert_eq!(arena.allocated_blocks(), 1);
/// ```
pub struct Arena {
    heap: NonNull<u8>,
    layout: Layout,
    page_size: usize,
    page_count: usize,
    state: RefCell<State>,
}

impl Arena {
    /// Constructs a new `Arena` with the specified page size and page count.
    ///
    /// # Panics
    ///
    /// See [`with_config`](Arena::with_config).
    pub fn new(page_size: usize, page_count: usize) -> Self {
        Self::with_config(ArenaConfig::new(page_size, page_count))
    }

    /// Constructs a new `Arena` from `config`.
    ///
    /// # Panics
    ///
    /// Panics if
    /// - `page_size` is not a power of 2
    /// - `page_size` is smaller than the operating system page size
    /// - `page_count` is zero
    /// - `page_size` * `page_count` exceeds `u32::MAX` bytes
    pub fn with_config(config: ArenaConfig) -> Self {
        let ArenaConfig {
            page_size,
            page_count,
        } = config;
        assert!(page_size.is_power_of_two(), "page size must be a power of two");
        assert!(page_size >= OS_PAGE_SIZE, "page size must be at least {OS_PAGE_SIZE}");
        assert!(page_count > 0, "arena needs at least one page");

        let region = match config.region_bytes() {
            Some(bytes) if bytes <= u32::MAX as usize => bytes,
            _ => panic!("arena region must be addressable by a 32-bit offset"),
        };
        let layout = match Layout::from_size_align(region, page_size) {
            Ok(layout) => layout,
            Err(err) => panic!("invalid arena layout: {err}"),
        };

        // SAFETY: the region is at least one page
        let heap = NonNull::new(unsafe { alloc::alloc(layout) })
            .unwrap_or_else(|| alloc::handle_alloc_error(layout));

        let bins = (0..=size_to_bin(page_size))
            .map(|index| {
                let block_size = bin_to_size(index);
                Bin {
                    block_size,
                    block_capacity: if block_size == 0 {
                        0
                    } else {
                        page_size / block_size
                    },
                    free_page: None,
                }
            })
            .collect();

        let mut pages: Vec<Page> = (0..page_count).map(|_| Page::default()).collect();
        let mut free_pages = None;
        for index in (0..page_count).rev() {
            push_page(&mut pages, &mut free_pages, index);
        }

        debug!(
            "arena reserved {} ({page_count} pages of {})",
            ByteSize::b(region as u64).to_string_as(true),
            ByteSize::b(page_size as u64).to_string_as(true)
        );

        Self {
            heap,
            layout,
            page_size,
            page_count,
            state: RefCell::new(State {
                bins,
                pages,
                free_pages,
            }),
        }
    }

    #[inline]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    #[inline]
    pub fn page_count(&self) -> usize {
        self.page_count
    }

    /// Returns the number of pages currently bound to a block size.
    pub fn pages_in_use(&self) -> usize {
        self.state
            .borrow()
            .pages
            .iter()
            .filter(|page| page.bin.is_some())
            .count()
    }

    /// Returns the number of blocks currently handed out.
    pub fn allocated_blocks(&self) -> usize {
        self.state.borrow().pages.iter().map(|page| page.used).sum()
    }

    /// Returns `true` if the arena's region contains the pointer address.
    #[inline]
    pub fn contains(&self, ptr: *const u8) -> bool {
        let start = self.heap.as_ptr() as usize;
        (start..start + self.layout.size()).contains(&(ptr as usize))
    }

    /// Allocates a block that meets the size and alignment required by `layout`.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the request is larger than a page, or there is no memory available that
    /// meets it.
    pub fn allocate_block(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        let size = block_bytes(layout);
        if size > self.page_size {
            error!(
                "size requested is larger than the maximum block size: {} > {}",
                ByteSize::b(size as u64).to_string_as(true),
                ByteSize::b(self.page_size as u64).to_string_as(true)
            );
            return Err(AllocError::RequestTooLarge {
                requested: layout.size(),
                max: self.page_size,
            });
        }

        let bin_index = size_to_bin(size);
        let mut state = self.state.borrow_mut();
        let State {
            bins,
            pages,
            free_pages,
        } = &mut *state;
        let bin = &mut bins[bin_index];

        let page_index = match bin.free_page {
            Some(index) => index.get(),
            None => {
                let Some(index) = pop_page(pages, free_pages) else {
                    error!(
                        "arena is out of pages for {} blocks",
                        ByteSize::b(bin.block_size as u64).to_string_as(true)
                    );
                    return Err(AllocError::OutOfMemory {
                        requested: layout.size(),
                    });
                };

                // SAFETY: the page is unbound, so none of its blocks are in use
                unsafe { self.bind_page(&mut pages[index], index, bin_index, bin) };
                push_page(pages, &mut bin.free_page, index);
                debug!(
                    "page {index} bound to {} blocks",
                    ByteSize::b(bin.block_size as u64).to_string_as(true)
                );
                index
            }
        };

        let page = &mut pages[page_index];
        let Some(block) = page.free else {
            error!("page {page_index} is listed as free but has no free blocks");
            return Err(AllocError::OutOfMemory {
                requested: layout.size(),
            });
        };

        // SAFETY: every free block holds a link to the next one
        let FreeBlock { next } = unsafe { block.resolve(self.heap).as_ptr().read() };
        page.free = next;

        let slot = (block.offset() - page_index * self.page_size) / bin.block_size;
        debug_assert!(!page.in_use[slot]);
        page.in_use.set(slot, true);
        page.used += 1;

        if page.used == bin.block_capacity {
            remove_page(pages, &mut bin.free_page, page_index);
        }

        // SAFETY: the block lies inside the region
        Ok(unsafe { block.cast::<u8>().resolve(self.heap) })
    }

    /// Frees a block.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the pointer is invalid or the pointee block was not in use.
    pub fn free_block(&self, ptr: NonNull<u8>) -> Result<(), DeallocError> {
        let block = RelPtr::<FreeBlock, u32>::from_ptr(self.heap, ptr)
            .map_err(|_| DeallocError::PointerOutsideRange)?;
        let offset = block.offset();
        if offset >= self.layout.size() {
            return Err(DeallocError::PointerOutsideRange);
        }

        let mut state = self.state.borrow_mut();
        let State {
            bins,
            pages,
            free_pages,
        } = &mut *state;

        let page_index = offset / self.page_size;
        let page = &mut pages[page_index];
        let Some(bin_index) = page.bin else {
            return Err(DeallocError::BlockAlreadyFree);
        };
        let bin = &mut bins[bin_index];

        let addr_in_page = offset % self.page_size;
        if addr_in_page % bin.block_size != 0 {
            return Err(DeallocError::PointerNotAligned);
        }

        let slot = addr_in_page / bin.block_size;
        if slot >= bin.block_capacity {
            return Err(DeallocError::PointerNotAligned);
        }
        if !page.in_use[slot] {
            return Err(DeallocError::BlockAlreadyFree);
        }

        let was_full = page.used == bin.block_capacity;

        // SAFETY: the block is in use, so its owner is done with it
        unsafe { block.resolve(self.heap).as_ptr().write(FreeBlock { next: page.free }) };
        page.free = Some(block);
        page.in_use.set(slot, false);
        page.used -= 1;
        let now_empty = page.used == 0;

        if was_full {
            push_page(pages, &mut bin.free_page, page_index);
        }

        if now_empty {
            remove_page(pages, &mut bin.free_page, page_index);
            pages[page_index].bin = None;
            push_page(pages, free_pages, page_index);
            debug!("page {page_index} unbound");
        }

        Ok(())
    }

    /// Threads a free list through every block of an unbound page.
    ///
    /// # Safety
    ///
    /// None of the page's blocks may be in use.
    unsafe fn bind_page(&self, page: &mut Page, index: usize, bin_index: usize, bin: &Bin) {
        let start = index * self.page_size;
        for i in 0..bin.block_capacity {
            let offset = start + i * bin.block_size;
            let next = if i + 1 == bin.block_capacity {
                None
            } else {
                RelPtr::with_offset(offset + bin.block_size)
            };
            self.heap
                .as_ptr()
                .add(offset)
                .cast::<FreeBlock>()
                .write(FreeBlock { next });
        }

        page.free = RelPtr::with_offset(start);
        page.bin = Some(bin_index);
        page.used = 0;
        page.in_use = bitvec![usize, Lsb0; 0; bin.block_capacity];
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::with_config(ArenaConfig::default())
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        // SAFETY: allocated in `with_config` with the same layout
        unsafe { alloc::dealloc(self.heap.as_ptr(), self.layout) };
    }
}

impl fmt::Debug for Arena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arena")
            .field("page_size", &self.page_size)
            .field("page_count", &self.page_count)
            .field("pages_in_use", &self.pages_in_use())
            .field("allocated_blocks", &self.allocated_blocks())
            .finish()
    }
}

unsafe impl Allocator for Arena {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        self.allocate_block(layout)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, _layout: Layout) {
        if let Err(err) = self.free_block(ptr) {
            error!("invalid deallocation at {ptr:p}: {err}");
            panic!("invalid arena deallocation: {err}");
        }
    }

    fn max_bytes(&self) -> usize {
        self.page_size
    }
}
