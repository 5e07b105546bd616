use bytesize::KIB;

/// Page size of the operating system. Arena pages are never smaller.
pub const OS_PAGE_SIZE: usize = 4 * KIB as usize;

/// Configuration for an [`Arena`](crate::arena::Arena).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArenaConfig {
    /// The size of each page in bytes, which is also the largest block the arena can hand out.
    ///
    /// Must be a power of two and at least [`OS_PAGE_SIZE`].
    pub page_size: usize,
    /// The number of pages in the arena's region.
    ///
    /// `page_size * page_count` must fit in a `u32`, since blocks are addressed by 32-bit offsets.
    pub page_count: usize,
}

impl ArenaConfig {
    /// Default page size: 16 KiB.
    pub const DEFAULT_PAGE_SIZE: usize = 16 * KIB as usize;

    /// Default page count: 64, for a 1 MiB region.
    pub const DEFAULT_PAGE_COUNT: usize = 64;

    pub fn new(page_size: usize, page_count: usize) -> Self {
        Self {
            page_size,
            page_count,
        }
    }

    /// Total size of the region in bytes, or `None` if it overflows.
    pub fn region_bytes(&self) -> Option<usize> {
        self.page_size.checked_mul(self.page_count)
    }
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PAGE_SIZE, Self::DEFAULT_PAGE_COUNT)
    }
}
