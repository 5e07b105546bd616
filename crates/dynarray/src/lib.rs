//! A contiguous growable array, generic over the allocator that backs it.
//!
//! ```text
//! DynamicArray<T, A>
//! ├── containers  - the array and its owning iterator
//! ├── growth      - target capacity when a full array grows
//! ├── realloc     - moves live values into a larger block
//! ├── lifecycle   - in-place construction / destruction of values
//! ├── raw         - owned, uninitialized blocks of slots
//! └── traits      - the `Allocator` capability and the `Global` heap
//!
//! Arena           - a size-class allocator over one contiguous region
//! ├── config      - page size and count
//! └── ptr         - 32-bit region-relative offsets
//! ```
//!
//! Every operation that needs memory returns `Result` and leaves the array untouched on failure.
//! Nothing here is synchronized; an array (and an arena) belongs to one thread at a time.

pub mod arena;
pub mod config;
pub mod containers;
pub mod error;
pub mod growth;
mod lifecycle;
pub mod ptr;
mod raw;
mod realloc;
pub mod traits;

#[cfg(test)]
mod testing;

pub use arena::{Arena, DeallocError};
pub use config::ArenaConfig;
pub use containers::{DynamicArray, IntoIter, RawParts};
pub use error::{AllocError, OutOfRange};
pub use traits::{Allocator, Global};
