use std::{error::Error, fmt};

/// An error with acquiring memory for a block of elements.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AllocError {
    /// The requested number of bytes overflowed `isize::MAX` or `usize`.
    CapacityOverflow,
    /// The request exceeds what the allocator can ever hand out.
    RequestTooLarge {
        /// Number of slots (or bytes, for raw allocator calls) requested.
        requested: usize,
        /// The allocator's ceiling, in the same unit.
        max: usize,
    },
    /// The allocator has no memory left that meets the request.
    OutOfMemory {
        /// Number of bytes requested.
        requested: usize,
    },
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CapacityOverflow => write!(f, "capacity overflow"),
            Self::RequestTooLarge { requested, max } => {
                write!(f, "request too large: {requested} requested, at most {max}")
            }
            Self::OutOfMemory { requested } => {
                write!(f, "out of memory: failed to allocate {requested} bytes")
            }
        }
    }
}

impl Error for AllocError {}

/// An error where an index is not less than the length of the array.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OutOfRange {
    pub index: usize,
    pub len: usize,
}

impl fmt::Display for OutOfRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "index out of range: the len is {} but the index is {}",
            self.len, self.index
        )
    }
}

impl Error for OutOfRange {}
