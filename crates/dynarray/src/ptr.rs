use core::{fmt, marker::PhantomData, ptr::NonNull};
use std::error::Error;

use num_traits::{NumCast, PrimInt, Unsigned};

/// An error where a pointer cannot be expressed as an offset from a base address.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddressError {
    /// The offset overflowed the range of `isize`, or the pointer lies before the base.
    IsizeOverflow,
    /// The offset does not fit the offset type.
    OutOfRange,
}

impl fmt::Display for AddressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IsizeOverflow => write!(f, "pointer is not reachable from the base address"),
            Self::OutOfRange => write!(f, "offset does not fit the offset type"),
        }
    }
}

impl Error for AddressError {}

fn offset_between(from: usize, to: usize) -> Result<isize, AddressError> {
    let (result, overflow) = to.overflowing_sub(from);
    if (!overflow && result <= (isize::MAX as usize))
        || (overflow && result >= (isize::MIN as usize))
    {
        Ok(result as isize)
    } else {
        Err(AddressError::IsizeOverflow)
    }
}

/// An unsigned integer that can hold an offset into a memory region.
pub trait Address: PrimInt + Unsigned {
    fn from_offset(offset: usize) -> Option<Self> {
        <Self as NumCast>::from(offset)
    }

    fn offset(self) -> usize;
}

macro_rules! impl_address {
    ($ty:ty) => {
        impl Address for $ty {
            fn offset(self) -> usize {
                self as usize
            }
        }
    };
}

impl_address!(usize);
#[cfg(any(target_pointer_width = "32", target_pointer_width = "64"))]
impl_address!(u32);
#[cfg(target_pointer_width = "64")]
impl_address!(u64);

/// A strongly-typed pointer to a memory address, relative to some base address.
#[repr(transparent)]
pub struct RelPtr<T: ?Sized, P: Address> {
    addr: P,
    _marker: PhantomData<*mut T>,
}

impl<T: ?Sized, P: Address> Copy for RelPtr<T, P> {}

impl<T: ?Sized, P: Address> Clone for RelPtr<T, P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ?Sized, P: Address> PartialEq for RelPtr<T, P> {
    fn eq(&self, other: &Self) -> bool {
        self.addr == other.addr
    }
}

impl<T: ?Sized, P: Address> Eq for RelPtr<T, P> {}

impl<T: ?Sized, P: Address + fmt::Debug> fmt::Debug for RelPtr<T, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RelPtr").field(&self.addr).finish()
    }
}

impl<T: ?Sized, P: Address> RelPtr<T, P> {
    /// Returns a pointer `offset` bytes past the base, or `None` if `offset` does not fit `P`.
    pub fn with_offset(offset: usize) -> Option<Self> {
        P::from_offset(offset).map(|addr| Self {
            addr,
            _marker: PhantomData,
        })
    }

    /// Returns the offset of `ptr` from `base`.
    pub fn from_ptr<U: ?Sized>(base: NonNull<u8>, ptr: NonNull<U>) -> Result<Self, AddressError> {
        let offset = offset_between(base.as_ptr() as usize, ptr.cast::<u8>().as_ptr() as usize)?;
        let offset = usize::try_from(offset).map_err(|_| AddressError::IsizeOverflow)?;
        Self::with_offset(offset).ok_or(AddressError::OutOfRange)
    }

    pub fn offset(self) -> usize {
        self.addr.offset()
    }

    pub fn cast<U>(self) -> RelPtr<U, P> {
        RelPtr {
            addr: self.addr,
            _marker: PhantomData,
        }
    }
}

impl<T, P: Address> RelPtr<T, P> {
    /// Returns the absolute pointer this offset names in the region starting at `base`.
    ///
    /// # Safety
    ///
    /// `base` must be the address this pointer was made relative to, and the offset must stay
    /// inside the same allocated region.
    #[inline]
    pub unsafe fn resolve(self, base: NonNull<u8>) -> NonNull<T> {
        NonNull::new_unchecked(base.as_ptr().add(self.offset())).cast()
    }
}
