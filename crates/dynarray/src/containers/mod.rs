mod array;
mod iter;

pub use array::{DynamicArray, RawParts};
pub use iter::IntoIter;
