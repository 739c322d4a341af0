//! Core types: data types, coordinates, buffers and arrays

mod array;
pub mod convert;
pub mod coords;
mod dtype;
mod header;
mod memory;

pub use array::Array;
pub use convert::convert_elements;
pub use coords::{Coords, CoordsIter, linear_offset, position_of};
pub use dtype::{DType, Element};
pub use header::{
    ByteOrder, HEADER_PREFIX_SIZE, HEADER_SUFFIX_SIZE, MAGIC, StreamHeader, VERSION,
};
pub use memory::MemoryObject;
