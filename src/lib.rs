//! mdastream - Multi-dimensional, multi-channel arrays with a streaming scanline format
//!
//! An engine for the sample arrays (images, volumes, image stacks) that a
//! family of command-line tools passes around through pipes. Each tool reads
//! a header and a sequence of scanlines from its input and writes the same
//! framing to its output, so a chain of tools works as a pipeline without
//! materializing whole datasets.
//!
//! # Features
//!
//! - Typed N-dimensional arrays with interleaved channels over shared buffers
//! - Checked coordinate and stride arithmetic for any dimensionality
//! - Boundary policies (clamp, wrap, mirror, constant) for out-of-range access
//! - Box, ball and star neighborhoods for windowed operations
//! - Padded scanline traversal that keeps range checks out of inner loops
//! - Streaming reader/writer over any `Read`/`Write`, stdin/stdout or files
//! - Range-preserving conversion between the eight sample types
//!
//! # Example
//!
//! ```rust
//! use mdastream::{Array, Coords, DType};
//!
//! // 2x2 single-channel image
//! let image = Array::from_values([2, 2], 1, &[10u8, 20, 30, 40]).unwrap();
//!
//! // Emit it as an MDA stream and read it back
//! let bytes = image.write_stream(Vec::new(), None).unwrap();
//! let back = Array::read_stream(bytes.as_slice()).unwrap();
//!
//! assert_eq!(back.shape(), &Coords::from([2, 2]));
//! assert_eq!(back.dtype(), DType::U8);
//! assert_eq!(back.to_vec::<u8>().unwrap(), vec![10, 20, 30, 40]);
//! ```
//!
//! Scanline-at-a-time processing keeps memory at one scanline per stage:
//!
//! ```rust
//! use mdastream::{Array, DType, MdaReader, MdaWriter};
//!
//! let input = Array::from_values([3, 2], 1, &[1i16, 2, 3, 4, 5, 6])
//!     .unwrap()
//!     .write_stream(Vec::new(), None)
//!     .unwrap();
//!
//! let mut reader = MdaReader::new();
//! reader.connect(input.as_slice());
//! let header = reader.read_header().unwrap().clone();
//!
//! let mut writer = MdaWriter::new();
//! writer.connect(Vec::new());
//! writer.write_header(&header.shape, header.channels, header.dtype).unwrap();
//! while reader.num_scanlines_left() > 0 {
//!     let line = reader.read_scanline().unwrap().to_vec();
//!     writer.write_scanline(&line).unwrap();
//! }
//! assert_eq!(writer.finish().unwrap(), input);
//! ```

pub mod boundary;
pub mod error;
pub mod neighborhood;
pub mod stream;
pub mod traverser;
pub mod types;

#[cfg(feature = "ndarray")]
pub mod ndarray_ext;

// Re-export common types at crate root
pub use boundary::{Boundary, PaddedChannel, Resolved};
pub use error::{MdaError, Result};
pub use neighborhood::{Neighbor, Neighborhood};
pub use stream::{MdaReader, MdaWriter, StreamState, transcode};
pub use traverser::{PaddedChannelTraverser, PaddedScanline};
pub use types::{
    Array, ByteOrder, Coords, CoordsIter, DType, Element, MAGIC, MemoryObject, StreamHeader,
    VERSION, convert_elements,
};

#[cfg(feature = "ndarray")]
pub use ndarray_ext::NdarrayError;
