//! Streaming MDA protocol: one header, then fixed-size scanlines
//!
//! [`MdaReader`] and [`MdaWriter`] are independent state machines bound to
//! one byte stream each. Both advance through [`StreamState`] in lock-step
//! with a remaining-scanline counter, so a chain of tools connected by pipes
//! only ever holds one scanline per stage in memory.
//!
//! The wire layout is documented in [`header`].

pub mod header;
mod reader;
mod writer;

pub use reader::MdaReader;
pub use writer::MdaWriter;

use crate::error::Result;
use crate::types::{DType, convert};
use std::io::{Read, Write};

/// Lifecycle of a reader or writer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// No stream bound yet
    Disconnected,
    /// Bound, header not yet read or written
    HeaderPending,
    /// Header established, scanlines remain
    Streaming,
    /// All scanlines transferred or stream released
    Closed,
}

/// Copy every remaining scanline from `reader` to `writer`, converting the
/// samples to `out_type` if given
///
/// Reads the header first when the reader is still pending and writes a
/// matching header to the writer. Returns the number of scanlines copied.
pub fn transcode<R: Read, W: Write>(
    reader: &mut MdaReader<R>,
    writer: &mut MdaWriter<W>,
    out_type: Option<DType>,
) -> Result<usize> {
    if reader.state() == StreamState::HeaderPending {
        reader.read_header()?;
    }
    let header = reader
        .header()
        .cloned()
        .ok_or_else(|| crate::error::MdaError::protocol("reader has no header"))?;
    let out_type = out_type.unwrap_or(header.dtype);
    writer.write_header(&header.shape, header.channels, out_type)?;

    let count = header.shape[0] * header.channels;
    let mut converted = vec![0u8; writer.scanline_size()];
    let mut copied = 0;
    while reader.num_scanlines_left() > 0 {
        let line = reader.read_scanline()?;
        convert::convert_elements(line, header.dtype, &mut converted, out_type, count)?;
        writer.write_scanline(&converted)?;
        copied += 1;
    }
    log::debug!(
        "transcoded {copied} scanline(s) from {} to {out_type}",
        header.dtype
    );
    Ok(copied)
}
