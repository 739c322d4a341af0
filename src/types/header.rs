//! Stream header constants and structure

use super::{Coords, DType};
use crate::error::{MdaError, Result};

/// Magic bytes identifying an MDA stream
pub const MAGIC: &[u8; 4] = b"MDA\0";

/// Current format version
pub const VERSION: u32 = 1;

/// Header bytes before the extents (magic + version + dimensionality)
pub const HEADER_PREFIX_SIZE: usize = 12;

/// Header bytes after the extents (channel count + dtype tag + byte order)
pub const HEADER_SUFFIX_SIZE: usize = 6;

/// Byte order of the samples in a stream body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ByteOrder {
    Little = 1,
    Big = 2,
}

impl ByteOrder {
    /// Byte order of the running CPU
    pub fn native() -> Self {
        if cfg!(target_endian = "big") {
            ByteOrder::Big
        } else {
            ByteOrder::Little
        }
    }

    pub fn from_u8(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(ByteOrder::Little),
            2 => Some(ByteOrder::Big),
            _ => None,
        }
    }
}

/// Everything a stream declares up front
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamHeader {
    pub shape: Coords,
    pub channels: usize,
    pub dtype: DType,
    pub byte_order: ByteOrder,
}

impl StreamHeader {
    /// Header in native byte order
    pub fn new(shape: impl Into<Coords>, channels: usize, dtype: DType) -> Self {
        Self {
            shape: shape.into(),
            channels,
            dtype,
            byte_order: ByteOrder::native(),
        }
    }

    /// Bytes per scanline: `shape[0] * channels * element_size`
    pub fn scanline_size(&self) -> Result<usize> {
        self.shape
            .as_slice()
            .first()
            .copied()
            .unwrap_or(0)
            .checked_mul(self.channels)
            .and_then(|n| n.checked_mul(self.dtype.element_size()))
            .ok_or(MdaError::Overflow)
    }

    /// Scanlines in the body: product of all extents but the first
    pub fn num_scanlines(&self) -> Result<usize> {
        self.shape.num_scanlines()
    }

    /// Size of the encoded header in bytes
    pub fn encoded_len(&self) -> usize {
        HEADER_PREFIX_SIZE + 8 * self.shape.len() + HEADER_SUFFIX_SIZE
    }

    /// Check the invariants a stream relies on and return
    /// `(scanline_size, num_scanlines)`
    pub(crate) fn validate(&self) -> Result<(usize, usize)> {
        if !self.shape.is_valid_shape() {
            return Err(MdaError::InvalidShape {
                shape: self.shape.as_slice().to_vec(),
            });
        }
        if self.channels == 0 {
            return Err(MdaError::protocol("a stream needs at least one channel"));
        }
        let scanline_size = self.scanline_size()?;
        let num_scanlines = self.num_scanlines()?;
        // the whole body has to be addressable as well
        scanline_size
            .checked_mul(num_scanlines)
            .ok_or(MdaError::Overflow)?;
        Ok((scanline_size, num_scanlines))
    }
}
