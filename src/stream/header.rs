//! Header encoding and decoding
//!
//! ```text
//! offset      size  field
//! 0           4     magic b"MDA\0"
//! 4           4     version (u32)
//! 8           4     dimensionality N (u32, >= 1)
//! 12          8*N   extents (u64 each, fastest axis first)
//! 12+8N       4     channel count (u32, >= 1)
//! 16+8N       1     dtype tag (0..=7)
//! 17+8N       1     sample byte order (1 = little, 2 = big)
//! ```
//!
//! All header integers are little-endian. The body follows immediately:
//! `prod(shape[1..])` scanlines of `shape[0] * channels * element_size`
//! bytes, samples channel-interleaved, in the declared sample byte order.

use crate::error::{MdaError, Result};
use crate::types::{ByteOrder, Coords, DType, MAGIC, StreamHeader, VERSION};
use std::io::{self, Read};

/// Read exactly `buf.len()` bytes; running out of input is a framing error
pub(crate) fn read_field<R: Read + ?Sized>(
    reader: &mut R,
    buf: &mut [u8],
    what: &'static str,
) -> Result<()> {
    reader.read_exact(buf).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            MdaError::malformed(format!("stream ended inside {what}"))
        } else {
            MdaError::Io(e)
        }
    })
}

fn read_u8<R: Read + ?Sized>(reader: &mut R, what: &'static str) -> Result<u8> {
    let mut buf = [0u8; 1];
    read_field(reader, &mut buf, what)?;
    Ok(buf[0])
}

fn read_u32<R: Read + ?Sized>(reader: &mut R, what: &'static str) -> Result<u32> {
    let mut buf = [0u8; 4];
    read_field(reader, &mut buf, what)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64<R: Read + ?Sized>(reader: &mut R, what: &'static str) -> Result<u64> {
    let mut buf = [0u8; 8];
    read_field(reader, &mut buf, what)?;
    Ok(u64::from_le_bytes(buf))
}

/// Parse a header from the start of `reader`
pub(crate) fn read_header<R: Read + ?Sized>(reader: &mut R) -> Result<StreamHeader> {
    let mut magic = [0u8; 4];
    read_field(reader, &mut magic, "magic bytes")?;
    if &magic != MAGIC {
        return Err(MdaError::malformed("invalid magic bytes, not an MDA stream"));
    }

    let version = read_u32(reader, "version")?;
    if version != VERSION {
        return Err(MdaError::malformed(format!(
            "unsupported version {version}, expected {VERSION}"
        )));
    }

    let ndim = read_u32(reader, "dimensionality")? as usize;
    if ndim == 0 {
        return Err(MdaError::malformed("zero dimensionality"));
    }

    // extents are read one by one so a corrupt count cannot force a huge allocation
    let mut shape = Vec::with_capacity(ndim.min(16));
    for _ in 0..ndim {
        let extent = read_u64(reader, "extents")?;
        let extent = usize::try_from(extent)
            .map_err(|_| MdaError::malformed(format!("extent {extent} not addressable")))?;
        if extent == 0 {
            return Err(MdaError::malformed("zero extent"));
        }
        shape.push(extent);
    }

    let channels = read_u32(reader, "channel count")? as usize;
    if channels == 0 {
        return Err(MdaError::malformed("zero channels"));
    }

    let tag = read_u8(reader, "data type")?;
    let dtype = DType::from_u8(tag)
        .ok_or_else(|| MdaError::malformed(format!("invalid data type tag 0x{tag:02X}")))?;

    let tag = read_u8(reader, "byte order")?;
    let byte_order = ByteOrder::from_u8(tag)
        .ok_or_else(|| MdaError::malformed(format!("invalid byte order tag 0x{tag:02X}")))?;

    let header = StreamHeader {
        shape: Coords::new(shape),
        channels,
        dtype,
        byte_order,
    };
    header
        .validate()
        .map_err(|e| MdaError::malformed(format!("inconsistent declared sizes: {e}")))?;
    Ok(header)
}

/// Serialize a header; the caller validates it first
pub(crate) fn encode_header(header: &StreamHeader) -> Result<Vec<u8>> {
    let ndim = u32::try_from(header.shape.len()).map_err(|_| MdaError::Overflow)?;
    let channels = u32::try_from(header.channels).map_err(|_| MdaError::Overflow)?;

    let mut buf = Vec::with_capacity(header.encoded_len());
    buf.extend_from_slice(MAGIC);
    buf.extend_from_slice(&VERSION.to_le_bytes());
    buf.extend_from_slice(&ndim.to_le_bytes());
    for extent in header.shape.iter() {
        buf.extend_from_slice(&(*extent as u64).to_le_bytes());
    }
    buf.extend_from_slice(&channels.to_le_bytes());
    buf.push(header.dtype as u8);
    buf.push(header.byte_order as u8);
    Ok(buf)
}

/// Reverse the bytes of every element in place
pub(crate) fn swap_byte_order(buf: &mut [u8], element_size: usize) {
    if element_size > 1 {
        for element in buf.chunks_exact_mut(element_size) {
            element.reverse();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn make_header_bytes(ndim: u32, shape: &[u64], channels: u32, dtype: u8, order: u8) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&VERSION.to_le_bytes());
        bytes.extend_from_slice(&ndim.to_le_bytes());
        for extent in shape {
            bytes.extend_from_slice(&extent.to_le_bytes());
        }
        bytes.extend_from_slice(&channels.to_le_bytes());
        bytes.push(dtype);
        bytes.push(order);
        bytes
    }

    #[test]
    fn test_layout() {
        let header = StreamHeader {
            shape: Coords::from([3, 2]),
            channels: 4,
            dtype: DType::F32,
            byte_order: ByteOrder::Big,
        };
        let bytes = encode_header(&header).unwrap();
        assert_eq!(bytes, make_header_bytes(2, &[3, 2], 4, 6, 2));
        assert_eq!(bytes.len(), header.encoded_len());
        assert_eq!(&bytes[0..4], b"MDA\0");
        assert_eq!(u64::from_le_bytes(bytes[12..20].try_into().unwrap()), 3);
    }

    #[test]
    fn test_parse() {
        let bytes = make_header_bytes(3, &[5, 4, 2], 1, 7, 1);
        let header = read_header(&mut Cursor::new(&bytes)).unwrap();
        assert_eq!(header.shape, Coords::from([5, 4, 2]));
        assert_eq!(header.channels, 1);
        assert_eq!(header.dtype, DType::F64);
        assert_eq!(header.byte_order, ByteOrder::Little);
    }

    #[test]
    fn test_invalid_magic() {
        let mut bytes = make_header_bytes(1, &[1], 1, 0, 1);
        bytes[0] = b'X';
        let err = read_header(&mut Cursor::new(&bytes)).unwrap_err();
        assert!(matches!(err, MdaError::MalformedStream(_)));
    }

    #[test]
    fn test_invalid_version() {
        let mut bytes = make_header_bytes(1, &[1], 1, 0, 1);
        bytes[4..8].copy_from_slice(&99u32.to_le_bytes());
        assert!(read_header(&mut Cursor::new(&bytes)).is_err());
    }

    #[test]
    fn test_invalid_fields() {
        for bytes in [
            make_header_bytes(0, &[], 1, 0, 1),
            make_header_bytes(2, &[4, 0], 1, 0, 1),
            make_header_bytes(1, &[4], 0, 0, 1),
            make_header_bytes(1, &[4], 1, 0xFF, 1),
            make_header_bytes(1, &[4], 1, 0, 3),
            make_header_bytes(2, &[u64::MAX / 2, u64::MAX / 2], 1, 0, 1),
        ] {
            let err = read_header(&mut Cursor::new(&bytes)).unwrap_err();
            assert!(matches!(err, MdaError::MalformedStream(_)), "{err}");
        }
    }

    #[test]
    fn test_truncated() {
        let bytes = make_header_bytes(2, &[4, 4], 1, 0, 1);
        for len in 0..bytes.len() {
            let err = read_header(&mut Cursor::new(&bytes[..len])).unwrap_err();
            assert!(matches!(err, MdaError::MalformedStream(_)));
        }
    }

    #[test]
    fn test_swap() {
        let mut buf = vec![1u8, 2, 3, 4, 5, 6, 7, 8];
        swap_byte_order(&mut buf, 4);
        assert_eq!(buf, vec![4, 3, 2, 1, 8, 7, 6, 5]);
        swap_byte_order(&mut buf, 1);
        assert_eq!(buf, vec![4, 3, 2, 1, 8, 7, 6, 5]);
    }
}
