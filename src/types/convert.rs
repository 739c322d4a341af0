//! Bulk element conversion between data types
//!
//! Bulk conversion maps the full range of one type onto the full range of
//! the other, so an image keeps its brightness when its storage type changes:
//!
//! - same type: byte copy
//! - integer to float: unsigned `v / MAX`, signed `v / 2^(bits-1)`
//! - float to integer: `v * scale + 0.5` truncated and clamped to the target
//!   range, with `scale` the divisor above; NaN maps to 0
//! - integer to integer: signed values are offset by `2^(bits-1)` to an
//!   unsigned code; narrowing keeps the high bits, widening to an unsigned
//!   type replicates the code (`0xAB -> 0xABAB`), widening to a signed type
//!   shifts it up
//! - float to float: plain `as` cast
//!
//! E.g. `U8 255 -> F32 1.0`, `F64 0.5 -> U8 128`, `U16 0xFF80 -> U8 0xFF`,
//! `I8 -128 -> U8 0`, `F64 300.0 -> U8 255`.
//!
//! The dispatch goes through a static table of monomorphized functions, one
//! per (source, destination) pair, indexed by the data type tags.
//!
//! Single-element access ([`read_f64`], [`write_f64`]) is numeric instead:
//! values keep their magnitude and saturate at the type bounds.

use super::{DType, Element};
use crate::error::{MdaError, Result};

type ConvertFn = fn(&[u8], &mut [u8], usize);

/// A sample on its way between two types
#[derive(Debug, Clone, Copy)]
enum Level {
    /// Unsigned code of `bits` width; signed values are offset by half the range
    Code { code: u32, bits: u32, signed: bool },
    Float(f64),
}

/// Change the width of an unsigned code
fn rescale_code(code: u32, from: u32, to: u32, replicate: bool) -> u32 {
    if to <= from {
        code >> (from - to)
    } else if replicate {
        (0..to / from).fold(0, |acc, _| (acc << from) | code)
    } else {
        code << (to - from)
    }
}

trait Sample: Element {
    fn level(self) -> Level;
    fn from_level(level: Level) -> Self;
}

macro_rules! impl_sample_int {
    ($ty:ty, $unsigned:ty, $signed:expr, $scale:expr) => {
        impl Sample for $ty {
            #[inline]
            fn level(self) -> Level {
                const BITS: u32 = <$ty>::BITS;
                let offset: $unsigned = if $signed { 1 << (BITS - 1) } else { 0 };
                Level::Code {
                    code: ((self as $unsigned) ^ offset) as u32,
                    bits: BITS,
                    signed: $signed,
                }
            }

            #[inline]
            fn from_level(level: Level) -> Self {
                const BITS: u32 = <$ty>::BITS;
                match level {
                    Level::Code { code, bits, .. } => {
                        let offset: $unsigned = if $signed { 1 << (BITS - 1) } else { 0 };
                        let code = rescale_code(code, bits, BITS, !$signed) as $unsigned;
                        (code ^ offset) as $ty
                    }
                    // `as` truncates toward zero, saturates and maps NaN to 0
                    Level::Float(v) => (v * $scale + 0.5) as $ty,
                }
            }
        }
    };
}

macro_rules! impl_sample_float {
    ($ty:ty) => {
        impl Sample for $ty {
            #[inline]
            fn level(self) -> Level {
                Level::Float(self as f64)
            }

            #[inline]
            fn from_level(level: Level) -> Self {
                match level {
                    Level::Code {
                        code,
                        bits,
                        signed: false,
                    } => (code as f64 / ((1u64 << bits) - 1) as f64) as $ty,
                    Level::Code {
                        code,
                        bits,
                        signed: true,
                    } => {
                        let half = (1u64 << (bits - 1)) as f64;
                        ((code as f64 - half) / half) as $ty
                    }
                    Level::Float(v) => v as $ty,
                }
            }
        }
    };
}

impl_sample_int!(u8, u8, false, 255.0);
impl_sample_int!(i8, u8, true, 128.0);
impl_sample_int!(u16, u16, false, 65535.0);
impl_sample_int!(i16, u16, true, 32768.0);
impl_sample_int!(u32, u32, false, 4294967295.0);
impl_sample_int!(i32, u32, true, 2147483648.0);
impl_sample_float!(f32);
impl_sample_float!(f64);

fn convert_typed<S: Sample, D: Sample>(src: &[u8], dst: &mut [u8], count: usize) {
    let src_size = std::mem::size_of::<S>();
    let dst_size = std::mem::size_of::<D>();
    for (from, to) in src
        .chunks_exact(src_size)
        .zip(dst.chunks_exact_mut(dst_size))
        .take(count)
    {
        D::from_level(S::read_ne(from).level()).write_ne(to);
    }
}

macro_rules! converter_row {
    ($src:ty) => {
        [
            convert_typed::<$src, u8>,
            convert_typed::<$src, i8>,
            convert_typed::<$src, u16>,
            convert_typed::<$src, i16>,
            convert_typed::<$src, u32>,
            convert_typed::<$src, i32>,
            convert_typed::<$src, f32>,
            convert_typed::<$src, f64>,
        ]
    };
}

/// `CONVERTERS[src as usize][dst as usize]`
static CONVERTERS: [[ConvertFn; DType::COUNT]; DType::COUNT] = [
    converter_row!(u8),
    converter_row!(i8),
    converter_row!(u16),
    converter_row!(i16),
    converter_row!(u32),
    converter_row!(i32),
    converter_row!(f32),
    converter_row!(f64),
];

/// Convert `count` native-order elements from `src` to `dst`
///
/// Fails with [`MdaError::DimensionMismatch`] if either buffer holds fewer
/// than `count` elements of its type.
pub fn convert_elements(
    src: &[u8],
    src_type: DType,
    dst: &mut [u8],
    dst_type: DType,
    count: usize,
) -> Result<()> {
    let src_len = count
        .checked_mul(src_type.element_size())
        .ok_or(MdaError::Overflow)?;
    let dst_len = count
        .checked_mul(dst_type.element_size())
        .ok_or(MdaError::Overflow)?;
    if src.len() < src_len {
        return Err(MdaError::mismatch(src_len, src.len()));
    }
    if dst.len() < dst_len {
        return Err(MdaError::mismatch(dst_len, dst.len()));
    }

    if src_type == dst_type {
        dst[..dst_len].copy_from_slice(&src[..src_len]);
        return Ok(());
    }
    CONVERTERS[src_type as usize][dst_type as usize](&src[..src_len], &mut dst[..dst_len], count);
    Ok(())
}

fn read_typed<T: Element>(bytes: &[u8]) -> f64 {
    T::read_ne(bytes).to_f64()
}

fn write_typed<T: Element>(value: f64, bytes: &mut [u8]) {
    T::from_f64(value).write_ne(bytes)
}

static READERS: [fn(&[u8]) -> f64; DType::COUNT] = [
    read_typed::<u8>,
    read_typed::<i8>,
    read_typed::<u16>,
    read_typed::<i16>,
    read_typed::<u32>,
    read_typed::<i32>,
    read_typed::<f32>,
    read_typed::<f64>,
];

static WRITERS: [fn(f64, &mut [u8]); DType::COUNT] = [
    write_typed::<u8>,
    write_typed::<i8>,
    write_typed::<u16>,
    write_typed::<i16>,
    write_typed::<u32>,
    write_typed::<i32>,
    write_typed::<f32>,
    write_typed::<f64>,
];

/// Read one element of `dtype`; `bytes` must be exactly one element long
pub fn read_f64(bytes: &[u8], dtype: DType) -> f64 {
    READERS[dtype as usize](bytes)
}

/// Write one element of `dtype`, rounding and saturating numerically; `bytes`
/// must be exactly one element long
pub fn write_f64(value: f64, bytes: &mut [u8], dtype: DType) {
    WRITERS[dtype as usize](value, bytes)
}

/// Convert a whole buffer, allocating the destination
pub fn convert_vec(src: &[u8], src_type: DType, dst_type: DType) -> Result<Vec<u8>> {
    let count = src.len() / src_type.element_size();
    let mut dst = vec![0u8; count * dst_type.element_size()];
    convert_elements(src, src_type, &mut dst, dst_type, count)?;
    Ok(dst)
}

/// Encode typed values as native-order bytes
pub fn to_bytes<T: Element>(values: &[T]) -> Vec<u8> {
    let size = std::mem::size_of::<T>();
    let mut bytes = vec![0u8; values.len() * size];
    for (v, chunk) in values.iter().zip(bytes.chunks_exact_mut(size)) {
        v.write_ne(chunk);
    }
    bytes
}

/// Decode native-order bytes into typed values
pub fn from_bytes<T: Element>(bytes: &[u8]) -> Vec<T> {
    bytes
        .chunks_exact(std::mem::size_of::<T>())
        .map(T::read_ne)
        .collect()
}
