//! Element data types

use crate::error::MdaError;
use std::fmt;
use std::str::FromStr;

/// Data type of the scalars stored in an array or stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DType {
    U8 = 0,
    I8 = 1,
    U16 = 2,
    I16 = 3,
    U32 = 4,
    I32 = 5,
    F32 = 6,
    F64 = 7,
}

/// Byte width per type, indexed by the tag
const ELEMENT_SIZES: [usize; DType::COUNT] = [1, 1, 2, 2, 4, 4, 4, 8];

/// Canonical names, indexed by the tag
const NAMES: [&str; DType::COUNT] = [
    "ubyte", "byte", "ushort", "short", "uint", "int", "float", "double",
];

/// Rust primitive names accepted as aliases when parsing
const SHORT_NAMES: [&str; DType::COUNT] = ["u8", "i8", "u16", "i16", "u32", "i32", "f32", "f64"];

impl DType {
    /// Number of supported types
    pub const COUNT: usize = 8;

    /// All types in tag order
    pub const ALL: [DType; DType::COUNT] = [
        DType::U8,
        DType::I8,
        DType::U16,
        DType::I16,
        DType::U32,
        DType::I32,
        DType::F32,
        DType::F64,
    ];

    /// Size in bytes of a single element
    pub fn element_size(self) -> usize {
        ELEMENT_SIZES[self as usize]
    }

    /// Canonical lower-case name, as used by the command-line tools
    pub fn name(self) -> &'static str {
        NAMES[self as usize]
    }

    pub fn is_float(self) -> bool {
        matches!(self, DType::F32 | DType::F64)
    }

    /// Try to convert from the u8 wire tag
    pub fn from_u8(tag: u8) -> Option<Self> {
        DType::ALL.get(tag as usize).copied()
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DType {
    type Err = MdaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        DType::ALL
            .into_iter()
            .find(|d| {
                s.eq_ignore_ascii_case(NAMES[*d as usize])
                    || s.eq_ignore_ascii_case(SHORT_NAMES[*d as usize])
            })
            .ok_or_else(|| MdaError::ParseError {
                what: "data type",
                input: s.to_string(),
            })
    }
}

/// Rust scalar types that can be stored in an array
///
/// Values are kept in native byte order inside array buffers. The `f64`
/// round trip is exact for every supported type, which is what numeric
/// single-element access relies on. Bulk conversion between stored types
/// lives in [`convert`](super::convert) and maps ranges instead.
pub trait Element: Copy + PartialEq + fmt::Debug + Default + 'static {
    const DTYPE: DType;

    /// Read one element from exactly `size_of::<Self>()` native-order bytes
    fn read_ne(bytes: &[u8]) -> Self;

    /// Write one element into exactly `size_of::<Self>()` bytes
    fn write_ne(self, bytes: &mut [u8]);

    fn to_f64(self) -> f64;

    /// Saturating conversion; floats round half away from zero, NaN maps to 0
    fn from_f64(value: f64) -> Self;
}

macro_rules! impl_element_int {
    ($ty:ty, $dtype:ident) => {
        impl Element for $ty {
            const DTYPE: DType = DType::$dtype;

            #[inline]
            fn read_ne(bytes: &[u8]) -> Self {
                let mut raw = [0u8; std::mem::size_of::<$ty>()];
                raw.copy_from_slice(bytes);
                <$ty>::from_ne_bytes(raw)
            }

            #[inline]
            fn write_ne(self, bytes: &mut [u8]) {
                bytes.copy_from_slice(&self.to_ne_bytes());
            }

            #[inline]
            fn to_f64(self) -> f64 {
                self as f64
            }

            #[inline]
            fn from_f64(value: f64) -> Self {
                // `as` saturates at the type bounds and maps NaN to zero
                value.round() as $ty
            }
        }
    };
}

macro_rules! impl_element_float {
    ($ty:ty, $dtype:ident) => {
        impl Element for $ty {
            const DTYPE: DType = DType::$dtype;

            #[inline]
            fn read_ne(bytes: &[u8]) -> Self {
                let mut raw = [0u8; std::mem::size_of::<$ty>()];
                raw.copy_from_slice(bytes);
                <$ty>::from_ne_bytes(raw)
            }

            #[inline]
            fn write_ne(self, bytes: &mut [u8]) {
                bytes.copy_from_slice(&self.to_ne_bytes());
            }

            #[inline]
            fn to_f64(self) -> f64 {
                self as f64
            }

            #[inline]
            fn from_f64(value: f64) -> Self {
                value as $ty
            }
        }
    };
}

impl_element_int!(u8, U8);
impl_element_int!(i8, I8);
impl_element_int!(u16, U16);
impl_element_int!(i16, I16);
impl_element_int!(u32, U32);
impl_element_int!(i32, I32);
impl_element_float!(f32, F32);
impl_element_float!(f64, F64);
