//! Error types for mdastream

use crate::types::DType;
use std::borrow::Cow;
use thiserror::Error;

/// Errors raised by arrays, boundary handling and the MDA stream protocol
#[derive(Debug, Error)]
pub enum MdaError {
    /// A buffer of the requested size could not be allocated
    #[error("cannot allocate {bytes} bytes")]
    Allocation { bytes: usize },

    /// Operands have incompatible lengths or shapes
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Index outside the valid shape or channel range
    #[error("index {index} out of range for extent {extent}")]
    OutOfRange { index: usize, extent: usize },

    /// Shape with no axes or with a zero extent
    #[error("invalid shape {shape:?}")]
    InvalidShape { shape: Vec<usize> },

    /// Typed access with a type that differs from the stored one
    #[error("type mismatch: array holds {actual}, requested {expected}")]
    TypeMismatch { expected: DType, actual: DType },

    /// Index arithmetic overflowed `usize`
    #[error("index arithmetic overflow")]
    Overflow,

    /// Header or scanline framing inconsistent with the declared shape
    #[error("malformed MDA stream: {0}")]
    MalformedStream(Cow<'static, str>),

    /// Read/write outside the streaming state or past the declared scanlines
    #[error("stream protocol violation: {0}")]
    ProtocolViolation(Cow<'static, str>),

    /// A name or coordinate string could not be parsed
    #[error("cannot parse {what} from '{input}'")]
    ParseError { what: &'static str, input: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl MdaError {
    pub(crate) fn malformed(message: impl Into<Cow<'static, str>>) -> Self {
        MdaError::MalformedStream(message.into())
    }

    pub(crate) fn protocol(message: impl Into<Cow<'static, str>>) -> Self {
        MdaError::ProtocolViolation(message.into())
    }

    pub(crate) fn mismatch(expected: usize, actual: usize) -> Self {
        MdaError::DimensionMismatch { expected, actual }
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, MdaError>;
