//! ndarray integration for mdastream arrays
//!
//! An [`Array`] of shape `[s0, s1, .., sN-1]` with `c` channels maps to an
//! ndarray of shape `[sN-1, .., s1, s0, c]`: ndarray's standard layout is
//! last-axis-fastest, so reversing the axes and appending the channel axis
//! gives the same element order as the interleaved sample buffer.
//!
//! Enable with the `ndarray` feature flag.

use crate::error::MdaError;
use crate::types::{Array, Coords, DType, Element, convert};
use ndarray::{ArrayBase, ArrayD, Data, IxDyn};
use thiserror::Error;

/// Error type for ndarray conversions
#[derive(Debug, Error)]
pub enum NdarrayError {
    /// Requested element type differs from the stored one
    #[error("dtype mismatch: expected {expected}, got {actual}")]
    DTypeMismatch { expected: DType, actual: DType },

    /// The ndarray has no room for a channel axis and at least one spatial axis
    #[error("ndarray shape {shape:?} needs at least one axis plus a channel axis")]
    ShapeMismatch { shape: Vec<usize> },

    #[error(transparent)]
    Mda(#[from] MdaError),
}

fn ndarray_shape(shape: &Coords, channels: usize) -> Vec<usize> {
    shape
        .iter()
        .rev()
        .copied()
        .chain(std::iter::once(channels))
        .collect()
}

// =============================================================================
// From ndarray to mdastream
// =============================================================================

impl Array {
    /// Copy an ndarray whose last axis holds the channels
    ///
    /// Any memory layout is accepted; elements are read in logical order.
    pub fn from_ndarray<T, S>(arr: &ArrayBase<S, IxDyn>) -> Result<Self, NdarrayError>
    where
        T: Element,
        S: Data<Elem = T>,
    {
        let nd_shape = arr.shape();
        let Some((&channels, spatial)) = nd_shape.split_last() else {
            return Err(NdarrayError::ShapeMismatch {
                shape: nd_shape.to_vec(),
            });
        };
        if spatial.is_empty() {
            return Err(NdarrayError::ShapeMismatch {
                shape: nd_shape.to_vec(),
            });
        }
        let shape: Vec<usize> = spatial.iter().rev().copied().collect();
        let values: Vec<T> = arr.iter().copied().collect();
        Ok(Array::from_values(shape, channels, &values)?)
    }
}

// =============================================================================
// From mdastream to ndarray (owned)
// =============================================================================

impl Array {
    /// Convert to an ndarray of shape `[sN-1, .., s0, channels]`
    pub fn to_ndarray<T: Element>(&self) -> Result<ArrayD<T>, NdarrayError> {
        if T::DTYPE != self.dtype() {
            return Err(NdarrayError::DTypeMismatch {
                expected: T::DTYPE,
                actual: self.dtype(),
            });
        }
        let shape = ndarray_shape(self.shape(), self.channels());
        let elements: Vec<T> = convert::from_bytes(&self.memory().borrow());
        ArrayD::from_shape_vec(IxDyn(&shape), elements)
            .map_err(|_| NdarrayError::ShapeMismatch { shape })
    }

    /// One channel as an ndarray of shape `[sN-1, .., s0]`, converted to `T`
    pub fn channel_to_ndarray<T: Element>(&self, channel: usize) -> Result<ArrayD<T>, NdarrayError> {
        let mut shape = ndarray_shape(self.shape(), self.channels());
        shape.pop();
        let mut elements = Vec::with_capacity(self.num_samples());
        for index in 0..self.num_scanlines() {
            elements.extend(self.channel_line::<T>(index, channel)?);
        }
        ArrayD::from_shape_vec(IxDyn(&shape), elements)
            .map_err(|_| NdarrayError::ShapeMismatch { shape })
    }
}
