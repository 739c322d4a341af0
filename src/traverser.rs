//! Scanline traversal with boundary padding along the fastest axis

use crate::boundary::Boundary;
use crate::error::{MdaError, Result};
use crate::types::{Array, CoordsIter, Element};
use std::iter::FusedIterator;
use std::marker::PhantomData;

/// One scanline of a single channel with `radius` padding samples on each side
#[derive(Debug, Clone, PartialEq)]
pub struct PaddedScanline<T> {
    /// Scanline number in stream order
    pub index: usize,
    /// Position on axes `1..N`
    pub outer: Vec<usize>,
    /// `radius + shape[0] + radius` samples
    pub samples: Vec<T>,
    pub radius: usize,
}

impl<T> PaddedScanline<T> {
    /// The samples that belong to the array itself
    pub fn interior(&self) -> &[T] {
        &self.samples[self.radius..self.samples.len() - self.radius]
    }
}

/// Lazily yields padded scanlines of one channel in stream order
///
/// Each scanline is padded along axis 0 with the boundary policy, so a
/// window of up to `2 * radius + 1` samples can be evaluated at every
/// interior sample without range checks. Rows across outer edges are
/// available through [`PaddedChannelTraverser::scanline_at`], which applies
/// the policy once per outer axis.
///
/// Yields exactly `prod(shape[1..])` scanlines, then `None` forever. A new
/// traverser is needed to iterate again.
#[derive(Debug)]
pub struct PaddedChannelTraverser<'a, T> {
    array: &'a Array,
    channel: usize,
    radius: usize,
    boundary: Boundary,
    outer: CoordsIter,
    next_index: usize,
    num_scanlines: usize,
    padded_len: usize,
    _marker: PhantomData<T>,
}

impl<'a, T: Element> PaddedChannelTraverser<'a, T> {
    pub fn new(array: &'a Array, channel: usize, radius: usize, boundary: Boundary) -> Result<Self> {
        if channel >= array.channels() {
            return Err(MdaError::OutOfRange {
                index: channel,
                extent: array.channels(),
            });
        }
        let shape = array.shape();
        let padded_len = radius
            .checked_mul(2)
            .and_then(|p| p.checked_add(shape[0]))
            .ok_or(MdaError::Overflow)?;
        let outer_box = shape
            .iter()
            .skip(1)
            .map(|&n| (0, n as isize - 1))
            .collect();
        Ok(Self {
            array,
            channel,
            radius,
            boundary,
            outer: CoordsIter::over_box(outer_box),
            next_index: 0,
            num_scanlines: array.num_scanlines(),
            padded_len,
            _marker: PhantomData,
        })
    }

    /// Samples per padded scanline
    pub fn padded_len(&self) -> usize {
        self.padded_len
    }

    pub fn radius(&self) -> usize {
        self.radius
    }

    pub fn boundary(&self) -> Boundary {
        self.boundary
    }

    /// Scanlines not yet yielded
    pub fn remaining(&self) -> usize {
        self.num_scanlines - self.next_index
    }

    pub fn next_scanline(&mut self) -> Option<PaddedScanline<T>> {
        self.next()
    }

    /// Padded scanline at a signed outer position, which may lie outside
    /// the array; does not advance the traversal
    pub fn scanline_at(&self, outer: &[isize]) -> Result<Vec<T>> {
        let mut samples = vec![T::default(); self.padded_len];
        self.boundary.fetch_scanline(
            self.array,
            self.channel,
            outer,
            self.radius,
            self.radius,
            &mut samples,
        )?;
        Ok(samples)
    }

    fn read_line(&self, index: usize) -> Vec<T> {
        let n = self.array.shape()[0];
        let channels = self.array.channels();
        let first = index * n * channels + self.channel;
        let mut samples = vec![T::default(); self.padded_len];
        for (x, slot) in samples[self.radius..self.radius + n].iter_mut().enumerate() {
            *slot = self.array.element_as::<T>(first + x * channels);
        }
        self.boundary.pad_in_place(&mut samples, self.radius, n);
        samples
    }
}

impl<T: Element> Iterator for PaddedChannelTraverser<'_, T> {
    type Item = PaddedScanline<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let outer = self.outer.next()?;
        let index = self.next_index;
        self.next_index += 1;
        log::trace!("padded scanline {index} of {}", self.num_scanlines);
        Some(PaddedScanline {
            index,
            outer: outer.into_iter().map(|v| v as usize).collect(),
            samples: self.read_line(index),
            radius: self.radius,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining();
        (remaining, Some(remaining))
    }
}

impl<T: Element> ExactSizeIterator for PaddedChannelTraverser<'_, T> {}

impl<T: Element> FusedIterator for PaddedChannelTraverser<'_, T> {}
