//! Coordinate vectors and stride arithmetic
//!
//! Axis 0 is the fastest-varying axis: the linear offset of position `p` in
//! an array of shape `s` is `p_0 + s_0 * (p_1 + s_1 * (p_2 + ...))`.

use crate::error::{MdaError, Result};
use std::fmt;
use std::ops::Index;
use std::str::FromStr;

/// An ordered list of unsigned integers, used as a shape or as a position
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Coords(Vec<usize>);

impl Coords {
    pub fn new(values: Vec<usize>) -> Self {
        Self(values)
    }

    /// Vector of `len` entries all equal to `value`
    pub fn filled(len: usize, value: usize) -> Self {
        Self(vec![value; len])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<usize> {
        self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, usize> {
        self.0.iter()
    }

    fn check_len(&self, other: &Coords) -> Result<()> {
        if self.len() != other.len() {
            return Err(MdaError::mismatch(self.len(), other.len()));
        }
        Ok(())
    }

    /// Elementwise sum
    pub fn add(&self, other: &Coords) -> Result<Coords> {
        self.check_len(other)?;
        self.0
            .iter()
            .zip(&other.0)
            .map(|(a, b)| a.checked_add(*b).ok_or(MdaError::Overflow))
            .collect::<Result<Vec<_>>>()
            .map(Coords)
    }

    /// Elementwise difference; a negative entry is out of range
    pub fn sub(&self, other: &Coords) -> Result<Coords> {
        self.check_len(other)?;
        self.0
            .iter()
            .zip(&other.0)
            .map(|(a, b)| {
                a.checked_sub(*b).ok_or(MdaError::OutOfRange {
                    index: *b,
                    extent: *a,
                })
            })
            .collect::<Result<Vec<_>>>()
            .map(Coords)
    }

    /// Multiply every entry by `factor`
    pub fn scale(&self, factor: usize) -> Result<Coords> {
        self.0
            .iter()
            .map(|a| a.checked_mul(factor).ok_or(MdaError::Overflow))
            .collect::<Result<Vec<_>>>()
            .map(Coords)
    }

    /// Product of all entries (number of samples for a shape)
    pub fn num_elements(&self) -> Result<usize> {
        checked_product(&self.0)
    }

    /// Product of all entries but the first (number of scanlines for a shape)
    pub fn num_scanlines(&self) -> Result<usize> {
        checked_product(self.0.get(1..).unwrap_or(&[]))
    }

    /// Element strides for a shape: `stride_0 = 1`, `stride_i = stride_{i-1} * shape_{i-1}`
    pub fn strides(&self) -> Result<Vec<usize>> {
        let mut strides = Vec::with_capacity(self.len());
        let mut stride = 1usize;
        for extent in &self.0 {
            strides.push(stride);
            stride = stride.checked_mul(*extent).ok_or(MdaError::Overflow)?;
        }
        Ok(strides)
    }

    /// Shape grown by `radius` on both sides of every axis
    pub fn padded(&self, radius: usize) -> Result<Coords> {
        let grow = radius.checked_mul(2).ok_or(MdaError::Overflow)?;
        self.0
            .iter()
            .map(|a| a.checked_add(grow).ok_or(MdaError::Overflow))
            .collect::<Result<Vec<_>>>()
            .map(Coords)
    }

    /// True if this is a usable shape: at least one axis, no zero extent
    pub fn is_valid_shape(&self) -> bool {
        !self.0.is_empty() && self.0.iter().all(|&e| e > 0)
    }
}

fn checked_product(values: &[usize]) -> Result<usize> {
    values
        .iter()
        .try_fold(1usize, |acc, v| acc.checked_mul(*v))
        .ok_or(MdaError::Overflow)
}

/// Linear sample offset of `position` in an array of `shape`
pub fn linear_offset(shape: &Coords, position: &Coords) -> Result<usize> {
    shape.check_len(position)?;
    let mut offset = 0usize;
    for (extent, index) in shape.0.iter().zip(&position.0).rev() {
        if index >= extent {
            return Err(MdaError::OutOfRange {
                index: *index,
                extent: *extent,
            });
        }
        offset = offset
            .checked_mul(*extent)
            .and_then(|o| o.checked_add(*index))
            .ok_or(MdaError::Overflow)?;
    }
    Ok(offset)
}

/// Inverse of [`linear_offset`]
pub fn position_of(shape: &Coords, offset: usize) -> Result<Coords> {
    let total = shape.num_elements()?;
    if offset >= total {
        return Err(MdaError::OutOfRange {
            index: offset,
            extent: total,
        });
    }
    let mut rest = offset;
    let position = shape
        .0
        .iter()
        .map(|extent| {
            let p = rest % extent;
            rest /= extent;
            p
        })
        .collect();
    Ok(Coords(position))
}

/// Signed linear offset of a relative displacement in an array of `shape`
pub fn signed_offset(shape: &[usize], displacement: &[isize]) -> Result<isize> {
    displacement
        .iter()
        .zip(shape)
        .rev()
        .try_fold(0isize, |acc, (&d, &extent)| {
            let extent = isize::try_from(extent).map_err(|_| MdaError::Overflow)?;
            acc.checked_mul(extent)
                .and_then(|v| v.checked_add(d))
                .ok_or(MdaError::Overflow)
        })
}

impl Index<usize> for Coords {
    type Output = usize;

    fn index(&self, axis: usize) -> &usize {
        &self.0[axis]
    }
}

impl From<Vec<usize>> for Coords {
    fn from(values: Vec<usize>) -> Self {
        Coords(values)
    }
}

impl From<&[usize]> for Coords {
    fn from(values: &[usize]) -> Self {
        Coords(values.to_vec())
    }
}

impl<const N: usize> From<[usize; N]> for Coords {
    fn from(values: [usize; N]) -> Self {
        Coords(values.to_vec())
    }
}

impl fmt::Display for Coords {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, v) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{v}")?;
        }
        Ok(())
    }
}

/// Parses `a,b,c` (fastest axis first)
impl FromStr for Coords {
    type Err = MdaError;

    fn from_str(s: &str) -> Result<Self> {
        let parse_err = || MdaError::ParseError {
            what: "coordinate vector",
            input: s.to_string(),
        };
        if s.trim().is_empty() {
            return Err(parse_err());
        }
        s.split(',')
            .map(|part| part.trim().parse::<usize>().map_err(|_| parse_err()))
            .collect::<Result<Vec<_>>>()
            .map(Coords)
    }
}

/// Sequential traversal of every position inside a box, axis 0 fastest
///
/// The box is given as inclusive `(first, last)` bounds per axis and may
/// include negative positions, which is how padded regions are walked.
#[derive(Debug, Clone)]
pub struct CoordsIter {
    bounds: Vec<(isize, isize)>,
    pos: Vec<isize>,
    at_end: bool,
}

impl CoordsIter {
    /// Iterate the positions `0..shape_i` of every axis
    pub fn over_shape(shape: &Coords) -> Self {
        let bounds = shape.iter().map(|&e| (0, e as isize - 1)).collect();
        Self::over_box(bounds)
    }

    /// Iterate an inclusive box; an empty range on any axis yields nothing
    pub fn over_box(bounds: Vec<(isize, isize)>) -> Self {
        let at_end = bounds.iter().any(|(first, last)| first > last);
        let pos = bounds.iter().map(|(first, _)| *first).collect();
        Self {
            bounds,
            pos,
            at_end,
        }
    }

    pub fn position(&self) -> &[isize] {
        &self.pos
    }

    pub fn is_at_end(&self) -> bool {
        self.at_end
    }

    /// Advance axis `axis` by one, carrying into slower axes. Axes faster
    /// than `axis` are left untouched, so `incr_comp(1)` steps one scanline.
    pub fn incr_comp(&mut self, axis: usize) {
        if self.at_end {
            return;
        }
        for i in axis..self.pos.len() {
            self.pos[i] += 1;
            if self.pos[i] <= self.bounds[i].1 {
                return;
            }
            self.pos[i] = self.bounds[i].0;
        }
        self.at_end = true;
    }
}

impl Iterator for CoordsIter {
    type Item = Vec<isize>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.at_end {
            return None;
        }
        let current = self.pos.clone();
        self.incr_comp(0);
        Some(current)
    }
}
