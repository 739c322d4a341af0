//! Boundary extrapolation for out-of-range coordinates
//!
//! A [`Boundary`] maps an index on one axis to an index inside `[0, n)` or
//! to the fill value. It is applied to each axis independently.
//!
//! | policy     | `-2` | `-1` | `n` | `n+1` |
//! |------------|------|------|-----|-------|
//! | `Clamp`    | 0    | 0    | n-1 | n-1   |
//! | `Wrap`     | n-2  | n-1  | 0   | 1     |
//! | `Mirror`   | 1    | 0    | n-1 | n-2   |
//! | `Constant` | fill | fill | fill| fill  |
//!
//! `Mirror` repeats the edge sample (half-sample symmetric, period `2n`):
//! `resolve(-1 - d) == resolve(d)` and `resolve(n + d) == resolve(n - 1 - d)`.

use crate::error::{MdaError, Result};
use crate::types::{Array, Coords, Element, linear_offset};
use std::fmt;
use std::str::FromStr;

/// Policy for samples outside an array
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Boundary {
    /// Nearest edge sample
    #[default]
    Clamp,
    /// Periodic tiling
    Wrap,
    /// Reflection with the edge sample repeated
    Mirror,
    /// A fixed value, converted to the element type with saturation
    Constant(f64),
}

/// Outcome of resolving one index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolved {
    Index(usize),
    Fill,
}

impl Boundary {
    /// Map `index` onto an axis of length `extent`
    ///
    /// In-range indices map to themselves under every policy. An axis of
    /// length 0 has nothing to map to and always yields [`Resolved::Fill`].
    pub fn resolve(&self, index: isize, extent: usize) -> Resolved {
        if extent == 0 {
            return Resolved::Fill;
        }
        let n = extent as isize;
        if (0..n).contains(&index) {
            return Resolved::Index(index as usize);
        }
        match self {
            Boundary::Clamp => Resolved::Index(index.clamp(0, n - 1) as usize),
            Boundary::Wrap => Resolved::Index(index.rem_euclid(n) as usize),
            Boundary::Mirror => {
                let m = index.rem_euclid(2 * n);
                Resolved::Index(if m < n { m } else { 2 * n - 1 - m } as usize)
            }
            Boundary::Constant(_) => Resolved::Fill,
        }
    }

    /// Resolve every axis of `position`; `None` means the fill value
    pub fn resolve_position(&self, position: &[isize], shape: &[usize]) -> Option<Vec<usize>> {
        position
            .iter()
            .zip(shape)
            .map(|(&p, &n)| match self.resolve(p, n) {
                Resolved::Index(i) => Some(i),
                Resolved::Fill => None,
            })
            .collect()
    }

    /// Fill value as `T`; zero for policies that never fill
    pub fn fill<T: Element>(&self) -> T {
        match self {
            Boundary::Constant(value) => T::from_f64(*value),
            _ => T::default(),
        }
    }

    /// Copy `src` into the middle of `dst` and pad `left` / `right` samples
    /// on either side
    ///
    /// `dst` must hold exactly `left + src.len() + right` samples. Padding
    /// wider than the line keeps applying the policy (repeated wrap-around
    /// or reflection).
    pub fn fetch_line<T: Element>(
        &self,
        dst: &mut [T],
        src: &[T],
        left: usize,
        right: usize,
    ) -> Result<()> {
        let expected = src.len() + left + right;
        if dst.len() != expected {
            return Err(MdaError::mismatch(expected, dst.len()));
        }
        dst[left..left + src.len()].copy_from_slice(src);
        self.pad_in_place(dst, left, src.len());
        Ok(())
    }

    /// Fill the padding of a line whose `n` interior samples already sit at
    /// `line[left..left + n]`; everything after them is right padding
    pub(crate) fn pad_in_place<T: Element>(&self, line: &mut [T], left: usize, n: usize) {
        let fill = self.fill::<T>();
        let padded = (0..left)
            .map(|i| i as isize - left as isize)
            .chain((n..line.len() - left).map(|i| i as isize));
        let slots = (0..left).chain(left + n..line.len());
        for (index, slot) in padded.zip(slots) {
            line[slot] = match self.resolve(index, n) {
                Resolved::Index(i) => line[left + i],
                Resolved::Fill => fill,
            };
        }
    }

    /// Padded scanline of one channel at a possibly out-of-range outer
    /// position; the outer axes are resolved once for the whole line
    pub(crate) fn fetch_scanline<T: Element>(
        &self,
        array: &Array,
        channel: usize,
        outer: &[isize],
        left: usize,
        right: usize,
        dst: &mut [T],
    ) -> Result<()> {
        let shape = array.shape().as_slice();
        if outer.len() + 1 != shape.len() {
            return Err(MdaError::mismatch(shape.len() - 1, outer.len()));
        }
        match self.resolve_position(outer, &shape[1..]) {
            Some(resolved) => {
                let index = linear_offset(&Coords::from(&shape[1..]), &Coords::new(resolved))?;
                let line = array.channel_line::<T>(index, channel)?;
                self.fetch_line(dst, &line, left, right)
            }
            None => {
                let expected = shape[0] + left + right;
                if dst.len() != expected {
                    return Err(MdaError::mismatch(expected, dst.len()));
                }
                dst.fill(self.fill::<T>());
                Ok(())
            }
        }
    }

    /// Copy one channel of `array` with `radius` samples of padding on both
    /// sides of every axis
    pub fn fetch_channel<T: Element>(
        &self,
        array: &Array,
        channel: usize,
        radius: usize,
    ) -> Result<PaddedChannel<T>> {
        let padding = vec![(radius, radius); array.shape().len()];
        self.fetch_channel_with_padding(array, channel, &padding)
    }

    /// Like [`Boundary::fetch_channel`] with `(before, after)` padding per axis
    pub fn fetch_channel_with_padding<T: Element>(
        &self,
        array: &Array,
        channel: usize,
        padding: &[(usize, usize)],
    ) -> Result<PaddedChannel<T>> {
        let shape = array.shape();
        if padding.len() != shape.len() {
            return Err(MdaError::mismatch(shape.len(), padding.len()));
        }
        if channel >= array.channels() {
            return Err(MdaError::OutOfRange {
                index: channel,
                extent: array.channels(),
            });
        }

        let padded_shape = shape
            .iter()
            .zip(padding)
            .map(|(&n, &(before, after))| {
                n.checked_add(before)
                    .and_then(|n| n.checked_add(after))
                    .ok_or(MdaError::Overflow)
            })
            .collect::<Result<Vec<_>>>()?;
        let padded_shape = Coords::new(padded_shape);
        let total = padded_shape.num_elements()?;
        let line_len = padded_shape[0];

        let mut data = Vec::new();
        data.try_reserve_exact(total)
            .map_err(|_| MdaError::Allocation {
                bytes: total.saturating_mul(std::mem::size_of::<T>()),
            })?;
        data.resize(total, T::default());

        let outer_box = shape
            .iter()
            .zip(padding)
            .skip(1)
            .map(|(&n, &(before, after))| (-(before as isize), (n + after) as isize - 1))
            .collect();
        let (left, right) = padding[0];
        let mut lines = data.chunks_exact_mut(line_len);
        for outer in crate::types::CoordsIter::over_box(outer_box) {
            let Some(dst) = lines.next() else { break };
            self.fetch_scanline(array, channel, &outer, left, right, dst)?;
        }

        Ok(PaddedChannel {
            shape: padded_shape,
            origin: padding.iter().map(|(before, _)| *before).collect(),
            data,
        })
    }
}

impl fmt::Display for Boundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Boundary::Clamp => f.write_str("clamp"),
            Boundary::Wrap => f.write_str("wrap"),
            Boundary::Mirror => f.write_str("mirror"),
            Boundary::Constant(value) => write!(f, "constant:{value}"),
        }
    }
}

/// Parses `clamp`, `wrap` (or `cyclic`), `mirror` and `constant` (or
/// `background`), the latter optionally with a fill value as in `constant:255`
impl FromStr for Boundary {
    type Err = MdaError;

    fn from_str(s: &str) -> Result<Self> {
        let parse_err = || MdaError::ParseError {
            what: "boundary policy",
            input: s.to_string(),
        };
        let lower = s.trim().to_ascii_lowercase();
        let (name, value) = match lower.split_once(':') {
            Some((name, value)) => (name, Some(value)),
            None => (lower.as_str(), None),
        };
        let boundary = match name {
            "clamp" => Boundary::Clamp,
            "wrap" | "cyclic" => Boundary::Wrap,
            "mirror" => Boundary::Mirror,
            "constant" | "background" => {
                let fill = match value {
                    Some(v) => v.trim().parse::<f64>().map_err(|_| parse_err())?,
                    None => 0.0,
                };
                return Ok(Boundary::Constant(fill));
            }
            _ => return Err(parse_err()),
        };
        if value.is_some() {
            return Err(parse_err());
        }
        Ok(boundary)
    }
}

/// One channel copied out of an array with padding on every axis
///
/// Positions passed to [`PaddedChannel::get`] are in the coordinates of the
/// source array, so the padding is reached with negative indices.
#[derive(Debug, Clone, PartialEq)]
pub struct PaddedChannel<T> {
    shape: Coords,
    origin: Vec<usize>,
    data: Vec<T>,
}

impl<T: Element> PaddedChannel<T> {
    /// Shape including padding
    pub fn shape(&self) -> &Coords {
        &self.shape
    }

    /// Padding before the first sample of each axis
    pub fn origin(&self) -> &[usize] {
        &self.origin
    }

    /// Samples, axis 0 fastest
    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    /// Sample at a source-array position; `None` outside the padded box
    pub fn get(&self, position: &[isize]) -> Option<T> {
        if position.len() != self.shape.len() {
            return None;
        }
        let mut offset = 0usize;
        for ((&p, &before), &extent) in position
            .iter()
            .zip(&self.origin)
            .zip(self.shape.iter())
            .rev()
        {
            let shifted = usize::try_from(p + before as isize).ok()?;
            if shifted >= extent {
                return None;
            }
            offset = offset * extent + shifted;
        }
        self.data.get(offset).copied()
    }
}
