//! Fixed windows of relative offsets around a sample

use crate::boundary::Boundary;
use crate::error::{MdaError, Result};
use crate::types::coords::signed_offset;
use crate::types::{Array, Coords, CoordsIter, Element, linear_offset};

/// Below this `p` the p-norm degenerates to the minimum component, above
/// its inverse to the maximum
const LP_NORM_THRESHOLD: f64 = 1e-3;

/// Length of `offset` under the p-norm
pub fn p_norm(offset: &[isize], p: f64) -> f64 {
    let abs = offset.iter().map(|v| v.unsigned_abs() as f64);
    if p < LP_NORM_THRESHOLD {
        abs.fold(f64::INFINITY, f64::min)
    } else if p > 1.0 / LP_NORM_THRESHOLD {
        abs.fold(0.0, f64::max)
    } else {
        abs.map(|v| v.powf(p)).sum::<f64>().powf(1.0 / p)
    }
}

/// One entry of a neighborhood
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    /// Displacement from the center, one entry per axis
    pub offset: Vec<isize>,
    /// Distance from the center under the neighborhood's norm
    pub distance: f64,
}

/// Ordered set of offsets sampled around a center position
///
/// Entries are ordered with axis 0 varying fastest, the same order as
/// array storage. The list is fixed at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighborhood {
    neighbors: Vec<Neighbor>,
    dims: usize,
    boundary: Boundary,
}

impl Neighborhood {
    /// Box window of `window_shape`
    ///
    /// Along axis `i` offsets run from `-(w/2)` to `w - 1 - w/2`, so odd
    /// widths are centered and even widths lean towards the negative side.
    /// Distances are Euclidean.
    pub fn new(window_shape: &[usize], boundary: Boundary) -> Result<Self> {
        if window_shape.is_empty() || window_shape.contains(&0) {
            return Err(MdaError::InvalidShape {
                shape: window_shape.to_vec(),
            });
        }
        let bounds = window_shape
            .iter()
            .map(|&w| {
                let w = isize::try_from(w).map_err(|_| MdaError::Overflow)?;
                Ok((-(w / 2), w - 1 - w / 2))
            })
            .collect::<Result<_>>()?;
        Ok(Self::from_box(bounds, 2.0, boundary, |_| true))
    }

    /// Hypercube of side `2 * radius + 1` in `dims` dimensions, Euclidean distances
    pub fn cube(dims: usize, radius: usize, boundary: Boundary) -> Result<Self> {
        let side = radius
            .checked_mul(2)
            .and_then(|d| d.checked_add(1))
            .ok_or(MdaError::Overflow)?;
        Self::new(&vec![side; dims], boundary)
    }

    /// Hypercube restricted to `axes`; every other axis stays at offset 0
    pub fn along_axes(
        dims: usize,
        axes: &[usize],
        radius: usize,
        boundary: Boundary,
    ) -> Result<Self> {
        if dims == 0 {
            return Err(MdaError::InvalidShape { shape: Vec::new() });
        }
        if let Some(&axis) = axes.iter().find(|&&a| a >= dims) {
            return Err(MdaError::OutOfRange {
                index: axis,
                extent: dims,
            });
        }
        let r = isize::try_from(radius).map_err(|_| MdaError::Overflow)?;
        let bounds = (0..dims)
            .map(|i| if axes.contains(&i) { (-r, r) } else { (0, 0) })
            .collect();
        Ok(Self::from_box(bounds, 2.0, boundary, |_| true))
    }

    /// Every offset whose p-norm is at most `radius`
    pub fn ball(dims: usize, radius: f64, p: f64, boundary: Boundary) -> Result<Self> {
        if dims == 0 {
            return Err(MdaError::InvalidShape { shape: Vec::new() });
        }
        // no component of an offset inside the ball exceeds the radius
        let r = if radius > 0.0 { radius.floor() as isize } else { 0 };
        let bounds = vec![(-r, r); dims];
        Ok(Self::from_box(bounds, p, boundary, |offset| {
            p_norm(offset, p) <= radius
        }))
    }

    /// Offsets along the coordinate axes only, up to `radius` from the
    /// center; distances use the 1-norm
    pub fn star(dims: usize, radius: usize, boundary: Boundary) -> Result<Self> {
        if dims == 0 {
            return Err(MdaError::InvalidShape { shape: Vec::new() });
        }
        let r = isize::try_from(radius).map_err(|_| MdaError::Overflow)?;
        let bounds = vec![(-r, r); dims];
        Ok(Self::from_box(bounds, 1.0, boundary, |offset| {
            offset.iter().filter(|&&v| v != 0).count() <= 1
        }))
    }

    fn from_box(
        bounds: Vec<(isize, isize)>,
        p: f64,
        boundary: Boundary,
        keep: impl Fn(&[isize]) -> bool,
    ) -> Self {
        let dims = bounds.len();
        let neighbors = CoordsIter::over_box(bounds)
            .filter(|offset| keep(offset.as_slice()))
            .map(|offset| Neighbor {
                distance: p_norm(&offset, p),
                offset,
            })
            .collect();
        Self {
            neighbors,
            dims,
            boundary,
        }
    }

    pub fn len(&self) -> usize {
        self.neighbors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.neighbors.is_empty()
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn boundary(&self) -> Boundary {
        self.boundary
    }

    pub fn neighbors(&self) -> &[Neighbor] {
        &self.neighbors
    }

    /// The relative offsets, in construction order
    pub fn offsets(&self) -> impl ExactSizeIterator<Item = &[isize]> + '_ {
        self.neighbors.iter().map(|n| n.offset.as_slice())
    }

    fn check_dims(&self, len: usize) -> Result<()> {
        if len != self.dims {
            return Err(MdaError::mismatch(self.dims, len));
        }
        Ok(())
    }

    /// Boundary-mapped position of every neighbor of `center`; `None` where
    /// the fill value applies
    pub fn resolve_positions(&self, center: &Coords, shape: &Coords) -> Result<Vec<Option<Coords>>> {
        self.check_dims(center.len())?;
        self.check_dims(shape.len())?;
        let mut position = vec![0isize; self.dims];
        Ok(self
            .neighbors
            .iter()
            .map(|n| {
                for ((p, &c), &o) in position.iter_mut().zip(center.iter()).zip(&n.offset) {
                    *p = c as isize + o;
                }
                self.boundary
                    .resolve_position(&position, shape.as_slice())
                    .map(Coords::new)
            })
            .collect())
    }

    /// Value of `channel` at every neighbor of `center`, converted to `T`
    pub fn resolve<T: Element>(&self, center: &Coords, array: &Array, channel: usize) -> Result<Vec<T>> {
        if channel >= array.channels() {
            return Err(MdaError::OutOfRange {
                index: channel,
                extent: array.channels(),
            });
        }
        let shape = array.shape();
        linear_offset(shape, center)?;
        let fill = self.boundary.fill::<T>();
        self.resolve_positions(center, shape)?
            .into_iter()
            .map(|position| match position {
                Some(p) => {
                    let index = linear_offset(shape, &p)? * array.channels() + channel;
                    Ok(array.element_as::<T>(index))
                }
                None => Ok(fill),
            })
            .collect()
    }

    /// Signed linear offset of every neighbor in an array of `shape`
    pub fn linear_offsets(&self, shape: &[usize]) -> Result<Vec<isize>> {
        self.check_dims(shape.len())?;
        self.neighbors
            .iter()
            .map(|n| signed_offset(shape, &n.offset))
            .collect()
    }

    /// Signed linear offset of every neighbor in `shape` padded by `padding`
    /// on both sides of every axis
    pub fn padded_offsets(&self, shape: &[usize], padding: usize) -> Result<Vec<isize>> {
        let padded = Coords::new(shape.to_vec()).padded(padding)?;
        self.linear_offsets(padded.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DType;

    fn offsets(n: &Neighborhood) -> Vec<Vec<isize>> {
        n.offsets().map(|o| o.to_vec()).collect()
    }

    #[test]
    fn test_box_order() {
        let n = Neighborhood::new(&[3, 2], Boundary::Clamp).unwrap();
        assert_eq!(n.len(), 6);
        assert_eq!(
            offsets(&n),
            vec![
                vec![-1, -1],
                vec![0, -1],
                vec![1, -1],
                vec![-1, 0],
                vec![0, 0],
                vec![1, 0],
            ]
        );
    }

    #[test]
    fn test_stable_and_sized() {
        for window in [vec![1], vec![3, 3], vec![2, 4, 3]] {
            let a = Neighborhood::new(&window, Boundary::Mirror).unwrap();
            let b = Neighborhood::new(&window, Boundary::Mirror).unwrap();
            assert_eq!(a.len(), window.iter().product::<usize>());
            assert_eq!(offsets(&a), offsets(&a));
            assert_eq!(offsets(&a), offsets(&b));
        }
        assert!(Neighborhood::new(&[3, 0], Boundary::Clamp).is_err());
        assert!(Neighborhood::new(&[], Boundary::Clamp).is_err());
    }

    #[test]
    fn test_cube_distances() {
        let n = Neighborhood::cube(2, 1, Boundary::Clamp).unwrap();
        assert_eq!(n.len(), 9);
        let corner = &n.neighbors()[0];
        assert_eq!(corner.offset, vec![-1, -1]);
        assert!((corner.distance - 2f64.sqrt()).abs() < 1e-12);
        assert_eq!(n.neighbors()[4].distance, 0.0);
    }

    #[test]
    fn test_along_axes() {
        let n = Neighborhood::along_axes(3, &[1], 2, Boundary::Wrap).unwrap();
        assert_eq!(
            offsets(&n),
            (-2..=2).map(|y| vec![0, y, 0]).collect::<Vec<_>>()
        );
        assert!(Neighborhood::along_axes(2, &[2], 1, Boundary::Wrap).is_err());
    }

    #[test]
    fn test_ball_and_star() {
        let ball = Neighborhood::ball(2, 1.0, 2.0, Boundary::Clamp).unwrap();
        assert_eq!(
            offsets(&ball),
            vec![vec![0, -1], vec![-1, 0], vec![0, 0], vec![1, 0], vec![0, 1]]
        );
        let ball = Neighborhood::ball(2, 1.5, 2.0, Boundary::Clamp).unwrap();
        assert_eq!(ball.len(), 9);
        let diamond = Neighborhood::ball(2, 2.0, 1.0, Boundary::Clamp).unwrap();
        assert_eq!(diamond.len(), 13);

        let star = Neighborhood::star(3, 2, Boundary::Clamp).unwrap();
        assert_eq!(star.len(), 1 + 3 * 4);
        assert!(star.neighbors().iter().all(|n| n.distance <= 2.0));
    }

    #[test]
    fn test_p_norm_limits() {
        assert!((p_norm(&[3, -4], 2.0) - 5.0).abs() < 1e-12);
        assert_eq!(p_norm(&[3, -4], 1.0), 7.0);
        assert_eq!(p_norm(&[3, -4], f64::INFINITY), 4.0);
        assert_eq!(p_norm(&[3, -4], 0.0), 3.0);
    }

    #[test]
    fn test_linear_offsets() {
        let n = Neighborhood::cube(2, 1, Boundary::Clamp).unwrap();
        let unpadded = n.linear_offsets(&[10, 5]).unwrap();
        assert_eq!(unpadded, vec![-11, -10, -9, -1, 0, 1, 9, 10, 11]);
        let padded = n.padded_offsets(&[10, 5], 1).unwrap();
        assert_eq!(padded, vec![-13, -12, -11, -1, 0, 1, 11, 12, 13]);
        assert!(n.linear_offsets(&[10]).is_err());
    }

    #[test]
    fn test_resolve_values() {
        // 3x2 single channel: 1 2 3 / 4 5 6
        let array = Array::from_values([3, 2], 1, &[1u8, 2, 3, 4, 5, 6]).unwrap();
        let window = [3, 3];

        let clamp = Neighborhood::new(&window, Boundary::Clamp).unwrap();
        let values = clamp.resolve::<u8>(&Coords::from([0, 0]), &array, 0).unwrap();
        assert_eq!(values, vec![1, 1, 2, 1, 1, 2, 4, 4, 5]);

        let constant = Neighborhood::new(&window, Boundary::Constant(-1.0)).unwrap();
        let values = constant
            .resolve::<f32>(&Coords::from([2, 1]), &array, 0)
            .unwrap();
        assert_eq!(
            values,
            vec![2.0, 3.0, -1.0, 5.0, 6.0, -1.0, -1.0, -1.0, -1.0]
        );

        let positions = constant
            .resolve_positions(&Coords::from([2, 1]), array.shape())
            .unwrap();
        assert_eq!(positions[0], Some(Coords::from([1, 0])));
        assert_eq!(positions[2], None);
    }

    #[test]
    fn test_resolve_checks() {
        let array = Array::new([4, 4], 2, DType::I16).unwrap();
        let n = Neighborhood::cube(2, 1, Boundary::Wrap).unwrap();
        assert!(n.resolve::<i16>(&Coords::from([1, 1]), &array, 2).is_err());
        assert!(matches!(
            n.resolve::<i16>(&Coords::from([4, 1]), &array, 0),
            Err(MdaError::OutOfRange { .. })
        ));
        assert!(matches!(
            n.resolve::<i16>(&Coords::from([1, 1, 1]), &array, 0),
            Err(MdaError::DimensionMismatch { .. })
        ));
        assert_eq!(
            n.resolve::<i16>(&Coords::from([3, 3]), &array, 1).unwrap().len(),
            9
        );
    }

    #[test]
    fn test_extreme_sizes_overflow() {
        assert!(matches!(
            Neighborhood::cube(2, usize::MAX, Boundary::Clamp),
            Err(MdaError::Overflow)
        ));
        assert!(matches!(
            Neighborhood::new(&[usize::MAX], Boundary::Clamp),
            Err(MdaError::Overflow)
        ));
        assert!(matches!(
            Neighborhood::star(2, usize::MAX, Boundary::Wrap),
            Err(MdaError::Overflow)
        ));
        assert!(matches!(
            Neighborhood::along_axes(2, &[0], usize::MAX, Boundary::Wrap),
            Err(MdaError::Overflow)
        ));

        let n = Neighborhood::cube(2, 1, Boundary::Clamp).unwrap();
        assert!(matches!(
            n.padded_offsets(&[usize::MAX, 4], 1),
            Err(MdaError::Overflow)
        ));
        assert!(matches!(
            n.linear_offsets(&[usize::MAX, 4]),
            Err(MdaError::Overflow)
        ));
    }
}
