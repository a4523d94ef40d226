use core::fmt::Display;
use core::ops::{Deref, DerefMut, Index, IndexMut};

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::{Dim, INLINE_DIMS, ShapeError};

/// Ordered per-axis extents of a tensor or of a sub-region of one.
///
/// Axes are addressed by [`Dim`]; slice access through `Deref` is available
/// for whole-shape iteration and comparison.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Shape {
    dims: SmallVec<[usize; INLINE_DIMS]>,
}

impl Shape {
    pub fn new(dims: &[usize]) -> Self {
        Self {
            dims: SmallVec::from_slice(dims),
        }
    }

    pub fn new_raw(dims: SmallVec<[usize; INLINE_DIMS]>) -> Self {
        Self { dims }
    }

    /// A shape of `rank` axes, each with extent `value`.
    pub fn filled(rank: usize, value: usize) -> Self {
        Self {
            dims: smallvec::smallvec![value; rank],
        }
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// Product of all extents.
    pub fn total_elements(&self) -> usize {
        self.dims.iter().product()
    }

    /// Extent along `dim`, or `None` when the axis is out of range.
    pub fn get(&self, dim: Dim) -> Option<usize> {
        self.dims.get(dim.index()).copied()
    }

    /// Checks that `dim` addresses an axis of this shape.
    pub fn check_axis(&self, dim: Dim) -> Result<(), ShapeError> {
        if dim.index() < self.rank() {
            Ok(())
        } else {
            Err(ShapeError::AxisOutOfRange {
                axis: dim.index(),
                rank: self.rank(),
            })
        }
    }

    /// Reorder the extents according to the permutation of `axes`.
    pub fn permute(&mut self, axes: &[usize]) -> Result<(), ShapeError> {
        if axes.len() != self.rank() {
            return Err(ShapeError::RankMismatch {
                left: self.rank(),
                right: axes.len(),
            });
        }
        debug_assert!(axes.iter().all(|i| i < &self.rank()));

        self.dims = axes.iter().map(|&i| self.dims[i]).collect();
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.dims.iter().copied()
    }
}

impl Index<Dim> for Shape {
    type Output = usize;

    fn index(&self, dim: Dim) -> &usize {
        &self.dims[dim.index()]
    }
}

impl IndexMut<Dim> for Shape {
    fn index_mut(&mut self, dim: Dim) -> &mut usize {
        &mut self.dims[dim.index()]
    }
}

impl Deref for Shape {
    type Target = [usize];

    fn deref(&self) -> &Self::Target {
        &self.dims
    }
}

impl DerefMut for Shape {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.dims
    }
}

impl Display for Shape {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "[")?;
        for (idx, dim) in self.dims.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{dim}")?;
        }
        write!(f, "]")
    }
}

impl<T: IntoIterator<Item = usize>> From<T> for Shape {
    fn from(dims: T) -> Self {
        Shape {
            dims: dims.into_iter().collect(),
        }
    }
}

impl From<&Shape> for Shape {
    fn from(value: &Shape) -> Self {
        value.clone()
    }
}

#[macro_export]
macro_rules! shape {
    () => (
        $crate::Shape::new_raw($crate::SmallVec::new())
    );
    ($elem:expr; $n:expr) => ({
        $crate::Shape::new_raw($crate::smallvec!($elem; $n))
    });
    ($($x:expr),+$(,)?) => ({
        $crate::Shape::new_raw($crate::smallvec!($($x),*))
    });
}

#[cfg(test)]
mod tests {
    use crate::{Dim, Dims4D, Shape, ShapeError};

    #[test]
    fn dim_indexing() {
        let shape = shape![1, 64, 56, 56];
        assert_eq!(shape[Dims4D::C], 64);
        assert_eq!(shape[Dims4D::H], 56);
        assert_eq!(shape.total_elements(), 1 * 64 * 56 * 56);
    }

    #[test]
    fn permute_checks_rank() {
        let mut shape = shape![1, 64, 56, 56];
        assert_eq!(
            shape.permute(&[0, 2, 1]),
            Err(ShapeError::RankMismatch { left: 4, right: 3 })
        );
        shape.permute(&[0, 2, 3, 1]).unwrap();
        assert_eq!(shape, Shape::new(&[1, 56, 56, 64]));
    }

    #[test]
    fn axis_bounds() {
        let shape = shape![8, 8];
        assert!(shape.check_axis(Dim::new(1)).is_ok());
        assert!(shape.check_axis(Dim::new(2)).is_err());
    }
}
