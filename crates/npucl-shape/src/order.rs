use core::fmt::Display;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::{Dim, INLINE_DIMS, Shape, ShapeError, Strides};

/// Memory layout of a tensor: the permutation of logical axes from outermost
/// to innermost as laid out in memory.
///
/// `NHWC` is `[N, H, W, C]` in memory, i.e. the permutation `[0, 2, 3, 1]`
/// over the logical `NCHW` axes.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DimsOrder {
    permutation: SmallVec<[usize; INLINE_DIMS]>,
}

impl DimsOrder {
    pub fn from_permutation(permutation: &[usize]) -> Result<Self, ShapeError> {
        let rank = permutation.len();
        let mut seen = vec![false; rank];
        for &axis in permutation {
            if axis >= rank {
                return Err(ShapeError::AxisOutOfRange { axis, rank });
            }
            if seen[axis] {
                return Err(ShapeError::NotAPermutation { rank });
            }
            seen[axis] = true;
        }
        Ok(Self {
            permutation: SmallVec::from_slice(permutation),
        })
    }

    pub fn c() -> Self {
        Self {
            permutation: smallvec::smallvec![0],
        }
    }

    pub fn nc() -> Self {
        Self {
            permutation: smallvec::smallvec![0, 1],
        }
    }

    pub fn chw() -> Self {
        Self {
            permutation: smallvec::smallvec![0, 1, 2],
        }
    }

    pub fn hwc() -> Self {
        Self {
            permutation: smallvec::smallvec![1, 2, 0],
        }
    }

    pub fn nchw() -> Self {
        Self {
            permutation: smallvec::smallvec![0, 1, 2, 3],
        }
    }

    pub fn nhwc() -> Self {
        Self {
            permutation: smallvec::smallvec![0, 2, 3, 1],
        }
    }

    /// The row-major order of the given rank.
    pub fn row_major(rank: usize) -> Self {
        Self {
            permutation: (0..rank).collect(),
        }
    }

    pub fn rank(&self) -> usize {
        self.permutation.len()
    }

    pub fn permutation(&self) -> &[usize] {
        &self.permutation
    }

    /// Position of the logical axis `dim` in memory order (0 = outermost).
    pub fn position_of(&self, dim: Dim) -> Option<usize> {
        self.permutation.iter().position(|&axis| axis == dim.index())
    }

    /// Compact (gap-free) strides in elements for `shape` under this order.
    pub fn strides_for(&self, shape: &Shape) -> Result<Strides, ShapeError> {
        if shape.rank() != self.rank() {
            return Err(ShapeError::RankMismatch {
                left: shape.rank(),
                right: self.rank(),
            });
        }
        let mut strides = vec![0usize; self.rank()];
        let mut running = 1usize;
        for &axis in self.permutation.iter().rev() {
            strides[axis] = running;
            running *= shape[Dim::new(axis)];
        }
        Ok(Strides::from(strides))
    }

    /// Canonical name of this order, when it has one.
    pub fn name(&self) -> Option<&'static str> {
        match self.permutation.as_slice() {
            [0] => Some("C"),
            [0, 1] => Some("NC"),
            [0, 1, 2] => Some("CHW"),
            [1, 2, 0] => Some("HWC"),
            [0, 1, 2, 3] => Some("NCHW"),
            [0, 2, 3, 1] => Some("NHWC"),
            _ => None,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "C" => Some(Self::c()),
            "NC" => Some(Self::nc()),
            "CHW" => Some(Self::chw()),
            "HWC" => Some(Self::hwc()),
            "NCHW" => Some(Self::nchw()),
            "NHWC" => Some(Self::nhwc()),
            _ => None,
        }
    }
}

impl Display for DimsOrder {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.name() {
            Some(name) => write!(f, "#{name}"),
            None => {
                write!(f, "#perm<")?;
                for (idx, axis) in self.permutation.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{axis}")?;
                }
                write!(f, ">")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape;

    #[test]
    fn nhwc_strides() {
        let shape = shape![1, 64, 56, 56];
        let strides = DimsOrder::nhwc().strides_for(&shape).unwrap();
        // Memory order N, H, W, C: C is innermost.
        assert_eq!(&*strides, &[200704, 1, 3584, 64]);
    }

    #[test]
    fn nchw_strides() {
        let shape = shape![1, 64, 56, 56];
        let strides = DimsOrder::nchw().strides_for(&shape).unwrap();
        assert_eq!(&*strides, &[200704, 3136, 56, 1]);
    }

    #[test]
    fn rejects_invalid_permutation() {
        assert!(DimsOrder::from_permutation(&[0, 0, 1]).is_err());
        assert!(DimsOrder::from_permutation(&[0, 3]).is_err());
    }

    #[test]
    fn named_round_trip() {
        for order in [DimsOrder::nchw(), DimsOrder::nhwc(), DimsOrder::nc()] {
            let name = order.name().unwrap();
            assert_eq!(DimsOrder::from_name(name).unwrap(), order);
        }
    }
}
