use core::fmt::{Debug, Display};

/// Errors raised by shape construction and rearrangement helpers.
#[derive(Clone, PartialEq, Eq)]
pub enum ShapeError {
    /// Two containers that must agree on rank do not.
    RankMismatch { left: usize, right: usize },
    /// An axis index points past the rank of the container.
    AxisOutOfRange { axis: usize, rank: usize },
    /// A sequence of axes is not a permutation (duplicate or missing axes).
    NotAPermutation { rank: usize },
}

impl Display for ShapeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl Debug for ShapeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ShapeError::RankMismatch { left, right } => {
                write!(f, "Rank mismatch: {left} vs {right}")
            }
            ShapeError::AxisOutOfRange { axis, rank } => {
                write!(f, "Axis {axis} is out of range for rank {rank}")
            }
            ShapeError::NotAPermutation { rank } => {
                write!(f, "Axis list is not a permutation of 0..{rank}")
            }
        }
    }
}

impl core::error::Error for ShapeError {}
