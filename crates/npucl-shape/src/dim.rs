use core::fmt::Display;

use serde::{Deserialize, Serialize};

/// Named handle for one axis of a shape.
///
/// All shape and stride containers are indexed through `Dim`; raw `usize`
/// indexing is deliberately not exposed so that the axis a call site means is
/// always spelled out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Dim(usize);

impl Dim {
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    pub const fn index(&self) -> usize {
        self.0
    }
}

impl Display for Dim {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "d{}", self.0)
    }
}

impl From<usize> for Dim {
    fn from(index: usize) -> Self {
        Self(index)
    }
}

/// The activation-tensor axes of the canonical 4-D layout.
pub struct Dims4D;

impl Dims4D {
    pub const N: Dim = Dim(0);
    pub const C: Dim = Dim(1);
    pub const H: Dim = Dim(2);
    pub const W: Dim = Dim(3);
}

/// Weights-tensor axes: `[OC, IC, KY, KX]`.
pub struct DimsWeights;

impl DimsWeights {
    pub const OC: Dim = Dim(0);
    pub const IC: Dim = Dim(1);
    pub const KY: Dim = Dim(2);
    pub const KX: Dim = Dim(3);
}
