use core::ops::{Deref, DerefMut, Index};

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::{Dim, INLINE_DIMS};

/// Per-axis strides, in elements.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Strides {
    dims: SmallVec<[usize; INLINE_DIMS]>,
}

impl Strides {
    pub fn new(dims: &[usize]) -> Self {
        Self {
            dims: SmallVec::from_slice(dims),
        }
    }

    pub fn new_raw(dims: SmallVec<[usize; INLINE_DIMS]>) -> Self {
        Self { dims }
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }
}

impl Index<Dim> for Strides {
    type Output = usize;

    fn index(&self, dim: Dim) -> &usize {
        &self.dims[dim.index()]
    }
}

impl Deref for Strides {
    type Target = [usize];

    fn deref(&self) -> &Self::Target {
        &self.dims
    }
}

impl DerefMut for Strides {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.dims
    }
}

impl<T: IntoIterator<Item = usize>> From<T> for Strides {
    fn from(dims: T) -> Self {
        Strides {
            dims: dims.into_iter().collect(),
        }
    }
}
