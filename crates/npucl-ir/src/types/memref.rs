use npucl_shape::{DimsOrder, Shape, Strides};
use serde::{Deserialize, Serialize};

use crate::{ElemType, MemoryKind};

/// Plain buffer type: shape, element type, layout order, optional explicit
/// strides and a memory space.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemRefType {
    pub shape: Shape,
    pub elem: ElemType,
    pub order: DimsOrder,
    /// Explicit strides in elements; `None` means compact under `order`.
    pub strides: Option<Strides>,
    pub memory: MemoryKind,
}

impl MemRefType {
    pub fn new(shape: Shape, elem: ElemType, order: DimsOrder, memory: MemoryKind) -> Self {
        assert_eq!(
            shape.rank(),
            order.rank(),
            "layout order rank {} does not match shape rank {}",
            order.rank(),
            shape.rank()
        );
        Self {
            shape,
            elem,
            order,
            strides: None,
            memory,
        }
    }

    pub fn with_strides(mut self, strides: Strides) -> Self {
        assert_eq!(strides.rank(), self.shape.rank());
        self.strides = Some(strides);
        self
    }

    pub fn rank(&self) -> usize {
        self.shape.rank()
    }

    /// Effective strides: explicit ones if set, compact ones otherwise.
    pub fn strides(&self) -> Strides {
        match &self.strides {
            Some(strides) => strides.clone(),
            None => self
                .order
                .strides_for(&self.shape)
                .expect("order/shape rank checked at construction"),
        }
    }

    pub fn size_bytes(&self) -> usize {
        (self.shape.total_elements() * self.elem.size_bits()).div_ceil(8)
    }

    /// Same-kind type with a new shape, preserving layout semantics.
    ///
    /// Explicit strides are dropped: they described the old shape's placement
    /// and are recomputed compactly for the new one.
    pub fn change_shape(&self, shape: Shape) -> Self {
        assert_eq!(
            shape.rank(),
            self.rank(),
            "change_shape cannot change rank ({} -> {})",
            self.rank(),
            shape.rank()
        );
        Self {
            shape,
            elem: self.elem,
            order: self.order.clone(),
            strides: None,
            memory: self.memory,
        }
    }
}

#[cfg(test)]
mod tests {
    use npucl_shape::shape;

    use super::*;

    fn f16_nhwc(dims: &[usize]) -> MemRefType {
        MemRefType::new(
            Shape::new(dims),
            ElemType::F16,
            DimsOrder::nhwc(),
            MemoryKind::CmxNn,
        )
    }

    #[test]
    fn size_rounds_bits_up() {
        let map = MemRefType::new(
            shape![1, 64, 7, 7],
            ElemType::I1,
            DimsOrder::nchw(),
            MemoryKind::CmxNn,
        );
        assert_eq!(map.size_bytes(), (64 * 49usize).div_ceil(8));
    }

    #[test]
    fn change_shape_preserves_layout() {
        let ty = f16_nhwc(&[1, 64, 56, 56]);
        let tiled = ty.change_shape(shape![1, 64, 28, 56]);
        assert_eq!(tiled.order, DimsOrder::nhwc());
        assert_eq!(tiled.memory, MemoryKind::CmxNn);
        assert_eq!(tiled.size_bytes(), ty.size_bytes() / 2);
    }
}
