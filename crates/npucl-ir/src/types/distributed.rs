use npucl_shape::Shape;
use serde::{Deserialize, Serialize};

use crate::{DistributedAttr, MemRefType};

/// A buffer spread over the compute clusters according to a
/// [`DistributedAttr`].
///
/// The wrapped [`MemRefType`] describes the full (logical) buffer; the
/// per-cluster views are derived from the distribution descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DistributedBufferType {
    base: MemRefType,
    distribution: DistributedAttr,
}

impl DistributedBufferType {
    pub fn new(base: MemRefType, distribution: DistributedAttr) -> Self {
        distribution.validate_for(&base.shape);
        Self { base, distribution }
    }

    pub fn base(&self) -> &MemRefType {
        &self.base
    }

    pub fn distribution(&self) -> &DistributedAttr {
        &self.distribution
    }

    pub fn shape(&self) -> &Shape {
        &self.base.shape
    }

    pub fn rank(&self) -> usize {
        self.base.rank()
    }

    /// The per-cluster local view: the same buffer with the distribution
    /// stripped.
    ///
    /// Every place that needs the inner (compact) form of a distributed
    /// operand goes through this one function, so the derivation can never
    /// diverge between construction sites.
    pub fn compact_type(&self) -> MemRefType {
        self.base.clone()
    }

    /// Same distribution over a new shape, preserving layout semantics.
    pub fn change_shape(&self, shape: npucl_shape::Shape) -> Self {
        Self::new(self.base.change_shape(shape), self.distribution.clone())
    }

    /// Largest per-cluster allocation, in bytes. Used when budgeting the
    /// local memory a distributed operand occupies on one cluster.
    pub fn largest_cluster_size_bytes(&self) -> usize {
        self.distribution
            .per_cluster_memory_shapes(&self.base.shape)
            .into_iter()
            .map(|shape| {
                (shape.total_elements() * self.base.elem.size_bits()).div_ceil(8)
            })
            .max()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use npucl_shape::{DimsOrder, shape};

    use crate::{DistributionMode, ElemType, MemoryKind};

    use super::*;

    #[test]
    fn compact_strips_distribution_only() {
        let base = MemRefType::new(
            shape![1, 64, 56, 56],
            ElemType::F16,
            DimsOrder::nhwc(),
            MemoryKind::CmxNn,
        );
        let distributed = DistributedBufferType::new(
            base.clone(),
            DistributedAttr::new(DistributionMode::SEGMENTED, Some(vec![1, 1, 4, 1]), 4),
        );
        assert_eq!(distributed.compact_type(), base);
    }

    #[test]
    fn largest_cluster_allocation() {
        let base = MemRefType::new(
            shape![1, 64, 58, 56],
            ElemType::F16,
            DimsOrder::nhwc(),
            MemoryKind::CmxNn,
        );
        let distributed = DistributedBufferType::new(
            base,
            DistributedAttr::new(DistributionMode::SEGMENTED, Some(vec![1, 1, 4, 1]), 4),
        );
        // Largest segment is 15 rows of 64x56 f16 elements.
        assert_eq!(
            distributed.largest_cluster_size_bytes(),
            15 * 64 * 56 * 2
        );
    }
}
