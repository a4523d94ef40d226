//! Compatibility queries over distributed buffer types.
//!
//! Consumed by the cast verifiers and by the canonicalization rewrites that
//! fuse or eliminate view operations around distributed buffers. Stateless:
//! every function is a pure predicate over its arguments.

use crate::{DistributedBufferType, DistributionMode};

/// Default compatibility predicate: both sides must use the same distribution
/// mode and produce the same per-cluster placement for their shape.
pub fn distributed_compatible(
    input: &DistributedBufferType,
    output: &DistributedBufferType,
) -> bool {
    let lhs = input.distribution();
    let rhs = output.distribution();
    if lhs.mode != rhs.mode || lhs.num_clusters != rhs.num_clusters {
        return false;
    }
    if lhs.num_tiles != rhs.num_tiles || lhs.alignment != rhs.alignment {
        return false;
    }
    // Overlap parameters may differ while still describing the same halos for
    // this particular shape, so compare the resulting placement, not the
    // parameters.
    lhs.per_cluster_memory_shapes(input.shape()) == rhs.per_cluster_memory_shapes(output.shape())
        && lhs.per_cluster_memory_offsets(input.shape())
            == rhs.per_cluster_memory_offsets(output.shape())
}

/// Whether both sides are OVERLAPPED-distributed.
///
/// OVERLAPPED partitioning only concerns the memory layout of halo exchange,
/// not logical value placement, so an operation that provably never moves an
/// element or changes strides may treat any OVERLAPPED pair as compatible
/// even when the default predicate rejects it.
pub fn overlapped_pair(input: &DistributedBufferType, output: &DistributedBufferType) -> bool {
    input
        .distribution()
        .mode
        .contains(DistributionMode::OVERLAPPED)
        && output
            .distribution()
            .mode
            .contains(DistributionMode::OVERLAPPED)
}

/// Compatibility of the distributed types across a cast-like operation.
///
/// `preserves_layout` is true only for pure reinterpretations (element
/// metadata casts) that keep shape and strides intact; those additionally
/// accept OVERLAPPED pairs. A side that is not distributed makes the pair
/// incompatible, never an error.
pub fn cast_compatible(
    input: Option<&DistributedBufferType>,
    output: Option<&DistributedBufferType>,
    preserves_layout: bool,
) -> bool {
    let (Some(input), Some(output)) = (input, output) else {
        return false;
    };
    if distributed_compatible(input, output) {
        return true;
    }
    preserves_layout && overlapped_pair(input, output)
}

#[cfg(test)]
mod tests {
    use npucl_shape::{DimsOrder, shape};

    use crate::{
        DistributedAttr, ElemType, MemRefType, MemoryKind, OverlapParams, PadInfo,
    };

    use super::*;

    fn overlapped_u8(kernel: usize, scale: f64) -> DistributedBufferType {
        let base = MemRefType::new(
            shape![1, 32, 16, 16],
            ElemType::QuantU8 {
                scale,
                zero_point: 128,
            },
            DimsOrder::nhwc(),
            MemoryKind::CmxNn,
        );
        let attr = DistributedAttr::new(
            DistributionMode::OVERLAPPED,
            Some(vec![1, 1, 2, 1]),
            2,
        )
        .with_overlap(OverlapParams {
            kernel: [kernel, kernel],
            strides: [1, 1],
            pads: PadInfo::new(kernel / 2, kernel / 2, kernel / 2, kernel / 2),
        });
        DistributedBufferType::new(base, attr)
    }

    #[test]
    fn mode_mismatch_is_incompatible() {
        let base = MemRefType::new(
            shape![1, 32, 16, 16],
            ElemType::F16,
            DimsOrder::nhwc(),
            MemoryKind::CmxNn,
        );
        let segmented = DistributedBufferType::new(
            base.clone(),
            DistributedAttr::new(DistributionMode::SEGMENTED, Some(vec![1, 1, 2, 1]), 2),
        );
        let duplicated = DistributedBufferType::new(
            base,
            DistributedAttr::new(DistributionMode::DUPLICATED, None, 2),
        );
        assert!(!distributed_compatible(&segmented, &duplicated));
        assert!(!cast_compatible(Some(&segmented), Some(&duplicated), true));
    }

    #[test]
    fn absent_side_is_incompatible_not_an_error() {
        let ty = overlapped_u8(3, 0.01);
        assert!(!cast_compatible(Some(&ty), None, true));
        assert!(!cast_compatible(None, Some(&ty), true));
        assert!(!cast_compatible(None, None, true));
    }

    #[test]
    fn overlapped_relaxation_applies_to_layout_preserving_casts_only() {
        // Different consumer kernels give each side different halos, so the
        // default predicate rejects the pair.
        let input = overlapped_u8(3, 0.01);
        let output = overlapped_u8(5, 0.02);
        assert!(!distributed_compatible(&input, &output));

        // A metadata-only cast cannot disturb halo layout: accepted.
        assert!(cast_compatible(Some(&input), Some(&output), true));
        // A shape-changing view gets no such relaxation.
        assert!(!cast_compatible(Some(&input), Some(&output), false));
    }

    #[test]
    fn identical_overlapped_types_pass_the_default_predicate() {
        let input = overlapped_u8(3, 0.01);
        let output = overlapped_u8(3, 0.05);
        assert!(distributed_compatible(&input, &output));
    }
}
