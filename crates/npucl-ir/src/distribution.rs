use core::fmt::Display;

use bitflags::bitflags;
use npucl_shape::{Dim, Shape, divide_balanced};
use serde::{Deserialize, Serialize};

use crate::arith::{PadInfo, sliding_window_range};

bitflags! {
    /// How a buffer's data is spread over the compute clusters.
    ///
    /// Modes combine: `DUPLICATED | SEGMENTED` describes a buffer whose
    /// memory is replicated on every cluster while compute is split, as used
    /// for weights that feed segmented convolutions.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct DistributionMode: u32 {
        const SEGMENTED = 1;
        const OVERLAPPED = 1 << 1;
        const DUPLICATED = 1 << 2;
        const MULTICASTED = 1 << 3;
    }
}

impl Display for DistributionMode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut first = true;
        for (name, _) in self.iter_names() {
            if !first {
                write!(f, "|")?;
            }
            write!(f, "{name}")?;
            first = false;
        }
        if first {
            write!(f, "NONE")?;
        }
        Ok(())
    }
}

impl DistributionMode {
    pub fn from_names(name: &str) -> Option<Self> {
        let mut mode = DistributionMode::empty();
        for part in name.split('|') {
            mode |= Self::from_bits(match part {
                "SEGMENTED" => Self::SEGMENTED.bits(),
                "OVERLAPPED" => Self::OVERLAPPED.bits(),
                "DUPLICATED" => Self::DUPLICATED.bits(),
                "MULTICASTED" => Self::MULTICASTED.bits(),
                _ => return None,
            })?;
        }
        Some(mode)
    }
}

/// Sliding-window geometry of the consumer of an OVERLAPPED buffer, used to
/// derive the halo each cluster keeps beyond its own segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OverlapParams {
    /// `[kernel_y, kernel_x]`
    pub kernel: [usize; 2],
    /// `[stride_y, stride_x]`
    pub strides: [usize; 2],
    pub pads: PadInfo,
}

/// Distribution descriptor attached to a distributed buffer type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DistributedAttr {
    pub mode: DistributionMode,
    /// Per-axis cluster split counts. Required for SEGMENTED / OVERLAPPED;
    /// exactly one axis may carry a count greater than one.
    pub num_tiles: Option<Vec<usize>>,
    pub num_clusters: usize,
    /// Per-axis alignment of the per-cluster extents, when the hardware
    /// requires segment borders on channel/row multiples.
    pub alignment: Option<Vec<usize>>,
    pub overlap: Option<OverlapParams>,
}

impl DistributedAttr {
    pub fn new(mode: DistributionMode, num_tiles: Option<Vec<usize>>, num_clusters: usize) -> Self {
        Self {
            mode,
            num_tiles,
            num_clusters,
            alignment: None,
            overlap: None,
        }
    }

    pub fn with_alignment(mut self, alignment: Vec<usize>) -> Self {
        self.alignment = Some(alignment);
        self
    }

    pub fn with_overlap(mut self, overlap: OverlapParams) -> Self {
        self.overlap = Some(overlap);
        self
    }

    fn is_split(&self) -> bool {
        self.mode
            .intersects(DistributionMode::SEGMENTED | DistributionMode::OVERLAPPED)
    }

    /// The axis the cluster split runs along, if the mode splits at all.
    pub fn segmented_axis(&self) -> Option<Dim> {
        if !self.is_split() {
            return None;
        }
        let num_tiles = self
            .num_tiles
            .as_ref()
            .unwrap_or_else(|| panic!("{} distribution without num_tiles", self.mode));
        num_tiles
            .iter()
            .position(|&count| count > 1)
            .map(Dim::new)
    }

    /// Checks the descriptor against the shape it will distribute. Violations
    /// are compiler bugs at the construction site, hence fatal.
    pub fn validate_for(&self, shape: &Shape) {
        assert!(self.num_clusters > 0, "distribution over zero clusters");
        if let Some(num_tiles) = &self.num_tiles {
            assert_eq!(
                num_tiles.len(),
                shape.rank(),
                "num_tiles rank {} does not match shape rank {}",
                num_tiles.len(),
                shape.rank()
            );
            let split_axes = num_tiles.iter().filter(|&&count| count > 1).count();
            assert!(
                split_axes <= 1,
                "cluster split along more than one axis: {num_tiles:?}"
            );
            let product: usize = num_tiles.iter().product();
            assert_eq!(
                product, self.num_clusters,
                "num_tiles {num_tiles:?} does not multiply to num_clusters {}",
                self.num_clusters
            );
        }
        if self.is_split() {
            assert!(
                self.num_tiles.is_some(),
                "{} distribution without num_tiles",
                self.mode
            );
        }
        if let Some(alignment) = &self.alignment {
            assert_eq!(
                alignment.len(),
                shape.rank(),
                "alignment rank {} does not match shape rank {}",
                alignment.len(),
                shape.rank()
            );
        }
    }

    /// Per-cluster segment `(offset, size)` along the split axis, before any
    /// halo extension.
    fn segments(&self, shape: &Shape) -> Option<(Dim, Vec<(usize, usize)>)> {
        let axis = self.segmented_axis()?;
        let extent = shape[axis];
        let count = self.num_tiles.as_ref().unwrap()[axis.index()];
        let mut parts = divide_balanced(extent, count);

        if let Some(alignment) = &self.alignment {
            let align = alignment[axis.index()];
            if align > 1 {
                // Segment borders must land on multiples of the alignment;
                // the last cluster absorbs the remainder.
                let aligned = extent.div_ceil(count).next_multiple_of(align);
                parts = (0..count)
                    .map(|idx| {
                        let offset = idx * aligned;
                        assert!(
                            offset < extent,
                            "alignment {align} leaves cluster {idx} without data (extent {extent})"
                        );
                        (offset, aligned.min(extent - offset))
                    })
                    .collect();
            }
        }
        Some((axis, parts))
    }

    /// The sub-shape of the data each cluster computes, halo excluded.
    pub fn per_cluster_compute_shapes(&self, shape: &Shape) -> Vec<Shape> {
        self.per_cluster(shape, false).0
    }

    /// Offset of each cluster's compute sub-shape within the full shape.
    pub fn per_cluster_compute_offsets(&self, shape: &Shape) -> Vec<Shape> {
        self.per_cluster(shape, false).1
    }

    /// The sub-shape each cluster holds in local memory. For OVERLAPPED this
    /// extends the compute segment with the halo the consumer's window reads.
    pub fn per_cluster_memory_shapes(&self, shape: &Shape) -> Vec<Shape> {
        self.per_cluster(shape, true).0
    }

    /// Offset of each cluster's memory sub-shape within the full shape.
    pub fn per_cluster_memory_offsets(&self, shape: &Shape) -> Vec<Shape> {
        self.per_cluster(shape, true).1
    }

    fn per_cluster(&self, shape: &Shape, with_halo: bool) -> (Vec<Shape>, Vec<Shape>) {
        let zero = Shape::filled(shape.rank(), 0);
        match self.segments(shape) {
            None => (
                vec![shape.clone(); self.num_clusters],
                vec![zero; self.num_clusters],
            ),
            Some((axis, parts)) => {
                let mut shapes = Vec::with_capacity(parts.len());
                let mut offsets = Vec::with_capacity(parts.len());
                for (offset, size) in parts {
                    let (begin, extent) = if with_halo {
                        self.haloed(axis, offset, size, shape)
                    } else {
                        (offset, size)
                    };
                    let mut cluster = shape.clone();
                    cluster[axis] = extent;
                    shapes.push(cluster);
                    let mut start = zero.clone();
                    start[axis] = begin;
                    offsets.push(start);
                }
                (shapes, offsets)
            }
        }
    }

    /// Extends a segment with the halo its consumer's window reads, when the
    /// mode is OVERLAPPED and the split axis is spatial.
    fn haloed(&self, axis: Dim, offset: usize, size: usize, shape: &Shape) -> (usize, usize) {
        if !self.mode.contains(DistributionMode::OVERLAPPED) {
            return (offset, size);
        }
        let Some(overlap) = &self.overlap else {
            return (offset, size);
        };
        let (kernel, stride, pad_begin) = match axis {
            _ if axis == npucl_shape::Dims4D::H => {
                (overlap.kernel[0], overlap.strides[0], overlap.pads.top)
            }
            _ if axis == npucl_shape::Dims4D::W => {
                (overlap.kernel[1], overlap.strides[1], overlap.pads.left)
            }
            _ => return (offset, size),
        };
        let slice = sliding_window_range(offset, size, stride, kernel, pad_begin, shape[axis]);
        (slice.begin, slice.size)
    }
}

#[cfg(test)]
mod tests {
    use npucl_shape::shape;
    use pretty_assertions::assert_eq;

    use super::*;

    fn segmented_h(clusters: usize) -> DistributedAttr {
        DistributedAttr::new(
            DistributionMode::SEGMENTED,
            Some(vec![1, 1, clusters, 1]),
            clusters,
        )
    }

    #[test]
    fn segmented_shapes_are_balanced() {
        let attr = segmented_h(4);
        let shape = shape![1, 64, 58, 56];
        attr.validate_for(&shape);
        let shapes = attr.per_cluster_compute_shapes(&shape);
        let heights: Vec<_> = shapes.iter().map(|s| s[npucl_shape::Dims4D::H]).collect();
        assert_eq!(heights, vec![15, 15, 14, 14]);
        let offsets = attr.per_cluster_compute_offsets(&shape);
        assert_eq!(offsets[2][npucl_shape::Dims4D::H], 30);
    }

    #[test]
    fn duplicated_replicates_full_shape() {
        let attr = DistributedAttr::new(DistributionMode::DUPLICATED, None, 4);
        let shape = shape![1, 64, 56, 56];
        assert_eq!(
            attr.per_cluster_compute_shapes(&shape),
            vec![shape.clone(); 4]
        );
    }

    #[test]
    fn overlapped_extends_segments_with_halo() {
        let attr = DistributedAttr::new(
            DistributionMode::OVERLAPPED,
            Some(vec![1, 1, 2, 1]),
            2,
        )
        .with_overlap(OverlapParams {
            kernel: [3, 3],
            strides: [1, 1],
            pads: PadInfo::new(1, 1, 1, 1),
        });
        let shape = shape![1, 64, 56, 56];
        let compute = attr.per_cluster_compute_shapes(&shape);
        assert_eq!(compute[0][npucl_shape::Dims4D::H], 28);
        let shapes = attr.per_cluster_memory_shapes(&shape);
        let offsets = attr.per_cluster_memory_offsets(&shape);
        // Each half keeps one halo row toward the middle.
        assert_eq!(shapes[0][npucl_shape::Dims4D::H], 29);
        assert_eq!(offsets[0][npucl_shape::Dims4D::H], 0);
        assert_eq!(shapes[1][npucl_shape::Dims4D::H], 29);
        assert_eq!(offsets[1][npucl_shape::Dims4D::H], 27);
    }

    #[test]
    fn mode_name_round_trip() {
        let mode = DistributionMode::DUPLICATED | DistributionMode::SEGMENTED;
        assert_eq!(DistributionMode::from_names(&mode.to_string()), Some(mode));
        assert_eq!(
            DistributionMode::from_names("OVERLAPPED"),
            Some(DistributionMode::OVERLAPPED)
        );
        assert_eq!(DistributionMode::from_names("BROADCAST"), None);
    }

    #[test]
    #[should_panic(expected = "does not multiply")]
    fn tile_counts_must_match_cluster_count() {
        let attr = segmented_h(3);
        let mut wrong = attr;
        wrong.num_clusters = 4;
        wrong.validate_for(&shape![1, 64, 56, 56]);
    }
}
