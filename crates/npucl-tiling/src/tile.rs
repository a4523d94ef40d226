use npucl_ir::PadInfo;
use npucl_shape::{Dim, Shape, divide_balanced};
use serde::{Deserialize, Serialize};

/// An axis-aligned sub-region of a parent tensor: per-axis offsets plus the
/// region's own shape.
///
/// Tiles are immutable value objects. Construction against a parent checks
/// containment; a tile escaping its parent is a bug in the pass that produced
/// it, not a recoverable condition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileInfo {
    pub shape: Shape,
    pub offsets: Shape,
}

impl TileInfo {
    /// The tile covering all of `shape`.
    pub fn full(shape: Shape) -> Self {
        let offsets = Shape::filled(shape.rank(), 0);
        Self { shape, offsets }
    }

    /// A tile validated against its parent: for every axis,
    /// `offset + extent <= parent extent`.
    pub fn checked(parent: &Shape, offsets: Shape, shape: Shape) -> Self {
        assert_eq!(
            parent.rank(),
            shape.rank(),
            "tile rank {} does not match parent rank {}",
            shape.rank(),
            parent.rank()
        );
        assert_eq!(offsets.rank(), shape.rank());
        for axis in 0..parent.rank() {
            let dim = Dim::new(axis);
            assert!(
                offsets[dim] + shape[dim] <= parent[dim],
                "tile [{} + {}] escapes parent extent {} along {dim}",
                offsets[dim],
                shape[dim],
                parent[dim]
            );
        }
        Self { shape, offsets }
    }

    pub fn rank(&self) -> usize {
        self.shape.rank()
    }
}

/// The ordered tiles covering an operation's output, produced fresh per
/// tiling request. Disjoint and gap-free by construction.
pub type OutputTiling = Vec<TileInfo>;

/// The input tiles (positionally matching the operation's data inputs)
/// required to produce one output tile, plus the attribute delta the tile
/// needs — today only adjusted padding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputTiling {
    pub tiles: Vec<TileInfo>,
    pub pads: Option<PadInfo>,
}

impl InputTiling {
    pub fn new(tiles: Vec<TileInfo>) -> Self {
        Self { tiles, pads: None }
    }

    pub fn with_pads(tiles: Vec<TileInfo>, pads: PadInfo) -> Self {
        Self {
            tiles,
            pads: Some(pads),
        }
    }
}

/// Materializes the tiling given by per-axis tile counts: each axis is split
/// into parts whose extents differ by at most one, and the cartesian product
/// of the parts is enumerated with the innermost axis varying fastest.
pub fn fill_divided_tiles(shape: &Shape, counts: &[usize]) -> OutputTiling {
    assert_eq!(counts.len(), shape.rank());
    let per_axis: Vec<Vec<(usize, usize)>> = shape
        .iter()
        .zip(counts)
        .map(|(extent, &count)| divide_balanced(extent, count))
        .collect();

    let total: usize = counts.iter().product();
    let mut tiles = Vec::with_capacity(total);
    let mut cursor = vec![0usize; shape.rank()];
    loop {
        let mut offsets = Shape::filled(shape.rank(), 0);
        let mut tile_shape = Shape::filled(shape.rank(), 0);
        for axis in 0..shape.rank() {
            let (offset, size) = per_axis[axis][cursor[axis]];
            offsets[Dim::new(axis)] = offset;
            tile_shape[Dim::new(axis)] = size;
        }
        tiles.push(TileInfo::checked(shape, offsets, tile_shape));

        // Advance the innermost axis first.
        let mut axis = shape.rank();
        loop {
            if axis == 0 {
                return tiles;
            }
            axis -= 1;
            cursor[axis] += 1;
            if cursor[axis] < counts[axis] {
                break;
            }
            cursor[axis] = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use npucl_shape::shape;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn divided_tiles_cover_exactly() {
        let parent = shape![1, 64, 56, 56];
        let tiles = fill_divided_tiles(&parent, &[1, 2, 3, 1]);
        assert_eq!(tiles.len(), 6);

        let volume: usize = tiles.iter().map(|tile| tile.shape.total_elements()).sum();
        assert_eq!(volume, parent.total_elements());

        // Offsets along C alternate before H advances.
        assert_eq!(&*tiles[0].offsets, &[0, 0, 0, 0]);
        assert_eq!(&*tiles[1].offsets, &[0, 0, 19, 0]);
        assert_eq!(&*tiles[3].offsets, &[0, 32, 0, 0]);
    }

    #[test]
    #[should_panic(expected = "escapes parent")]
    fn out_of_bounds_tile_is_fatal() {
        TileInfo::checked(&shape![1, 64, 56, 56], shape![0, 0, 40, 0], shape![1, 64, 20, 56]);
    }
}
