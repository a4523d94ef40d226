use core::fmt::Display;

use npucl_ir::{BufferType, Operation};
use npucl_shape::{Dim, Shape};
use serde::{Deserialize, Serialize};

use crate::{
    Logger, OutputTiling, ShapeInferError, TileInfo, TilingError, back_infer_tile_info,
    fill_divided_tiles, tiling_axis_exclusions, tiling_output_shape,
};

/// How aggressively the strategy budgets the accelerator's local memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TilingMode {
    /// Each tile's working set fits the budget on its own.
    Isolated,
    /// Two tiles' working sets fit at once, so compute and data movement of
    /// consecutive tiles overlap (double buffering).
    Pipelining,
    /// The working set plus the next tile's inputs fit, so input DMA runs
    /// ahead of compute.
    Prefetching,
}

impl Display for TilingMode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            TilingMode::Isolated => write!(f, "ISOLATED"),
            TilingMode::Pipelining => write!(f, "PIPELINING"),
            TilingMode::Prefetching => write!(f, "PREFETCHING"),
        }
    }
}

fn tile_bytes(ty: &BufferType, shape: &Shape) -> usize {
    (shape.total_elements() * ty.elem().size_bits()).div_ceil(8)
}

/// Working set of one output tile: `(input bytes, input + output bytes)`.
fn working_set_bytes(
    op: &Operation,
    output_tile: &TileInfo,
    log: &Logger,
) -> Result<(usize, usize), ShapeInferError> {
    let tiling = back_infer_tile_info(op, output_tile, log)?;
    let inputs: usize = op
        .inputs()
        .iter()
        .zip(&tiling.tiles)
        .map(|(input, tile)| tile_bytes(&input.ty, &tile.shape))
        .sum();
    let output = op
        .output_buff()
        .map(|buff| tile_bytes(&buff.ty, &output_tile.shape))
        .unwrap_or(0);
    Ok((inputs, inputs + output))
}

/// Greedy recursive bisection of the output shape.
///
/// Starting from the whole output, the eligible axis with the largest
/// per-tile extent is halved (ties: outermost first) until the worst tile's
/// working set fits the mode-adjusted budget. Axes in the exclusion set and
/// axes already down to one element per tile are skipped; when none is left
/// and the working set still does not fit, tiling fails immediately — the
/// shape is unsupported under this budget, and no fallback granularity is
/// attempted.
pub fn tiling_strategy(
    op: &Operation,
    mode: TilingMode,
    budget_bytes: usize,
    log: &Logger,
) -> Result<OutputTiling, TilingError> {
    let out_shape = tiling_output_shape(op)?;
    let excluded = tiling_axis_exclusions(op)?;
    let rank = out_shape.rank();
    let mut counts = vec![1usize; rank];

    loop {
        let tiles = fill_divided_tiles(&out_shape, &counts);
        let mut worst = (0usize, 0usize);
        for tile in &tiles {
            let set = working_set_bytes(op, tile, log)?;
            if set.1 > worst.1 {
                worst = set;
            }
        }
        let (worst_inputs, worst_total) = worst;

        let fits = match mode {
            TilingMode::Isolated => worst_total <= budget_bytes,
            TilingMode::Pipelining => worst_total * 2 <= budget_bytes,
            TilingMode::Prefetching => worst_total + worst_inputs <= budget_bytes,
        };
        if fits {
            log.debug(format_args!(
                "{}: {} tiles, worst working set {worst_total} bytes ({mode}, budget {budget_bytes})",
                op.name(),
                tiles.len()
            ));
            return Ok(tiles);
        }

        let mut best: Option<(Dim, usize)> = None;
        for axis in 0..rank {
            let dim = Dim::new(axis);
            if excluded.contains(&dim) {
                continue;
            }
            let extent = out_shape[dim].div_ceil(counts[axis]);
            if extent <= 1 {
                continue;
            }
            // Strict comparison keeps the outermost axis on ties.
            if best.is_none_or(|(_, largest)| extent > largest) {
                best = Some((dim, extent));
            }
        }
        let Some((dim, extent)) = best else {
            return Err(TilingError::BudgetExceeded {
                footprint: worst_total,
                budget: budget_bytes,
            });
        };

        counts[dim.index()] = (counts[dim.index()] * 2).min(out_shape[dim]);
        log.trace(format_args!(
            "bisecting {dim} (per-tile extent {extent}) -> counts {counts:?}"
        ));
    }
}
