use npucl_ir::{BufferType, Operation};
use serde::{Deserialize, Serialize};

use crate::{
    InputTiling, Logger, OutputTiling, TilingError, TilingMode, back_infer_tile_info,
    tiling_output_shape, tiling_strategy,
};

/// The result of tiling one operation: the output tiles and, positionally,
/// the inputs each of them needs. Produced by value; nothing is shared with
/// the operation it was computed from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TilingPlan {
    pub output_tiles: OutputTiling,
    pub input_tilings: Vec<InputTiling>,
}

impl TilingPlan {
    /// The buffer type of each output tile: the operation's output type with
    /// the tile's shape, layout preserved.
    pub fn tile_output_types(&self, op: &Operation) -> Vec<BufferType> {
        let output = op
            .output_buff()
            .expect("tiled operations carry an output buffer");
        self.output_tiles
            .iter()
            .map(|tile| output.ty.change_shape(tile.shape.clone()))
            .collect()
    }
}

/// Entry point invoked by the tiling pass for each operation.
///
/// Computes the strategy for `mode` under `budget_bytes` and back-infers
/// every tile's inputs. Recoverable failures surface as `Err` for the pass
/// to report at the operation's location; precondition violations panic.
pub fn run_on_operation(
    op: &Operation,
    mode: TilingMode,
    budget_bytes: usize,
    log: &Logger,
) -> Result<TilingPlan, TilingError> {
    log.debug(format_args!(
        "tiling {} ({mode}, budget {budget_bytes} bytes)",
        op.name()
    ));
    let output_tiles = tiling_strategy(op, mode, budget_bytes, &log.nest())?;

    if cfg!(debug_assertions) {
        let out_shape = tiling_output_shape(op)?;
        let volume: usize = output_tiles
            .iter()
            .map(|tile| tile.shape.total_elements())
            .sum();
        debug_assert_eq!(
            volume,
            out_shape.total_elements(),
            "strategy does not cover the output exactly"
        );
    }

    let input_tilings = output_tiles
        .iter()
        .map(|tile| back_infer_tile_info(op, tile, &log.nest()))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(TilingPlan {
        output_tiles,
        input_tilings,
    })
}
