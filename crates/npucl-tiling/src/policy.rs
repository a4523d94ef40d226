//! Per-operation tiling policy: which output axes may be split, which input
//! tile an output tile needs, and how attributes follow the tile into its
//! local coordinate frame.
//!
//! The operation set is closed, so every capability here is an exhaustive
//! match; a new operation kind fails to compile until it gets a policy.

use npucl_ir::{AxisSlice, Operation, PadInfo, sliding_window_range};
use npucl_ir::ops::{ComputeTaskKind, ComputeTaskOp, InterpolateOp};
use npucl_shape::{Dim, Dims4D, DimsWeights, Shape};
use smallvec::SmallVec;

use crate::{InputTiling, Logger, ShapeInferError, TileInfo, TilingError};

/// Output axes the strategy must never split for this operation.
///
/// Exclusions encode non-separable semantics: a transform axis is consumed
/// whole, a selection axis must see every candidate, normalized axes share
/// their statistics, and the transform's trailing axis carries the
/// real/imaginary pair.
pub fn tiling_axis_exclusions(op: &Operation) -> Result<SmallVec<[Dim; 4]>, ShapeInferError> {
    let mut excluded: SmallVec<[Dim; 4]> = SmallVec::new();
    match op {
        Operation::Dft(dft) => {
            let axes = dft.axes.as_ref().ok_or(ShapeInferError::MissingAttr {
                op: "dft",
                attr: "axes",
            })?;
            excluded.extend(axes.iter().map(|&axis| Dim::new(axis)));
            // The last output axis holds the real/imaginary pair.
            let out_rank = dft.output_buff.ty.rank();
            excluded.push(Dim::new(out_rank - 1));
        }
        Operation::TopK(topk) => excluded.push(Dim::new(topk.axis)),
        Operation::Mvn(mvn) => {
            if mvn.across_channels {
                excluded.push(Dims4D::C);
            }
            excluded.push(Dims4D::H);
            excluded.push(Dims4D::W);
        }
        Operation::ComputeTask(_)
        | Operation::Copy(_)
        | Operation::Ceil(_)
        | Operation::Log(_)
        | Operation::HSwish(_)
        | Operation::Interpolate(_) => {}
        Operation::Reshape(_)
        | Operation::QuantizeCast(_)
        | Operation::DistributedCast(_)
        | Operation::Yield(_) => {}
    }
    Ok(excluded)
}

/// Maps an output tile back to the exact input tile(s) that produce it.
///
/// Shape-preserving kinds map the tile through unchanged; transform kinds
/// widen their structural axes back to the full parent extent; the conv
/// compute task solves the window algebra and reports the padding its tile
/// re-introduces at the borders.
pub fn back_infer_tile_info(
    op: &Operation,
    output_tile: &TileInfo,
    log: &Logger,
) -> Result<InputTiling, ShapeInferError> {
    log.trace(format_args!(
        "back-infer {} tile {} @ {}",
        op.name(),
        output_tile.shape,
        output_tile.offsets
    ));
    match op {
        // Elementwise kinds: every input follows the output tile directly.
        Operation::Copy(_)
        | Operation::Ceil(_)
        | Operation::Log(_)
        | Operation::HSwish(_)
        | Operation::Mvn(_) => Ok(InputTiling::new(vec![output_tile.clone()])),

        Operation::ComputeTask(task) => back_infer_compute_task(task, output_tile),

        Operation::Dft(dft) => {
            let axes = dft.axes.as_ref().ok_or(ShapeInferError::MissingAttr {
                op: "dft",
                attr: "axes",
            })?;
            let in_shape = dft.input.ty.shape();
            let mut tile = output_tile.clone();
            for &axis in axes {
                let dim = Dim::new(axis);
                if axis >= in_shape.rank() {
                    return Err(ShapeInferError::MalformedAttr {
                        op: "dft",
                        attr: "axes",
                    });
                }
                // The whole axis is needed to compute any one output element
                // along it.
                tile.shape[dim] = in_shape[dim];
                tile.offsets[dim] = 0;
            }
            Ok(InputTiling::new(vec![tile]))
        }

        Operation::TopK(topk) => {
            let dim = Dim::new(topk.axis);
            let in_shape = topk.input.ty.shape();
            in_shape
                .check_axis(dim)
                .map_err(|_| ShapeInferError::MalformedAttr {
                    op: "topk",
                    attr: "axis",
                })?;
            let mut tile = output_tile.clone();
            tile.shape[dim] = in_shape[dim];
            tile.offsets[dim] = 0;
            Ok(InputTiling::new(vec![tile]))
        }

        Operation::Interpolate(interp) => back_infer_interpolate(interp, output_tile),

        Operation::Reshape(_)
        | Operation::QuantizeCast(_)
        | Operation::DistributedCast(_)
        | Operation::Yield(_) => {
            panic!("{} has no tiling policy; callers gate on tileability", op.name())
        }
    }
}

fn back_infer_compute_task(
    task: &ComputeTaskOp,
    output_tile: &TileInfo,
) -> Result<InputTiling, ShapeInferError> {
    match task.task {
        ComputeTaskKind::Eltwise => {
            let mut tiles = vec![output_tile.clone()];
            if task.weights.is_some() {
                tiles.push(output_tile.clone());
            }
            Ok(InputTiling::new(tiles))
        }
        ComputeTaskKind::Conv => {
            let kernel = task.kernel.ok_or(ShapeInferError::MissingAttr {
                op: "compute_task",
                attr: "kernel",
            })?;
            let strides = task.strides.ok_or(ShapeInferError::MissingAttr {
                op: "compute_task",
                attr: "strides",
            })?;
            let pads = task.pads.ok_or(ShapeInferError::MissingAttr {
                op: "compute_task",
                attr: "pads",
            })?;
            let weights = task.weights.as_ref().ok_or(ShapeInferError::MissingAttr {
                op: "compute_task",
                attr: "weights",
            })?;

            let in_shape = task.input.ty.shape();
            let rows = sliding_window_range(
                output_tile.offsets[Dims4D::H],
                output_tile.shape[Dims4D::H],
                strides[0],
                kernel[0],
                pads.top,
                in_shape[Dims4D::H],
            );
            let cols = sliding_window_range(
                output_tile.offsets[Dims4D::W],
                output_tile.shape[Dims4D::W],
                strides[1],
                kernel[1],
                pads.left,
                in_shape[Dims4D::W],
            );

            // Input: the window's receptive field spatially, every input
            // channel, batch following the output tile.
            let mut in_tile = TileInfo::full(in_shape.clone());
            in_tile.shape[Dims4D::N] = output_tile.shape[Dims4D::N];
            in_tile.offsets[Dims4D::N] = output_tile.offsets[Dims4D::N];
            in_tile.shape[Dims4D::H] = rows.size;
            in_tile.offsets[Dims4D::H] = rows.begin;
            in_tile.shape[Dims4D::W] = cols.size;
            in_tile.offsets[Dims4D::W] = cols.begin;

            // Weights: only the output-channel axis follows the tile.
            let weights_shape = weights.ty.shape();
            let mut weights_tile = TileInfo::full(weights_shape.clone());
            weights_tile.shape[DimsWeights::OC] = output_tile.shape[Dims4D::C];
            weights_tile.offsets[DimsWeights::OC] = output_tile.offsets[Dims4D::C];

            Ok(InputTiling::with_pads(
                vec![in_tile, weights_tile],
                tile_pads(&rows, &cols),
            ))
        }
    }
}

fn tile_pads(rows: &AxisSlice, cols: &AxisSlice) -> PadInfo {
    PadInfo::new(rows.pad_begin, rows.pad_end, cols.pad_begin, cols.pad_end)
}

fn back_infer_interpolate(
    interp: &InterpolateOp,
    output_tile: &TileInfo,
) -> Result<InputTiling, ShapeInferError> {
    if interp.axes.len() != interp.scales.len() {
        return Err(ShapeInferError::MalformedAttr {
            op: "interpolate",
            attr: "scales",
        });
    }
    let in_shape = interp.input.ty.shape();
    let mut tile = output_tile.clone();
    for (&axis, &scale) in interp.axes.iter().zip(&interp.scales) {
        if scale == 0 || axis >= in_shape.rank() {
            return Err(ShapeInferError::MalformedAttr {
                op: "interpolate",
                attr: "scales",
            });
        }
        let dim = Dim::new(axis);
        let out_begin = output_tile.offsets[dim];
        let out_end = out_begin + output_tile.shape[dim];
        // Nearest-neighbor: an output run maps onto the source elements it
        // samples; partially covered source elements are included whole, so
        // neighboring input tiles may overlap but never miss an element.
        let in_begin = out_begin / scale;
        let in_end = out_end.div_ceil(scale).min(in_shape[dim]);
        tile.offsets[dim] = in_begin;
        tile.shape[dim] = in_end - in_begin;
    }
    Ok(InputTiling::new(vec![tile]))
}

/// Recomputes attributes whose values depended on global shape or position so
/// they stay correct in the tile's local frame. A no-op for attribute-free
/// kinds.
pub fn adjust_attrs(op: &mut Operation, input_tiling: &InputTiling, output_tile: &TileInfo) {
    let _ = output_tile;
    match op {
        Operation::ComputeTask(task) => {
            if let (ComputeTaskKind::Conv, Some(pads)) = (task.task, input_tiling.pads) {
                task.pads = Some(pads);
            }
        }
        Operation::Interpolate(interp) => {
            // Tiled resize happens in the tile's own frame: global edge
            // padding belongs only to the border tiles, and the back-inferred
            // tile already absorbed it.
            let axes = interp.axes.len();
            interp.pads_begin = vec![0; axes];
            interp.pads_end = vec![0; axes];
        }
        _ => {}
    }
}

/// The full output shape an operation's tiling strategy has to cover, when
/// the operation supports tiling at all.
pub fn tiling_output_shape(op: &Operation) -> Result<Shape, TilingError> {
    match op {
        Operation::Reshape(_)
        | Operation::QuantizeCast(_)
        | Operation::DistributedCast(_)
        | Operation::Yield(_) => Err(TilingError::NotTileable { op: op.name() }),
        tileable => Ok(tileable
            .output_buff()
            .expect("bufferized operations carry an output buffer")
            .ty
            .shape()
            .clone()),
    }
}
