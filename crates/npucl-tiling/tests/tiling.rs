//! End-to-end checks of the tiling policy: strategy generation, axis
//! exclusion, back-inference and attribute adjustment.

use npucl_ir::ops::{
    CeilOp, ComputeTaskOp, DftOp, InterpolateOp, MvnOp, QuantizeCastOp, TopKOp,
};
use npucl_ir::{BufferType, ElemType, MemRefType, MemoryKind, Operation, PadInfo, Value};
use npucl_shape::{Dim, Dims4D, DimsOrder, Shape, shape};
use npucl_tiling::{
    Logger, TileInfo, TilingError, TilingMode, adjust_attrs, back_infer_tile_info,
    run_on_operation, tiling_strategy,
};
use pretty_assertions::assert_eq;

fn buffer(dims: &[usize], elem: ElemType) -> BufferType {
    let order = if dims.len() == 4 {
        DimsOrder::nhwc()
    } else {
        DimsOrder::row_major(dims.len())
    };
    MemRefType::new(Shape::new(dims), elem, order, MemoryKind::CmxNn).into()
}

fn value(id: u32, dims: &[usize], elem: ElemType) -> Value {
    Value::operand(id, buffer(dims, elem))
}

/// Tiles must lie inside the parent, sum to its volume and be pairwise
/// disjoint: together that is an exact, gap-free cover.
fn assert_exact_cover(parent: &Shape, tiles: &[TileInfo]) {
    let mut volume = 0;
    for tile in tiles {
        volume += tile.shape.total_elements();
        for axis in 0..parent.rank() {
            let dim = Dim::new(axis);
            assert!(tile.offsets[dim] + tile.shape[dim] <= parent[dim]);
        }
    }
    assert_eq!(volume, parent.total_elements(), "cover has gaps or overflow");

    for (i, a) in tiles.iter().enumerate() {
        for b in &tiles[i + 1..] {
            let overlaps = (0..parent.rank()).all(|axis| {
                let dim = Dim::new(axis);
                a.offsets[dim] < b.offsets[dim] + b.shape[dim]
                    && b.offsets[dim] < a.offsets[dim] + a.shape[dim]
            });
            assert!(!overlaps, "tiles overlap: {a:?} vs {b:?}");
        }
    }
}

fn dft_op() -> Operation {
    Operation::Dft(DftOp {
        input: value(0, &[1, 64, 56, 56], ElemType::F16),
        output_buff: value(1, &[1, 64, 56, 56], ElemType::F16),
        axes: Some(vec![1]),
        signal_size: None,
    })
}

#[test_log::test]
fn height_bisection_scenario() {
    // [1, 64, 56, 56] under a budget that admits exactly one height split:
    // the channel axis is excluded (transform axis), the trailing axis is
    // excluded (complex pair), so the split lands on H.
    let op = dft_op();
    let log = Logger::new();
    let plan = run_on_operation(&op, TilingMode::Isolated, 450_000, &log).unwrap();

    assert_eq!(plan.output_tiles.len(), 2);
    assert_eq!(&*plan.output_tiles[0].shape, &[1, 64, 28, 56]);
    assert_eq!(&*plan.output_tiles[0].offsets, &[0, 0, 0, 0]);
    assert_eq!(&*plan.output_tiles[1].shape, &[1, 64, 28, 56]);
    assert_eq!(&*plan.output_tiles[1].offsets, &[0, 0, 28, 0]);

    // The transform axis was already whole, so back-inference reproduces the
    // output tiles exactly.
    for (tile, inputs) in plan.output_tiles.iter().zip(&plan.input_tilings) {
        assert_eq!(&inputs.tiles[0], tile);
    }

    // Materialized tile types keep the layout and shrink the shape.
    let tile_types = plan.tile_output_types(&op);
    assert_eq!(tile_types.len(), 2);
    assert_eq!(tile_types[0].shape(), &shape![1, 64, 28, 56]);
}

#[test_log::test]
fn exclusions_keep_excluded_axes_whole() {
    let op = dft_op();
    let log = Logger::new();
    for mode in [TilingMode::Isolated, TilingMode::Pipelining] {
        let tiles = tiling_strategy(&op, mode, 450_000, &log).unwrap();
        assert_exact_cover(&shape![1, 64, 56, 56], &tiles);
        for tile in &tiles {
            assert_eq!(tile.shape[Dims4D::C], 64, "transform axis was split");
            assert_eq!(tile.shape[Dims4D::W], 56, "complex-pair axis was split");
        }
    }
}

#[test_log::test]
fn back_inference_recombines_to_the_input_shape() {
    let ops = [
        dft_op(),
        Operation::Ceil(CeilOp {
            input: value(0, &[1, 64, 56, 56], ElemType::F16),
            output_buff: value(1, &[1, 64, 56, 56], ElemType::F16),
        }),
    ];
    let log = Logger::new();
    for op in &ops {
        let plan = run_on_operation(op, TilingMode::Isolated, 200_000, &log).unwrap();
        let in_shape = op.inputs()[0].ty.shape().clone();
        let mut reached = Shape::filled(in_shape.rank(), 0);
        for inputs in &plan.input_tilings {
            let tile = &inputs.tiles[0];
            for axis in 0..in_shape.rank() {
                let dim = Dim::new(axis);
                reached[dim] = reached[dim].max(tile.offsets[dim] + tile.shape[dim]);
            }
        }
        assert_eq!(reached, in_shape, "recombined inputs diverge for {}", op.name());
    }
}

#[test_log::test]
fn unsplittable_exclusions_fail_immediately() {
    // Rank 3, transform axis 1, trailing axis 2 excluded; axis 0 has extent
    // one. Nothing is splittable, so the policy must fail rather than spin.
    let op = Operation::Dft(DftOp {
        input: value(0, &[1, 128, 2], ElemType::F32),
        output_buff: value(1, &[1, 128, 2], ElemType::F32),
        axes: Some(vec![1]),
        signal_size: None,
    });
    let err = tiling_strategy(&op, TilingMode::Isolated, 64, &Logger::new()).unwrap_err();
    assert!(
        matches!(err, TilingError::BudgetExceeded { budget: 64, .. }),
        "{err:?}"
    );
}

#[test_log::test]
fn equally_large_axes_split_outermost_first() {
    let op = Operation::Ceil(CeilOp {
        input: value(0, &[1, 32, 32, 2], ElemType::F16),
        output_buff: value(1, &[1, 32, 32, 2], ElemType::F16),
    });
    // One bisection suffices; C and H tie at 32 and C is declared first.
    let tiles = tiling_strategy(&op, TilingMode::Isolated, 4_096, &Logger::new()).unwrap();
    assert_eq!(tiles.len(), 2);
    assert_eq!(tiles[0].shape[Dims4D::C], 16);
    assert_eq!(tiles[0].shape[Dims4D::H], 32);
}

#[test_log::test]
fn topk_keeps_its_axis_whole_and_reads_every_candidate() {
    let op = Operation::TopK(TopKOp {
        input: value(0, &[1, 64, 56, 56], ElemType::F16),
        output_buff: value(1, &[1, 5, 56, 56], ElemType::F16),
        axis: 1,
        k: 5,
    });
    let log = Logger::new();
    let plan = run_on_operation(&op, TilingMode::Isolated, 250_000, &log).unwrap();
    assert!(plan.output_tiles.len() > 1);
    for (tile, inputs) in plan.output_tiles.iter().zip(&plan.input_tilings) {
        // Selection axis: whole output extent, whole input extent.
        assert_eq!(tile.shape[Dims4D::C], 5);
        assert_eq!(inputs.tiles[0].shape[Dims4D::C], 64);
        assert_eq!(inputs.tiles[0].offsets[Dims4D::C], 0);
        // Untouched axes follow the output tile.
        assert_eq!(inputs.tiles[0].shape[Dims4D::H], tile.shape[Dims4D::H]);
    }
}

#[test_log::test]
fn mvn_tiles_only_the_batch_and_channel_axes() {
    let op = Operation::Mvn(MvnOp {
        input: value(0, &[1, 64, 56, 56], ElemType::F16),
        output_buff: value(1, &[1, 64, 56, 56], ElemType::F16),
        across_channels: false,
        normalize_variance: true,
        eps: 1e-9,
    });
    let tiles = tiling_strategy(&op, TilingMode::Isolated, 450_000, &Logger::new()).unwrap();
    assert_exact_cover(&shape![1, 64, 56, 56], &tiles);
    for tile in &tiles {
        assert_eq!(tile.shape[Dims4D::H], 56);
        assert_eq!(tile.shape[Dims4D::W], 56);
    }
    // The split landed on C, the only remaining axis with extent > 1.
    assert!(tiles.len() > 1);
    assert!(tiles[0].shape[Dims4D::C] < 64);
}

fn conv_op() -> Operation {
    Operation::ComputeTask(ComputeTaskOp::conv(
        value(0, &[1, 32, 56, 56], ElemType::F16),
        value(1, &[32, 32, 3, 3], ElemType::F16),
        value(2, &[1, 32, 56, 56], ElemType::F16),
        [3, 3],
        [1, 1],
        PadInfo::new(1, 1, 1, 1),
    ))
}

#[test_log::test]
fn conv_back_inference_recomputes_border_padding() {
    let op = conv_op();
    let log = Logger::new();
    let plan = run_on_operation(&op, TilingMode::Isolated, 300_000, &log).unwrap();
    assert_eq!(plan.output_tiles.len(), 2);

    let first = &plan.input_tilings[0];
    // Top tile: one halo row below, global padding above survives.
    assert_eq!(&*first.tiles[0].shape, &[1, 32, 29, 56]);
    assert_eq!(&*first.tiles[0].offsets, &[0, 0, 0, 0]);
    assert_eq!(first.pads, Some(PadInfo::new(1, 0, 1, 1)));

    let second = &plan.input_tilings[1];
    assert_eq!(&*second.tiles[0].shape, &[1, 32, 29, 56]);
    assert_eq!(&*second.tiles[0].offsets, &[0, 0, 27, 0]);
    assert_eq!(second.pads, Some(PadInfo::new(0, 1, 1, 1)));

    // Weights follow the output channels only.
    for inputs in &plan.input_tilings {
        assert_eq!(&*inputs.tiles[1].shape, &[32, 32, 3, 3]);
    }

    // Adjusting writes the tile-local padding back into the task.
    let mut tiled_op = op.clone();
    adjust_attrs(&mut tiled_op, second, &plan.output_tiles[1]);
    let Operation::ComputeTask(task) = &tiled_op else {
        unreachable!()
    };
    assert_eq!(task.pads, Some(PadInfo::new(0, 1, 1, 1)));
}

#[test_log::test]
fn interpolate_divides_tiles_by_scale() {
    let op = Operation::Interpolate(InterpolateOp {
        input: value(0, &[1, 16, 8, 8], ElemType::F16),
        output_buff: value(1, &[1, 16, 16, 16], ElemType::F16),
        axes: vec![2, 3],
        scales: vec![2, 2],
        pads_begin: vec![0, 0],
        pads_end: vec![0, 0],
    });
    let out_tile = TileInfo::checked(
        &shape![1, 16, 16, 16],
        shape![0, 0, 8, 0],
        shape![1, 16, 8, 16],
    );
    let inputs = back_infer_tile_info(&op, &out_tile, &Logger::new()).unwrap();
    assert_eq!(&*inputs.tiles[0].shape, &[1, 16, 4, 8]);
    assert_eq!(&*inputs.tiles[0].offsets, &[0, 0, 4, 0]);

    let mut tiled_op = op.clone();
    adjust_attrs(&mut tiled_op, &inputs, &out_tile);
    let Operation::Interpolate(interp) = &tiled_op else {
        unreachable!()
    };
    assert_eq!(interp.pads_begin, vec![0, 0]);
    assert_eq!(interp.pads_end, vec![0, 0]);
}

#[test_log::test]
fn pipelining_and_prefetching_tile_deeper_than_isolated() {
    let op = Operation::Ceil(CeilOp {
        input: value(0, &[1, 64, 56, 56], ElemType::F16),
        output_buff: value(1, &[1, 64, 56, 56], ElemType::F16),
    });
    let log = Logger::new();
    let budget = 900_000;
    let isolated = tiling_strategy(&op, TilingMode::Isolated, budget, &log).unwrap();
    let pipelined = tiling_strategy(&op, TilingMode::Pipelining, budget, &log).unwrap();
    let prefetched = tiling_strategy(&op, TilingMode::Prefetching, budget, &log).unwrap();

    assert_eq!(isolated.len(), 1);
    assert!(pipelined.len() > isolated.len());
    assert!(prefetched.len() > isolated.len());
    for tiles in [&pipelined, &prefetched] {
        assert_exact_cover(&shape![1, 64, 56, 56], tiles);
    }
}

#[test_log::test]
fn views_are_not_tileable() {
    let ty = buffer(&[1, 32, 8, 8], ElemType::U8);
    let op = Operation::QuantizeCast(QuantizeCastOp {
        input: Value::operand(0, ty.clone()),
        result_ty: ty,
    });
    let err = run_on_operation(&op, TilingMode::Isolated, 1 << 20, &Logger::new()).unwrap_err();
    assert!(
        matches!(err, TilingError::NotTileable { op: "quantize_cast" }),
        "{err:?}"
    );
}

#[test_log::test]
fn missing_transform_axes_surface_as_recoverable_failures() {
    let op = Operation::Dft(DftOp {
        input: value(0, &[1, 64, 56, 56], ElemType::F16),
        output_buff: value(1, &[1, 64, 56, 56], ElemType::F16),
        axes: None,
        signal_size: None,
    });
    let err = run_on_operation(&op, TilingMode::Isolated, 450_000, &Logger::new()).unwrap_err();
    assert!(matches!(err, TilingError::ShapeInfer(_)), "{err:?}");
}
