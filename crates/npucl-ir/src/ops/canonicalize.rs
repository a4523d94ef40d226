//! Canonicalization rewrites over a wrapper body.

use crate::{Block, Operation, ValueKind, compat::cast_compatible, ops::QuantizeCastOp};

/// Fuses chains of metadata casts: `quantize_cast(quantize_cast(x))` becomes
/// a single cast from `x` to the outer result type.
///
/// When either end of the fused cast is distributed, the compatibility
/// checker must accept the pair (with the layout-preserving relaxation)
/// before the rewrite fires. Returns whether anything changed.
pub fn fuse_quantize_casts(block: &mut Block) -> bool {
    let mut changed = false;
    for idx in 0..block.ops.len() {
        let Operation::QuantizeCast(op) = &block.ops[idx] else {
            continue;
        };
        let ValueKind::Local(producer) = op.input.kind else {
            continue;
        };
        let Some(Operation::QuantizeCast(producer_op)) = block.ops.get(producer as usize) else {
            continue;
        };

        let in_dist = producer_op.input.ty.as_distributed();
        let out_dist = op.result_ty.as_distributed();
        if (in_dist.is_some() || out_dist.is_some())
            && !cast_compatible(in_dist, out_dist, true)
        {
            continue;
        }

        let fused = QuantizeCastOp {
            input: producer_op.input.clone(),
            result_ty: op.result_ty.clone(),
        };
        block.ops[idx] = Operation::QuantizeCast(fused);
        changed = true;
    }
    changed
}

/// Removes pure view operations whose result nothing reads, renumbering the
/// remaining local values.
pub fn drop_unused_views(block: &mut Block) -> bool {
    let mut used = vec![false; block.ops.len()];
    for op in &block.ops {
        for value in op.operands() {
            if let ValueKind::Local(index) = value.kind {
                used[index as usize] = true;
            }
        }
    }

    let keep: Vec<bool> = block
        .ops
        .iter()
        .enumerate()
        .map(|(index, op)| !op.is_pure_view() || used[index])
        .collect();
    if keep.iter().all(|&kept| kept) {
        return false;
    }

    let mut remap = vec![0u32; block.ops.len()];
    let mut next = 0u32;
    for (index, &kept) in keep.iter().enumerate() {
        remap[index] = next;
        if kept {
            next += 1;
        }
    }

    let mut index = 0;
    block.ops.retain(|_| {
        let kept = keep[index];
        index += 1;
        kept
    });
    for op in &mut block.ops {
        op.for_each_operand_mut(|value| {
            if let ValueKind::Local(old) = value.kind {
                value.kind = ValueKind::Local(remap[old as usize]);
            }
        });
    }
    true
}

#[cfg(test)]
mod tests {
    use npucl_shape::{DimsOrder, shape};

    use crate::{
        BlockBuilder, BufferType, ElemType, MemRefType, MemoryKind, Value, ValueKind,
        ops::YieldOp,
    };

    use super::*;

    fn quant(scale: f64) -> BufferType {
        MemRefType::new(
            shape![1, 32, 8, 8],
            ElemType::QuantU8 {
                scale,
                zero_point: 128,
            },
            DimsOrder::nhwc(),
            MemoryKind::CmxNn,
        )
        .into()
    }

    #[test]
    fn cast_chain_fuses_and_dead_view_drops() {
        let mut block = Block::default();
        block.args.push(Value::new(ValueKind::BlockArg(0), quant(0.5)));
        let arg = block.args[0].clone();

        let mut builder = BlockBuilder::new(&mut block);
        let first = builder
            .push(Operation::QuantizeCast(QuantizeCastOp {
                input: arg,
                result_ty: quant(0.25),
            }))
            .unwrap();
        let second = builder
            .push(Operation::QuantizeCast(QuantizeCastOp {
                input: first,
                result_ty: quant(0.125),
            }))
            .unwrap();
        builder.push(Operation::Yield(YieldOp {
            operands: vec![second],
        }));

        assert!(fuse_quantize_casts(&mut block));
        assert!(drop_unused_views(&mut block));
        assert_eq!(block.ops.len(), 2);

        let Operation::QuantizeCast(cast) = &block.ops[0] else {
            panic!("expected the fused cast first, got {:?}", block.ops[0]);
        };
        assert_eq!(cast.input.kind, ValueKind::BlockArg(0));
        assert_eq!(cast.result_ty, quant(0.125));

        // The yield now references the renumbered cast result.
        let Operation::Yield(yield_op) = &block.ops[1] else {
            panic!("terminator lost");
        };
        assert_eq!(yield_op.operands[0].kind, ValueKind::Local(0));
    }

    #[test]
    fn identity_cast_folds() {
        let cast = QuantizeCastOp {
            input: Value::new(ValueKind::BlockArg(0), quant(0.5)),
            result_ty: quant(0.5),
        };
        assert_eq!(cast.fold(), Some(&cast.input));
        let changing = QuantizeCastOp {
            input: Value::new(ValueKind::BlockArg(0), quant(0.5)),
            result_ty: quant(0.25),
        };
        assert_eq!(changing.fold(), None);
    }
}
