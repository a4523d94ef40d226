use serde::{Deserialize, Serialize};

use crate::{
    Block, BlockBuilder, BufferType, Executor, Operation, Value, ValueKind, VerifyError,
    compat::cast_compatible,
};

/// Wraps a hardware task for multi-cluster distributed execution.
///
/// The wrapper owns a single-block body whose arguments correspond 1:1 and
/// positionally to the outer operands, each typed with the *compact* form of
/// the operand's type. The first `input_count` operands are data inputs; the
/// rest are output buffers, one per result. The split is recorded at
/// construction, not re-derived from types, so inputs and outputs that share
/// a type stay unambiguous through serialization.
///
/// Built once per hardware task during the clustering pass, populated by the
/// body-builder callback, and only replaced wholesale afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterTilingOp {
    operands: Vec<Value>,
    input_count: usize,
    result_types: Vec<BufferType>,
    body: Block,
}

impl ClusterTilingOp {
    /// Builds the wrapper: derives the compact block-argument types and runs
    /// `body_builder` over them to populate the inner task.
    pub fn build(
        result_types: Vec<BufferType>,
        operands: Vec<Value>,
        body_builder: impl FnOnce(&mut BlockBuilder, &[Value]),
    ) -> Self {
        assert!(
            operands.len() >= result_types.len(),
            "got {} result types for {} operands",
            result_types.len(),
            operands.len()
        );
        let input_count = operands.len() - result_types.len();

        let mut body = Block::default();
        for (index, operand) in operands.iter().enumerate() {
            body.args.push(Value::new(
                ValueKind::BlockArg(index as u32),
                operand.ty.compact_type(),
            ));
        }

        let args = body.args.clone();
        let mut builder = BlockBuilder::new(&mut body);
        body_builder(&mut builder, &args);

        Self {
            operands,
            input_count,
            result_types,
            body,
        }
    }

    /// Reassembles a wrapper from its parsed pieces. The parser recomputes
    /// `input_count` from the printed operand groups.
    pub(crate) fn from_parsed(
        operands: Vec<Value>,
        input_count: usize,
        result_types: Vec<BufferType>,
        body: Block,
    ) -> Self {
        Self {
            operands,
            input_count,
            result_types,
            body,
        }
    }

    pub fn operands(&self) -> &[Value] {
        &self.operands
    }

    pub fn inputs(&self) -> &[Value] {
        &self.operands[..self.input_count]
    }

    pub fn output_buffs(&self) -> &[Value] {
        &self.operands[self.input_count..]
    }

    pub fn input_count(&self) -> usize {
        self.input_count
    }

    pub fn result_types(&self) -> &[BufferType] {
        &self.result_types
    }

    pub fn body(&self) -> &Block {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut Block {
        &mut self.body
    }

    /// Block arguments backing the data inputs.
    pub fn inner_inputs(&self) -> &[Value] {
        &self.body.args[..self.input_count]
    }

    /// Block arguments backing the output buffers.
    pub fn inner_outputs(&self) -> &[Value] {
        &self.body.args[self.input_count..]
    }

    /// The first body operation that is not a pure view; `None` when the body
    /// holds only views.
    pub fn inner_task_op(&self) -> Option<&Operation> {
        self.body
            .ops
            .iter()
            .find(|op| !op.is_pure_view() && !matches!(op, Operation::Yield(_)))
    }

    /// The executor of the inner task. A wrapper without a schedulable inner
    /// task is meaningless, so that case is fatal.
    pub fn executor(&self) -> Executor {
        let inner = self
            .inner_task_op()
            .unwrap_or_else(|| panic!("cluster_tiling body has no schedulable inner operation"));
        inner.executor().unwrap_or_else(|| {
            panic!(
                "inner operation {} does not report an executor",
                inner.name()
            )
        })
    }

    /// Checks every structural invariant of the wrapper.
    pub fn verify(&self) -> Result<(), VerifyError> {
        if self.operands.is_empty() {
            return Err(VerifyError::NoOperands);
        }
        if self.operands.len() != self.body.arg_count() {
            return Err(VerifyError::OperandArgMismatch {
                operands: self.operands.len(),
                args: self.body.arg_count(),
            });
        }
        if self.result_types.is_empty() {
            return Err(VerifyError::NoResults);
        }
        let outputs = self.operands.len() - self.input_count;
        if self.result_types.len() != outputs {
            return Err(VerifyError::ResultCountMismatch {
                results: self.result_types.len(),
                outputs,
            });
        }

        let is_compute_task = matches!(self.inner_task_op(), Some(Operation::ComputeTask(_)));
        if is_compute_task {
            let outer = self.operands.iter().map(|operand| &operand.ty);
            let inner = self
                .body
                .ops
                .iter()
                .flat_map(|op| op.operands())
                .map(|value| &value.ty);
            for ty in outer.chain(inner) {
                let rank = ty.rank();
                if rank != 1 && rank != 4 {
                    return Err(VerifyError::UnsupportedRank { rank });
                }
            }
        }

        for (index, (operand, arg)) in self.operands.iter().zip(&self.body.args).enumerate() {
            if arg.ty != operand.ty.compact_type() {
                return Err(VerifyError::CompactTypeMismatch { index });
            }
        }

        self.verify_casts()
    }

    /// Cast-specific invariants of the body: metadata casts must preserve
    /// shape and strides, and distributed casts must pass the compatibility
    /// checker.
    fn verify_casts(&self) -> Result<(), VerifyError> {
        for op in &self.body.ops {
            let (name, input, result_ty, preserves_layout) = match op {
                Operation::QuantizeCast(cast) => {
                    ("quantize_cast", &cast.input, &cast.result_ty, true)
                }
                Operation::DistributedCast(cast) => {
                    ("distributed_cast", &cast.input, &cast.result_ty, true)
                }
                _ => continue,
            };
            if input.ty.shape() != result_ty.shape() || input.ty.strides() != result_ty.strides() {
                return Err(VerifyError::CastChangesLayout { op: name });
            }
            let in_dist = input.ty.as_distributed();
            let out_dist = result_ty.as_distributed();
            if (in_dist.is_some() && out_dist.is_some())
                && !cast_compatible(in_dist, out_dist, preserves_layout)
            {
                return Err(VerifyError::IncompatibleDistribution { op: name });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use npucl_shape::{DimsOrder, shape};
    use pretty_assertions::assert_eq;

    use crate::{
        DistributedAttr, DistributedBufferType, DistributionMode, ElemType, MemRefType,
        MemoryKind, ops::ComputeTaskOp,
    };

    use super::*;

    fn cmx_f16(dims: &[usize]) -> MemRefType {
        let order = if dims.len() == 4 {
            DimsOrder::nhwc()
        } else {
            DimsOrder::row_major(dims.len())
        };
        MemRefType::new(
            npucl_shape::Shape::new(dims),
            ElemType::F16,
            order,
            MemoryKind::CmxNn,
        )
    }

    fn segmented(dims: &[usize], clusters: usize) -> BufferType {
        let mut tiles = vec![1; dims.len()];
        tiles[2] = clusters;
        DistributedBufferType::new(
            cmx_f16(dims),
            DistributedAttr::new(DistributionMode::SEGMENTED, Some(tiles), clusters),
        )
        .into()
    }

    fn eltwise_wrapper() -> ClusterTilingOp {
        let input = Value::operand(0, segmented(&[1, 64, 56, 56], 2));
        let output = Value::operand(1, segmented(&[1, 64, 56, 56], 2));
        ClusterTilingOp::build(
            vec![output.ty.clone()],
            vec![input, output],
            |builder, args| {
                let result = builder
                    .push(Operation::ComputeTask(ComputeTaskOp::eltwise(
                        args[0].clone(),
                        None,
                        args[1].clone(),
                    )))
                    .unwrap();
                builder.yield_(vec![result]);
            },
        )
    }

    #[test]
    fn build_compacts_block_arguments() {
        let wrapper = eltwise_wrapper();
        assert_eq!(wrapper.input_count(), 1);
        for (operand, arg) in wrapper.operands().iter().zip(&wrapper.body().args) {
            assert_eq!(arg.ty, operand.ty.compact_type());
            assert!(matches!(arg.ty, BufferType::MemRef(_)));
        }
        wrapper.verify().unwrap();
    }

    #[test]
    fn executor_comes_from_the_inner_task() {
        let wrapper = eltwise_wrapper();
        assert!(matches!(
            wrapper.inner_task_op(),
            Some(Operation::ComputeTask(_))
        ));
        assert_eq!(wrapper.executor(), Executor::Dpu);
    }

    #[test]
    fn compute_task_rejects_unsupported_rank() {
        let input = Value::operand(0, BufferType::MemRef(cmx_f16(&[64, 56, 56])));
        let output = Value::operand(1, BufferType::MemRef(cmx_f16(&[64, 56, 56])));
        let wrapper = ClusterTilingOp::build(
            vec![output.ty.clone()],
            vec![input, output],
            |builder, args| {
                let result = builder
                    .push(Operation::ComputeTask(ComputeTaskOp::eltwise(
                        args[0].clone(),
                        None,
                        args[1].clone(),
                    )))
                    .unwrap();
                builder.yield_(vec![result]);
            },
        );
        assert_eq!(
            wrapper.verify(),
            Err(VerifyError::UnsupportedRank { rank: 3 })
        );
    }

    #[test]
    fn copy_wrapper_accepts_any_rank() {
        let input = Value::operand(0, BufferType::MemRef(cmx_f16(&[64, 56, 56])));
        let output = Value::operand(1, BufferType::MemRef(cmx_f16(&[64, 56, 56])));
        let wrapper = ClusterTilingOp::build(
            vec![output.ty.clone()],
            vec![input, output],
            |builder, args| {
                let result = builder.copy(args[0].clone(), args[1].clone());
                builder.yield_(vec![result]);
            },
        );
        wrapper.verify().unwrap();
        assert_eq!(wrapper.executor(), Executor::Dma);
    }

    #[test]
    #[should_panic(expected = "no schedulable inner operation")]
    fn executor_requires_an_inner_task() {
        let input = Value::operand(0, segmented(&[1, 64, 56, 56], 2));
        let output = Value::operand(1, segmented(&[1, 64, 56, 56], 2));
        let wrapper = ClusterTilingOp::build(
            vec![output.ty.clone()],
            vec![input, output],
            |_, _| {},
        );
        wrapper.executor();
    }

    #[test]
    fn verify_rejects_missing_results() {
        let input = Value::operand(0, segmented(&[1, 64, 56, 56], 2));
        let wrapper =
            ClusterTilingOp::build(vec![], vec![input], |_, _| {});
        assert_eq!(wrapper.verify(), Err(VerifyError::NoResults));
    }
}
