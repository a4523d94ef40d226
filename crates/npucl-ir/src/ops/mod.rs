mod canonicalize;
mod compute;
mod sw;
mod view;

pub use canonicalize::*;
pub use compute::*;
pub use sw::*;
pub use view::*;

use core::fmt::Display;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::{BufferType, Value};

/// The engine an operation is scheduled on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Executor {
    /// The fixed-function compute engine.
    Dpu,
    /// The DMA engine.
    Dma,
    /// The vector DSP cores running software kernels.
    Shave,
}

impl Display for Executor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Executor::Dpu => write!(f, "DPU"),
            Executor::Dma => write!(f, "DMA_NN"),
            Executor::Shave => write!(f, "SHAVE"),
        }
    }
}

/// Region terminator forwarding the body results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YieldOp {
    pub operands: Vec<Value>,
}

/// The closed, compiler-defined operation set.
///
/// Every capability is a total match over this enum; adding a variant makes
/// the compiler point at each place that needs a decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operation {
    ComputeTask(ComputeTaskOp),
    Copy(CopyOp),
    Ceil(CeilOp),
    Log(LogOp),
    HSwish(HSwishOp),
    Mvn(MvnOp),
    Dft(DftOp),
    TopK(TopKOp),
    Interpolate(InterpolateOp),
    Reshape(ReshapeOp),
    QuantizeCast(QuantizeCastOp),
    DistributedCast(DistributedCastOp),
    Yield(YieldOp),
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::ComputeTask(_) => "compute_task",
            Operation::Copy(_) => "copy",
            Operation::Ceil(_) => "ceil",
            Operation::Log(_) => "log",
            Operation::HSwish(_) => "hswish",
            Operation::Mvn(_) => "mvn",
            Operation::Dft(_) => "dft",
            Operation::TopK(_) => "topk",
            Operation::Interpolate(_) => "interpolate",
            Operation::Reshape(_) => "reshape",
            Operation::QuantizeCast(_) => "quantize_cast",
            Operation::DistributedCast(_) => "distributed_cast",
            Operation::Yield(_) => "yield",
        }
    }

    /// Pure view operations only reinterpret a value; the wrapper skips them
    /// when looking for its schedulable inner task.
    pub fn is_pure_view(&self) -> bool {
        matches!(
            self,
            Operation::Reshape(_) | Operation::QuantizeCast(_) | Operation::DistributedCast(_)
        )
    }

    /// The engine this operation runs on; `None` for views and terminators,
    /// which are not scheduled.
    pub fn executor(&self) -> Option<Executor> {
        match self {
            Operation::ComputeTask(_) => Some(Executor::Dpu),
            Operation::Copy(_) => Some(Executor::Dma),
            Operation::Ceil(_)
            | Operation::Log(_)
            | Operation::HSwish(_)
            | Operation::Mvn(_)
            | Operation::Dft(_)
            | Operation::TopK(_)
            | Operation::Interpolate(_) => Some(Executor::Shave),
            Operation::Reshape(_)
            | Operation::QuantizeCast(_)
            | Operation::DistributedCast(_)
            | Operation::Yield(_) => None,
        }
    }

    /// All operand values, input operands first, output buffer last.
    pub fn operands(&self) -> SmallVec<[&Value; 4]> {
        let mut operands: SmallVec<[&Value; 4]> = SmallVec::new();
        match self {
            Operation::ComputeTask(op) => {
                operands.push(&op.input);
                if let Some(weights) = &op.weights {
                    operands.push(weights);
                }
                operands.push(&op.output_buff);
            }
            Operation::Copy(op) => {
                operands.push(&op.input);
                operands.push(&op.output_buff);
            }
            Operation::Ceil(op) => {
                operands.push(&op.input);
                operands.push(&op.output_buff);
            }
            Operation::Log(op) => {
                operands.push(&op.input);
                operands.push(&op.output_buff);
            }
            Operation::HSwish(op) => {
                operands.push(&op.input);
                operands.push(&op.output_buff);
            }
            Operation::Mvn(op) => {
                operands.push(&op.input);
                operands.push(&op.output_buff);
            }
            Operation::Dft(op) => {
                operands.push(&op.input);
                operands.push(&op.output_buff);
            }
            Operation::TopK(op) => {
                operands.push(&op.input);
                operands.push(&op.output_buff);
            }
            Operation::Interpolate(op) => {
                operands.push(&op.input);
                operands.push(&op.output_buff);
            }
            Operation::Reshape(op) => operands.push(&op.input),
            Operation::QuantizeCast(op) => operands.push(&op.input),
            Operation::DistributedCast(op) => operands.push(&op.input),
            Operation::Yield(op) => operands.extend(op.operands.iter()),
        }
        operands
    }

    /// The value each operand slot reads for its data input, excluding the
    /// output buffer.
    pub fn inputs(&self) -> SmallVec<[&Value; 4]> {
        let mut operands = self.operands();
        if self.output_buff().is_some() {
            operands.pop();
        }
        operands
    }

    /// The output buffer operand of bufferized operations.
    pub fn output_buff(&self) -> Option<&Value> {
        match self {
            Operation::ComputeTask(op) => Some(&op.output_buff),
            Operation::Copy(op) => Some(&op.output_buff),
            Operation::Ceil(op) => Some(&op.output_buff),
            Operation::Log(op) => Some(&op.output_buff),
            Operation::HSwish(op) => Some(&op.output_buff),
            Operation::Mvn(op) => Some(&op.output_buff),
            Operation::Dft(op) => Some(&op.output_buff),
            Operation::TopK(op) => Some(&op.output_buff),
            Operation::Interpolate(op) => Some(&op.output_buff),
            Operation::Reshape(_)
            | Operation::QuantizeCast(_)
            | Operation::DistributedCast(_)
            | Operation::Yield(_) => None,
        }
    }

    /// Visits every operand value mutably, output buffer included. Used by
    /// rewrites that renumber or replace values.
    pub fn for_each_operand_mut(&mut self, mut f: impl FnMut(&mut Value)) {
        match self {
            Operation::ComputeTask(op) => {
                f(&mut op.input);
                if let Some(weights) = &mut op.weights {
                    f(weights);
                }
                f(&mut op.output_buff);
            }
            Operation::Copy(op) => {
                f(&mut op.input);
                f(&mut op.output_buff);
            }
            Operation::Ceil(op) => {
                f(&mut op.input);
                f(&mut op.output_buff);
            }
            Operation::Log(op) => {
                f(&mut op.input);
                f(&mut op.output_buff);
            }
            Operation::HSwish(op) => {
                f(&mut op.input);
                f(&mut op.output_buff);
            }
            Operation::Mvn(op) => {
                f(&mut op.input);
                f(&mut op.output_buff);
            }
            Operation::Dft(op) => {
                f(&mut op.input);
                f(&mut op.output_buff);
            }
            Operation::TopK(op) => {
                f(&mut op.input);
                f(&mut op.output_buff);
            }
            Operation::Interpolate(op) => {
                f(&mut op.input);
                f(&mut op.output_buff);
            }
            Operation::Reshape(op) => f(&mut op.input),
            Operation::QuantizeCast(op) => f(&mut op.input),
            Operation::DistributedCast(op) => f(&mut op.input),
            Operation::Yield(op) => op.operands.iter_mut().for_each(f),
        }
    }

    /// The type of the single result, when the operation has one.
    pub fn result_type(&self) -> Option<BufferType> {
        match self {
            Operation::Reshape(op) => Some(op.result_ty.clone()),
            Operation::QuantizeCast(op) => Some(op.result_ty.clone()),
            Operation::DistributedCast(op) => Some(op.result_ty.clone()),
            Operation::Yield(_) => None,
            bufferized => bufferized.output_buff().map(|buff| buff.ty.clone()),
        }
    }
}
