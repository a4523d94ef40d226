use serde::{Deserialize, Serialize};

use crate::{BufferType, Operation, ops::YieldOp};

/// Where an SSA value comes from, which also fixes its textual name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    /// A value defined outside the wrapper, printed `%N`.
    Operand(u32),
    /// A block argument of the wrapper body, printed `%argN`.
    BlockArg(u32),
    /// The result of the body operation at index `N`, printed `%tN`.
    Local(u32),
}

/// An SSA value together with its type.
///
/// Types are embedded rather than interned: the region model is arena-owned
/// by the wrapper operation, and values refer to outer operands by position,
/// never by back-pointer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Value {
    pub kind: ValueKind,
    pub ty: BufferType,
}

impl Value {
    pub fn new(kind: ValueKind, ty: impl Into<BufferType>) -> Self {
        Self {
            kind,
            ty: ty.into(),
        }
    }

    pub fn operand(id: u32, ty: impl Into<BufferType>) -> Self {
        Self::new(ValueKind::Operand(id), ty)
    }
}

/// The single body block of a cluster-tiling wrapper: its arguments and the
/// flat list of operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Block {
    pub args: Vec<Value>,
    pub ops: Vec<Operation>,
}

impl Block {
    pub fn arg_count(&self) -> usize {
        self.args.len()
    }

    /// The value produced by the operation at `index`, when it has one.
    pub fn result_of(&self, index: usize) -> Option<Value> {
        let ty = self.ops.get(index)?.result_type()?;
        Some(Value::new(ValueKind::Local(index as u32), ty))
    }
}

/// Appends operations to a block, handing out `Local` result values.
pub struct BlockBuilder<'a> {
    block: &'a mut Block,
}

impl<'a> BlockBuilder<'a> {
    pub fn new(block: &'a mut Block) -> Self {
        Self { block }
    }

    /// Appends `op` and returns its result value, if it produces one.
    pub fn push(&mut self, op: Operation) -> Option<Value> {
        let index = self.block.ops.len() as u32;
        let result = op
            .result_type()
            .map(|ty| Value::new(ValueKind::Local(index), ty));
        self.block.ops.push(op);
        result
    }

    pub fn copy(&mut self, input: Value, output_buff: Value) -> Value {
        self.push(Operation::Copy(crate::ops::CopyOp { input, output_buff }))
            .expect("copy always produces a result")
    }

    pub fn yield_(&mut self, operands: Vec<Value>) {
        self.push(Operation::Yield(YieldOp { operands }));
    }
}
