use serde::{Deserialize, Serialize};

use crate::{BufferType, Value};

/// Shape-only reinterpretation of a buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReshapeOp {
    pub input: Value,
    pub result_ty: BufferType,
}

/// Element-metadata-only cast (e.g. requantization). Never moves an element:
/// shape and strides of input and result must match, which the verifier
/// checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantizeCastOp {
    pub input: Value,
    pub result_ty: BufferType,
}

impl QuantizeCastOp {
    /// Folds away when the cast changes nothing.
    pub fn fold(&self) -> Option<&Value> {
        (self.input.ty == self.result_ty).then_some(&self.input)
    }
}

/// Changes only the distribution descriptor of a distributed buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributedCastOp {
    pub input: Value,
    pub result_ty: BufferType,
}
