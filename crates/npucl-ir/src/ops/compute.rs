use core::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::{PadInfo, Value};

/// Sub-kind of the hardware compute task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComputeTaskKind {
    /// Convolution: `weights` holds the kernel, the window attributes apply.
    Conv,
    /// Elementwise: `weights` holds the optional second input.
    Eltwise,
}

impl Display for ComputeTaskKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ComputeTaskKind::Conv => write!(f, "conv"),
            ComputeTaskKind::Eltwise => write!(f, "eltwise"),
        }
    }
}

impl ComputeTaskKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "conv" => Some(ComputeTaskKind::Conv),
            "eltwise" => Some(ComputeTaskKind::Eltwise),
            _ => None,
        }
    }
}

/// The canonical hardware compute task.
///
/// Its addressing mode only supports rank-1 and rank-4 operands; the wrapper
/// verifier enforces that for every operand once this is the inner task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputeTaskOp {
    pub task: ComputeTaskKind,
    pub input: Value,
    pub weights: Option<Value>,
    pub output_buff: Value,
    /// `[kernel_y, kernel_x]`, convolution only.
    pub kernel: Option<[usize; 2]>,
    /// `[stride_y, stride_x]`, convolution only.
    pub strides: Option<[usize; 2]>,
    pub pads: Option<PadInfo>,
}

impl ComputeTaskOp {
    pub fn eltwise(input: Value, rhs: Option<Value>, output_buff: Value) -> Self {
        Self {
            task: ComputeTaskKind::Eltwise,
            input,
            weights: rhs,
            output_buff,
            kernel: None,
            strides: None,
            pads: None,
        }
    }

    pub fn conv(
        input: Value,
        weights: Value,
        output_buff: Value,
        kernel: [usize; 2],
        strides: [usize; 2],
        pads: PadInfo,
    ) -> Self {
        Self {
            task: ComputeTaskKind::Conv,
            input,
            weights: Some(weights),
            output_buff,
            kernel: Some(kernel),
            strides: Some(strides),
            pads: Some(pads),
        }
    }
}

/// DMA transfer between memory spaces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CopyOp {
    pub input: Value,
    pub output_buff: Value,
}
