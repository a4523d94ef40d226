use serde::{Deserialize, Serialize};

use crate::Value;

/// Elementwise rounding kernel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CeilOp {
    pub input: Value,
    pub output_buff: Value,
}

/// Elementwise natural logarithm kernel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogOp {
    pub input: Value,
    pub output_buff: Value,
}

/// Elementwise hard-swish kernel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HSwishOp {
    pub input: Value,
    pub output_buff: Value,
}

/// Mean-variance normalization over the spatial axes (and the channel axis
/// when `across_channels` is set).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MvnOp {
    pub input: Value,
    pub output_buff: Value,
    pub across_channels: bool,
    pub normalize_variance: bool,
    pub eps: f64,
}

/// Discrete Fourier transform over `axes`.
///
/// The trailing axis of the output carries the real/imaginary pair and is
/// never splittable; `signal_size` entries of `-1` keep the input extent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DftOp {
    pub input: Value,
    pub output_buff: Value,
    pub axes: Option<Vec<usize>>,
    pub signal_size: Option<Vec<i64>>,
}

/// Top-K selection along `axis`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopKOp {
    pub input: Value,
    pub output_buff: Value,
    pub axis: usize,
    pub k: usize,
}

/// Nearest-neighbor resize by integer `scales` along `axes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterpolateOp {
    pub input: Value,
    pub output_buff: Value,
    pub axes: Vec<usize>,
    pub scales: Vec<usize>,
    pub pads_begin: Vec<usize>,
    pub pads_end: Vec<usize>,
}
