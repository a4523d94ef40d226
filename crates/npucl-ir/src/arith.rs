use serde::{Deserialize, Serialize};

/// Spatial padding attribute: `[top, bottom, left, right]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, derive_new::new)]
pub struct PadInfo {
    pub top: usize,
    pub bottom: usize,
    pub left: usize,
    pub right: usize,
}

/// Input range selected along one axis by a sliding-window operation,
/// together with the padding left over at the borders of that range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisSlice {
    pub begin: usize,
    pub size: usize,
    pub pad_begin: usize,
    pub pad_end: usize,
}

/// Back-propagates an output range through a sliding window.
///
/// Given the output rows `out_begin..out_begin + out_size` of a window of
/// `kernel` taps moving with `stride` over an input axis of `in_extent`
/// elements padded by `pad_begin` in front, returns the input range those
/// outputs read, clamped to the real input, and the per-range padding that
/// the clamping re-introduces.
pub fn sliding_window_range(
    out_begin: usize,
    out_size: usize,
    stride: usize,
    kernel: usize,
    pad_begin: usize,
    in_extent: usize,
) -> AxisSlice {
    assert!(out_size > 0, "empty output range");
    assert!(stride > 0 && kernel > 0, "degenerate window {kernel}x{stride}");

    let first = out_begin as isize * stride as isize - pad_begin as isize;
    let last = (out_begin + out_size - 1) as isize * stride as isize + kernel as isize
        - 1
        - pad_begin as isize;

    let begin = first.max(0);
    let end = last.min(in_extent as isize - 1);
    assert!(
        begin <= end,
        "window [{first}, {last}] does not intersect input extent {in_extent}"
    );

    AxisSlice {
        begin: begin as usize,
        size: (end - begin + 1) as usize,
        pad_begin: (begin - first) as usize,
        pad_end: (last - end) as usize,
    }
}
