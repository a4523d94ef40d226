//! Shape, stride and layout primitives shared by the npucl dialect crates.
//!
//! Dimensions are addressed through the [`Dim`] handle rather than raw
//! indices, so that layout-order mistakes surface at the call site instead of
//! silently picking the wrong axis.

mod dim;
mod errors;
mod order;
mod shape;
mod strides;

pub use dim::*;
pub use errors::*;
pub use order::*;
pub use shape::*;
pub use strides::*;

pub(crate) const INLINE_DIMS: usize = 5;

/// Reexport for use in macros
pub use smallvec::{SmallVec, smallvec};

/// Splits `extent` into `count` contiguous parts whose sizes differ by at
/// most one, returned as `(offset, size)` pairs in ascending offset order.
///
/// The parts exactly and disjointly cover `0..extent`. `count` must be in
/// `1..=extent`; anything else is a caller bug.
pub fn divide_balanced(extent: usize, count: usize) -> Vec<(usize, usize)> {
    assert!(
        count >= 1 && count <= extent,
        "cannot split extent {extent} into {count} parts"
    );
    let base = extent / count;
    let rem = extent % count;
    let mut parts = Vec::with_capacity(count);
    let mut offset = 0;
    for idx in 0..count {
        let size = if idx < rem { base + 1 } else { base };
        parts.push((offset, size));
        offset += size;
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn divide_balanced_covers_exactly() {
        let parts = divide_balanced(56, 3);
        assert_eq!(parts, vec![(0, 19), (19, 19), (38, 18)]);
        let total: usize = parts.iter().map(|(_, size)| size).sum();
        assert_eq!(total, 56);
    }

    #[test]
    #[should_panic(expected = "cannot split")]
    fn divide_balanced_rejects_oversplit() {
        divide_balanced(2, 3);
    }
}
