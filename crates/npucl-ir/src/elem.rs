use core::fmt::Display;
use core::hash::Hash;

use float_ord::FloatOrd;
use serde::{Deserialize, Serialize};

/// Element type of a buffer.
///
/// Widths are metadata only; no host-side arithmetic is performed on the
/// elements themselves. `I1` exists for sparsity maps, which is why footprint
/// math works in bits and rounds up to bytes at the end.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ElemType {
    F32,
    F16,
    BF16,
    I64,
    I32,
    I8,
    U8,
    I1,
    /// Quantized unsigned 8-bit storage. The scale and zero point are pure
    /// metadata: casting between two `QuantU8` types never moves an element.
    QuantU8 { scale: f64, zero_point: i64 },
}

impl Eq for ElemType {}

impl Hash for ElemType {
    fn hash<H: core::hash::Hasher>(&self, state: &mut H) {
        core::mem::discriminant(self).hash(state);
        if let ElemType::QuantU8 { scale, zero_point } = self {
            // `f64` isn't `Hash`; `FloatOrd` gives a total order consistent
            // with the manual `Eq` above.
            FloatOrd(*scale).hash(state);
            zero_point.hash(state);
        }
    }
}

impl ElemType {
    pub fn size_bits(&self) -> usize {
        match self {
            ElemType::F32 => 32,
            ElemType::F16 => 16,
            ElemType::BF16 => 16,
            ElemType::I64 => 64,
            ElemType::I32 => 32,
            ElemType::I8 => 8,
            ElemType::U8 => 8,
            ElemType::I1 => 1,
            ElemType::QuantU8 { .. } => 8,
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self, ElemType::F32 | ElemType::F16 | ElemType::BF16)
    }

    pub fn is_quantized(&self) -> bool {
        matches!(self, ElemType::QuantU8 { .. })
    }

    /// Whether a metadata-only cast between `self` and `other` is legal:
    /// the storage width must match and neither side may be a float.
    pub fn castable_to(&self, other: &ElemType) -> bool {
        !self.is_float() && !other.is_float() && self.size_bits() == other.size_bits()
    }
}

impl Display for ElemType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ElemType::F32 => write!(f, "f32"),
            ElemType::F16 => write!(f, "f16"),
            ElemType::BF16 => write!(f, "bf16"),
            ElemType::I64 => write!(f, "i64"),
            ElemType::I32 => write!(f, "i32"),
            ElemType::I8 => write!(f, "i8"),
            ElemType::U8 => write!(f, "u8"),
            ElemType::I1 => write!(f, "i1"),
            ElemType::QuantU8 { scale, zero_point } => {
                // `{:?}` prints the shortest representation that parses back
                // to the same bits, which the textual round trip relies on.
                write!(f, "!quant<{scale:?}, {zero_point}>")
            }
        }
    }
}
