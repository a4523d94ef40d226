use core::fmt::Display;

use serde::{Deserialize, Serialize};

/// Memory space a buffer lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemoryKind {
    /// Host-visible DDR.
    Ddr,
    /// Accelerator-local scratchpad, shared by the compute clusters.
    CmxNn,
}

impl Display for MemoryKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            MemoryKind::Ddr => write!(f, "@DDR"),
            MemoryKind::CmxNn => write!(f, "@CMX_NN"),
        }
    }
}

impl MemoryKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "DDR" => Some(MemoryKind::Ddr),
            "CMX_NN" => Some(MemoryKind::CmxNn),
            _ => None,
        }
    }
}
