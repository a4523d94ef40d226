//! Facade over the npucl dialect crates.
//!
//! Re-exports the shape primitives, the IR types with the cluster-tiling
//! wrapper, and the tiling policy under one roof.

pub use npucl_ir as ir;
pub use npucl_shape as shape;
pub use npucl_tiling as tiling;

pub mod prelude {
    pub use npucl_ir::{
        BufferType, ClusterTilingOp, DistributedAttr, DistributedBufferType, DistributionMode,
        ElemType, Executor, MemRefType, MemoryKind, Operation, PadInfo, SparseBufferType, Value,
    };
    pub use npucl_shape::{Dim, Dims4D, DimsOrder, Shape, Strides};
    pub use npucl_tiling::{
        InputTiling, Logger, OutputTiling, TileInfo, TilingMode, TilingPlan, run_on_operation,
    };
}
