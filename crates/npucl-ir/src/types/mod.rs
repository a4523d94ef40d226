mod distributed;
mod memref;
mod sparse;

pub use distributed::*;
pub use memref::*;
pub use sparse::*;

use npucl_shape::{Shape, Strides};
use serde::{Deserialize, Serialize};

/// The closed set of buffer types an operand can carry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BufferType {
    MemRef(MemRefType),
    Distributed(DistributedBufferType),
    Sparse(SparseBufferType),
}

impl BufferType {
    /// The compact form of the type: distribution stripped, sparse parts
    /// compacted independently. Compacting an already-compact type returns it
    /// unchanged, so the operation is idempotent.
    pub fn compact_type(&self) -> BufferType {
        match self {
            BufferType::MemRef(ty) => BufferType::MemRef(ty.clone()),
            BufferType::Distributed(ty) => BufferType::MemRef(ty.compact_type()),
            BufferType::Sparse(ty) => BufferType::Sparse(ty.compact_type()),
        }
    }

    pub fn shape(&self) -> &Shape {
        match self {
            BufferType::MemRef(ty) => &ty.shape,
            BufferType::Distributed(ty) => ty.shape(),
            BufferType::Sparse(ty) => ty.data.shape(),
        }
    }

    pub fn rank(&self) -> usize {
        self.shape().rank()
    }

    /// Effective strides of the data part, in elements.
    pub fn strides(&self) -> Strides {
        match self {
            BufferType::MemRef(ty) => ty.strides(),
            BufferType::Distributed(ty) => ty.base().strides(),
            BufferType::Sparse(ty) => ty.data.strides(),
        }
    }

    pub fn size_bytes(&self) -> usize {
        match self {
            BufferType::MemRef(ty) => ty.size_bytes(),
            BufferType::Distributed(ty) => ty.base().size_bytes(),
            BufferType::Sparse(ty) => ty.size_bytes(),
        }
    }

    /// Same-kind type with a new shape, preserving layout semantics; the
    /// constructor every tile materialization goes through.
    pub fn change_shape(&self, shape: Shape) -> BufferType {
        match self {
            BufferType::MemRef(ty) => BufferType::MemRef(ty.change_shape(shape)),
            BufferType::Distributed(ty) => BufferType::Distributed(ty.change_shape(shape)),
            BufferType::Sparse(ty) => BufferType::Sparse(ty.change_shape(shape)),
        }
    }

    /// Element type of the data part.
    pub fn elem(&self) -> crate::ElemType {
        match self {
            BufferType::MemRef(ty) => ty.elem,
            BufferType::Distributed(ty) => ty.base().elem,
            BufferType::Sparse(ty) => ty.data.elem(),
        }
    }

    pub fn as_distributed(&self) -> Option<&DistributedBufferType> {
        match self {
            BufferType::Distributed(ty) => Some(ty),
            _ => None,
        }
    }

    pub fn as_memref(&self) -> Option<&MemRefType> {
        match self {
            BufferType::MemRef(ty) => Some(ty),
            _ => None,
        }
    }
}

impl From<MemRefType> for BufferType {
    fn from(ty: MemRefType) -> Self {
        BufferType::MemRef(ty)
    }
}

impl From<DistributedBufferType> for BufferType {
    fn from(ty: DistributedBufferType) -> Self {
        BufferType::Distributed(ty)
    }
}

impl From<SparseBufferType> for BufferType {
    fn from(ty: SparseBufferType) -> Self {
        BufferType::Sparse(ty)
    }
}

#[cfg(test)]
mod tests {
    use npucl_shape::{DimsOrder, shape};
    use pretty_assertions::assert_eq;

    use crate::{DistributedAttr, DistributionMode, ElemType, MemoryKind};

    use super::*;

    fn distributed() -> BufferType {
        let base = MemRefType::new(
            shape![1, 64, 56, 56],
            ElemType::F16,
            DimsOrder::nhwc(),
            MemoryKind::CmxNn,
        );
        DistributedBufferType::new(
            base,
            DistributedAttr::new(DistributionMode::SEGMENTED, Some(vec![1, 1, 2, 1]), 2),
        )
        .into()
    }

    #[test]
    fn compacting_is_idempotent() {
        let ty = distributed();
        let once = ty.compact_type();
        let twice = once.compact_type();
        assert_eq!(once, twice);
        assert!(matches!(once, BufferType::MemRef(_)));
    }

    #[test]
    fn sparse_parts_compact_consistently() {
        let data = distributed();
        let map = BufferType::MemRef(MemRefType::new(
            shape![1, 64, 56, 56],
            ElemType::I1,
            DimsOrder::nhwc(),
            MemoryKind::CmxNn,
        ));
        let sparse = BufferType::Sparse(SparseBufferType::new(data, Some(map.clone()), None));

        let compact = sparse.compact_type();
        let BufferType::Sparse(compact) = &compact else {
            panic!("sparse type lost its aggregate shape: {compact:?}");
        };
        assert!(matches!(*compact.data, BufferType::MemRef(_)));
        assert_eq!(*compact.sparsity_map.as_deref().unwrap(), map);
        assert_eq!(compact.storage_element_table, None);
    }
}
