use serde::{Deserialize, Serialize};

use crate::BufferType;

/// Aggregate of up to three co-distributed buffers: the data itself, a 1-bit
/// sparsity map and a storage-element table.
///
/// Each part may independently be plain or distributed; absent parts stay
/// absent through every transformation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SparseBufferType {
    pub data: Box<BufferType>,
    pub sparsity_map: Option<Box<BufferType>>,
    pub storage_element_table: Option<Box<BufferType>>,
}

impl SparseBufferType {
    pub fn new(
        data: BufferType,
        sparsity_map: Option<BufferType>,
        storage_element_table: Option<BufferType>,
    ) -> Self {
        assert!(
            !matches!(data, BufferType::Sparse(_)),
            "sparse buffer parts cannot nest"
        );
        Self {
            data: Box::new(data),
            sparsity_map: sparsity_map.map(Box::new),
            storage_element_table: storage_element_table.map(Box::new),
        }
    }

    /// Compacts every present part independently; `None` parts remain `None`.
    pub fn compact_type(&self) -> SparseBufferType {
        let compact_part = |part: &BufferType| Box::new(part.compact_type());
        SparseBufferType {
            data: compact_part(&self.data),
            sparsity_map: self.sparsity_map.as_deref().map(compact_part),
            storage_element_table: self.storage_element_table.as_deref().map(compact_part),
        }
    }

    /// Changes the shape of every present part consistently.
    pub fn change_shape(&self, shape: npucl_shape::Shape) -> SparseBufferType {
        SparseBufferType {
            data: Box::new(self.data.change_shape(shape.clone())),
            sparsity_map: self
                .sparsity_map
                .as_deref()
                .map(|part| Box::new(part.change_shape(shape.clone()))),
            storage_element_table: self
                .storage_element_table
                .as_deref()
                .map(|part| Box::new(part.change_shape(shape.clone()))),
        }
    }

    pub fn rank(&self) -> usize {
        self.data.rank()
    }

    pub fn size_bytes(&self) -> usize {
        self.data.size_bytes()
            + self
                .sparsity_map
                .as_ref()
                .map_or(0, |part| part.size_bytes())
            + self
                .storage_element_table
                .as_ref()
                .map_or(0, |part| part.size_bytes())
    }
}
