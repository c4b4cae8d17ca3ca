use super::row::{DenseRow, RowStore, SparseRow};
use crate::error::{PsError, Result};
use crate::partition::types::{ElementKind, Partition};

use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// `(matrix_id, partition_id)`
pub type PartitionKey = (u32, u32);

/// All rows of one partition hosted on this shard.
#[derive(Debug, Clone)]
pub struct PartitionRows {
    pub partition: Partition,
    pub kind: ElementKind,
    rows: HashMap<i64, RowStore>,
}

impl PartitionRows {
    /// Allocates every row of `partition`: zero-filled dense buffers or empty sparse maps.
    pub fn new(partition: Partition, kind: ElementKind) -> Self {
        let rows = (partition.start_row..partition.end_row)
            .map(|row_id| {
                let row = if kind.is_dense() {
                    RowStore::Dense(DenseRow::zeros(partition.start_col, partition.end_col))
                } else {
                    RowStore::Sparse(SparseRow::new(partition.start_col, partition.end_col))
                };
                (row_id, row)
            })
            .collect();
        Self {
            partition,
            kind,
            rows,
        }
    }

    pub fn row(&self, row_id: i64) -> Result<&RowStore> {
        self.rows.get(&row_id).ok_or(PsError::UnknownRow {
            partition_id: self.partition.partition_id,
            row_id,
        })
    }

    pub fn row_mut(&mut self, row_id: i64) -> Result<&mut RowStore> {
        let partition_id = self.partition.partition_id;
        self.rows
            .get_mut(&row_id)
            .ok_or(PsError::UnknownRow { partition_id, row_id })
    }

    /// Replaces a row wholesale after checking it matches the partition's layout.
    ///
    /// Incoming values are narrowed to the element kind, the same way push-down
    /// results are.
    pub fn replace_row(&mut self, row_id: i64, mut row: RowStore) -> Result<()> {
        self.check_layout(&row)?;
        row.narrow_to(self.kind);
        *self.row_mut(row_id)? = row;
        Ok(())
    }

    pub fn row_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.rows.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    fn check_layout(&self, row: &RowStore) -> Result<()> {
        if row.is_dense() != self.kind.is_dense() {
            return Err(PsError::EncodingMismatch);
        }
        if row.start_col() != self.partition.start_col {
            return Err(PsError::IndexOutOfRange(row.start_col()));
        }
        match row {
            RowStore::Dense(dense) => {
                let expected = self.partition.col_count() as usize;
                if dense.size() != expected {
                    return Err(PsError::SizeMismatch {
                        expected,
                        actual: dense.size(),
                    });
                }
            }
            RowStore::Sparse(sparse) => {
                sparse.check_default()?;
                if sparse.end_col != self.partition.end_col {
                    return Err(PsError::IndexOutOfRange(sparse.end_col));
                }
            }
        }
        Ok(())
    }
}

/// The partitions hosted by one shard.
///
/// Each partition sits behind its own `RwLock`, so calls against different
/// partitions never contend. The `DashMap` guard is released before the
/// partition lock is taken.
pub struct ShardStore {
    partitions: DashMap<PartitionKey, Arc<RwLock<PartitionRows>>>,
}

impl ShardStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Creates the rows of `partition`. A partition that already exists is kept as is.
    pub fn materialize(&self, partition: &Partition, kind: ElementKind) {
        let key = (partition.matrix_id, partition.partition_id);
        self.partitions.entry(key).or_insert_with(|| {
            tracing::debug!(
                "Materializing partition {} of matrix {} ({} rows, {:?})",
                partition.partition_id,
                partition.matrix_id,
                partition.row_count(),
                kind
            );
            Arc::new(RwLock::new(PartitionRows::new(partition.clone(), kind)))
        });
    }

    pub fn handle(&self, matrix_id: u32, partition_id: u32) -> Result<Arc<RwLock<PartitionRows>>> {
        self.partitions
            .get(&(matrix_id, partition_id))
            .map(|entry| entry.value().clone())
            .ok_or(PsError::UnknownPartition {
                matrix_id,
                partition_id,
            })
    }

    /// Runs `f` with exclusive access to the partition for the whole call.
    pub fn with_partition_mut<T>(
        &self,
        matrix_id: u32,
        partition_id: u32,
        f: impl FnOnce(&mut PartitionRows) -> Result<T>,
    ) -> Result<T> {
        let handle = self.handle(matrix_id, partition_id)?;
        let mut rows = handle.write();
        f(&mut rows)
    }

    pub fn with_partition<T>(
        &self,
        matrix_id: u32,
        partition_id: u32,
        f: impl FnOnce(&PartitionRows) -> Result<T>,
    ) -> Result<T> {
        let handle = self.handle(matrix_id, partition_id)?;
        let rows = handle.read();
        f(&rows)
    }

    /// Snapshot of one row, taken under the shared lock.
    pub fn read_row(&self, matrix_id: u32, partition_id: u32, row_id: i64) -> Result<RowStore> {
        self.with_partition(matrix_id, partition_id, |rows| rows.row(row_id).cloned())
    }

    pub fn write_row(
        &self,
        matrix_id: u32,
        partition_id: u32,
        row_id: i64,
        row: RowStore,
    ) -> Result<()> {
        self.with_partition_mut(matrix_id, partition_id, |rows| rows.replace_row(row_id, row))
    }

    /// All rows of a partition in row-id order.
    pub fn dump_partition(&self, matrix_id: u32, partition_id: u32) -> Result<Vec<(i64, RowStore)>> {
        self.with_partition(matrix_id, partition_id, |rows| {
            rows.row_ids()
                .into_iter()
                .map(|row_id| Ok((row_id, rows.row(row_id)?.clone())))
                .collect()
        })
    }

    pub fn has_partition(&self, matrix_id: u32, partition_id: u32) -> bool {
        self.partitions.contains_key(&(matrix_id, partition_id))
    }

    /// Removes every partition of `matrix_id`; returns how many were dropped.
    pub fn drop_matrix(&self, matrix_id: u32) -> usize {
        let mut dropped = 0;
        self.partitions.retain(|(matrix, _), _| {
            if *matrix == matrix_id {
                dropped += 1;
                false
            } else {
                true
            }
        });
        tracing::info!("Dropped {} partitions of matrix {}", dropped, matrix_id);
        dropped
    }

    pub fn local_partition_count(&self) -> usize {
        self.partitions.len()
    }
}

impl Default for ShardStore {
    fn default() -> Self {
        Self {
            partitions: DashMap::new(),
        }
    }
}
