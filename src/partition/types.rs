use serde::{Deserialize, Serialize};

/// Element type of a matrix row, which also fixes its physical encoding.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    DenseDouble,
    DenseFloat,
    DenseInt,
    SparseDouble,
    SparseFloat,
    SparseInt,
}

impl ElementKind {
    pub fn is_dense(&self) -> bool {
        matches!(
            self,
            ElementKind::DenseDouble | ElementKind::DenseFloat | ElementKind::DenseInt
        )
    }

    /// Rounds a computed value to what a row of this kind can hold.
    ///
    /// Float kinds go through `f32`, int kinds truncate toward zero.
    pub fn narrow(&self, value: f64) -> f64 {
        match self {
            ElementKind::DenseDouble | ElementKind::SparseDouble => value,
            ElementKind::DenseFloat | ElementKind::SparseFloat => value as f32 as f64,
            ElementKind::DenseInt | ElementKind::SparseInt => value as i32 as f64,
        }
    }
}

/// Logical shape of a matrix. Immutable once the matrix exists.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatrixShape {
    pub matrix_id: u32,
    pub row_count: i64,
    pub col_count: i64,
    pub element_kind: ElementKind,
}

/// Optional caller-provided block dimensions.
///
/// `None` or `-1` in either field means both are computed automatically.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlockHint {
    #[serde(default)]
    pub max_rows_per_partition: Option<i64>,
    #[serde(default)]
    pub max_cols_per_partition: Option<i64>,
}

impl BlockHint {
    pub fn new(max_rows: i64, max_cols: i64) -> Self {
        Self {
            max_rows_per_partition: Some(max_rows),
            max_cols_per_partition: Some(max_cols),
        }
    }

    /// Returns the explicit block size if both dimensions were given.
    pub fn explicit(&self) -> Option<(i64, i64)> {
        match (self.max_rows_per_partition, self.max_cols_per_partition) {
            (Some(rows), Some(cols)) if rows != -1 && cols != -1 => Some((rows, cols)),
            _ => None,
        }
    }
}

/// A rectangular block `[start_row, end_row) x [start_col, end_col)` of a matrix.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Partition {
    pub matrix_id: u32,
    pub partition_id: u32,
    pub start_row: i64,
    pub end_row: i64,
    pub start_col: i64,
    pub end_col: i64,
}

impl Partition {
    pub fn row_count(&self) -> i64 {
        self.end_row - self.start_row
    }

    pub fn col_count(&self) -> i64 {
        self.end_col - self.start_col
    }

    pub fn contains_row(&self, row: i64) -> bool {
        row >= self.start_row && row < self.end_row
    }

    pub fn contains(&self, row: i64, col: i64) -> bool {
        self.contains_row(row) && col >= self.start_col && col < self.end_col
    }
}

/// The fixed partition table of one matrix, plus the grid it was cut from.
///
/// Created once at matrix registration and shared read-only afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PartitionTable {
    pub shape: MatrixShape,
    pub shard_count: u32,
    pub block_rows: i64,
    pub block_cols: i64,
    pub partitions: Vec<Partition>,
}

impl PartitionTable {
    /// Round-robin placement: `partition_id mod shard_count`.
    pub fn shard_index(&self, partition_id: u32) -> u32 {
        shard_index(partition_id, self.shard_count)
    }

    pub fn get(&self, partition_id: u32) -> Option<&Partition> {
        self.partitions.get(partition_id as usize)
    }

    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    /// Finds the partition owning cell `(row, col)`.
    ///
    /// The grid is regular apart from the clipped trailing bands, so the id is
    /// computed rather than searched.
    pub fn locate(&self, row: i64, col: i64) -> Option<&Partition> {
        if row < 0 || col < 0 || row >= self.shape.row_count || col >= self.shape.col_count {
            return None;
        }
        let col_bands = self.shape.col_count / self.block_cols
            + i64::from(self.shape.col_count % self.block_cols != 0);
        let id = (row / self.block_rows)
            .checked_mul(col_bands)?
            .checked_add(col / self.block_cols)?;
        let partition = self.partitions.get(usize::try_from(id).ok()?)?;
        debug_assert!(partition.contains(row, col));
        Some(partition)
    }

    /// Partitions placed on `shard`, in id order.
    pub fn partitions_for_shard(&self, shard: u32) -> Vec<&Partition> {
        self.partitions
            .iter()
            .filter(|p| self.shard_index(p.partition_id) == shard)
            .collect()
    }
}

/// Shard owning `partition_id`. Pure function of the id and the shard count.
pub fn shard_index(partition_id: u32, shard_count: u32) -> u32 {
    partition_id % shard_count
}
