use super::types::*;
use crate::error::{PsError, Result};

pub const DEFAULT_PARTITION_SIZE_DENSE: i64 = 500_000;
pub const DEFAULT_PARTITION_SIZE_SPARSE_SMALL: i64 = 500_000;
pub const DEFAULT_PARTITION_SIZE_SPARSE_MEDIUM: i64 = 5_000_000;
pub const DEFAULT_PARTITION_SIZE_SPARSE_LARGE: i64 = 50_000_000;

const SPARSE_TIER_SMALL: i64 = 100_000_000;
const SPARSE_TIER_MEDIUM: i64 = 1_000_000_000;
const SPARSE_TIER_LARGE: i64 = 10_000_000_000;

/// Lower bound on columns per block when there are fewer rows than shards.
const MIN_BLOCK_COLS_FEW_ROWS: i64 = 100;

/// Number of elements a partition should hold when no hint is given.
///
/// `shard_count` must be non-zero.
pub fn default_partition_size(shape: &MatrixShape, shard_count: u32) -> Result<i64> {
    if shape.element_kind.is_dense() {
        return Ok(DEFAULT_PARTITION_SIZE_DENSE);
    }

    let total = element_count(shape)?;
    let size = if total < SPARSE_TIER_SMALL {
        DEFAULT_PARTITION_SIZE_SPARSE_SMALL
    } else if total < SPARSE_TIER_MEDIUM {
        DEFAULT_PARTITION_SIZE_SPARSE_MEDIUM
    } else if total < SPARSE_TIER_LARGE {
        DEFAULT_PARTITION_SIZE_SPARSE_LARGE
    } else {
        total / shard_count as i64 / 10
    };
    Ok(size)
}

/// Computes `(block_rows, block_cols)` for a non-empty matrix.
///
/// An explicit hint wins. Otherwise the block is derived from the default
/// partition size so that rows are spread over shards first.
pub fn block_size(shape: &MatrixShape, hint: &BlockHint, shard_count: u32) -> Result<(i64, i64)> {
    if let Some((rows, cols)) = hint.explicit() {
        if rows <= 0 || cols <= 0 {
            return Err(PsError::Config(format!(
                "Invalid block hint {}x{}",
                rows, cols
            )));
        }
        return Ok((rows, cols));
    }

    let row = shape.row_count;
    let col = shape.col_count;
    let shards = shard_count as i64;
    let part_size = default_partition_size(shape, shard_count)?;

    let (block_rows, block_cols) = if row >= shards {
        let block_rows = (row / shards).min((part_size / col).max(1)).max(1);
        let block_cols = (part_size / block_rows).min(col);
        (block_rows, block_cols)
    } else {
        let block_rows = row;
        let block_cols = (part_size / block_rows).min((col / shards).max(MIN_BLOCK_COLS_FEW_ROWS));
        (block_rows, block_cols)
    };

    Ok((block_rows.max(1), block_cols.max(1)))
}

/// Cuts the matrix into row-major partitions and records round-robin placement.
///
/// The last row band and column band are clipped to the matrix edge. Ids are
/// assigned in emission order starting at 0.
pub fn create_partition_table(
    shape: &MatrixShape,
    hint: &BlockHint,
    shard_count: u32,
) -> Result<PartitionTable> {
    validate(shape, shard_count)?;

    if shape.row_count == 0 || shape.col_count == 0 {
        tracing::debug!(
            "Matrix {} is empty ({}x{}), no partitions",
            shape.matrix_id,
            shape.row_count,
            shape.col_count
        );
        return Ok(PartitionTable {
            shape: shape.clone(),
            shard_count,
            block_rows: 1,
            block_cols: 1,
            partitions: Vec::new(),
        });
    }

    let (block_rows, block_cols) = block_size(shape, hint, shard_count)?;
    tracing::info!(
        "Matrix {}: block_rows={}, block_cols={}",
        shape.matrix_id,
        block_rows,
        block_cols
    );

    let mut partitions = Vec::new();
    let mut id: u32 = 0;
    let mut i = 0;
    while i < shape.row_count {
        let end_row = i.saturating_add(block_rows).min(shape.row_count);
        let mut j = 0;
        while j < shape.col_count {
            let end_col = j.saturating_add(block_cols).min(shape.col_count);
            partitions.push(Partition {
                matrix_id: shape.matrix_id,
                partition_id: id,
                start_row: i,
                end_row,
                start_col: j,
                end_col,
            });
            id = id.checked_add(1).ok_or_else(|| {
                PsError::Config(format!(
                    "Matrix {} needs more than {} partitions",
                    shape.matrix_id,
                    u32::MAX
                ))
            })?;
            j = end_col;
        }
        i = end_row;
    }

    tracing::debug!("Matrix {}: partition count {}", shape.matrix_id, partitions.len());

    Ok(PartitionTable {
        shape: shape.clone(),
        shard_count,
        block_rows,
        block_cols,
        partitions,
    })
}

fn validate(shape: &MatrixShape, shard_count: u32) -> Result<()> {
    if shard_count == 0 {
        return Err(PsError::Config("Shard count must be positive".to_string()));
    }
    if shape.row_count < 0 || shape.col_count < 0 {
        return Err(PsError::Config(format!(
            "Matrix {} has negative dimensions {}x{}",
            shape.matrix_id, shape.row_count, shape.col_count
        )));
    }
    element_count(shape)?;
    Ok(())
}

fn element_count(shape: &MatrixShape) -> Result<i64> {
    shape
        .row_count
        .checked_mul(shape.col_count)
        .ok_or_else(|| {
            PsError::Config(format!(
                "Matrix {} is too large: {}x{}",
                shape.matrix_id, shape.row_count, shape.col_count
            ))
        })
}
