//! Push-down Executor
//!
//! Runs update functions against partitions hosted by this shard.
//!
//! ## Responsibilities
//! - **Locking**: Every call holds the partition's write lock from the first read to the
//!   final commit, so concurrent calls on one partition behave like some serial order.
//! - **All-or-nothing**: Kernels build the full target image first; a failing transform
//!   leaves every row untouched.
//! - **Resolution**: Wire specs are resolved against the `FuncRegistry` before the lock
//!   is taken.

use super::func::*;
use super::registry::FuncRegistry;
use super::update;
use crate::error::{PsError, Result};
use crate::store::memory::ShardStore;

use std::sync::Arc;

/// Number of rows a zip3 call binds: three inputs and one output.
pub const ZIP3_ROW_COUNT: usize = 4;

pub struct PsfExecutor {
    store: Arc<ShardStore>,
    registry: Arc<FuncRegistry>,
}

impl PsfExecutor {
    pub fn new(store: Arc<ShardStore>, registry: Arc<FuncRegistry>) -> Arc<Self> {
        Arc::new(Self { store, registry })
    }

    pub fn store(&self) -> &Arc<ShardStore> {
        &self.store
    }

    pub fn registry(&self) -> &Arc<FuncRegistry> {
        &self.registry
    }

    /// Maps `row_id` onto itself.
    pub fn apply_map(
        &self,
        matrix_id: u32,
        partition_id: u32,
        row_id: i64,
        func: &dyn MapFunc,
    ) -> Result<()> {
        self.apply_map_into(matrix_id, partition_id, row_id, row_id, func)
    }

    /// Maps `from_row` and stores the result in `to_row`.
    pub fn apply_map_into(
        &self,
        matrix_id: u32,
        partition_id: u32,
        from_row: i64,
        to_row: i64,
        func: &dyn MapFunc,
    ) -> Result<()> {
        tracing::debug!(
            "map: matrix={} partition={} {} -> {}",
            matrix_id,
            partition_id,
            from_row,
            to_row
        );
        self.store
            .with_partition_mut(matrix_id, partition_id, |rows| {
                let kind = rows.kind;
                let image = update::map(rows.row(from_row)?, func, kind)?;
                update::commit(rows.row_mut(to_row)?, image)
            })
            .inspect_err(|e| log_failure("map", matrix_id, partition_id, e))
    }

    pub fn apply_map_with_index(
        &self,
        matrix_id: u32,
        partition_id: u32,
        from_row: i64,
        to_row: i64,
        func: &dyn MapWithIndexFunc,
    ) -> Result<()> {
        tracing::debug!(
            "map_with_index: matrix={} partition={} {} -> {}",
            matrix_id,
            partition_id,
            from_row,
            to_row
        );
        self.store
            .with_partition_mut(matrix_id, partition_id, |rows| {
                let kind = rows.kind;
                let image = update::map_with_index(rows.row(from_row)?, rows.row(to_row)?, func, kind)?;
                update::commit(rows.row_mut(to_row)?, image)
            })
            .inspect_err(|e| log_failure("map_with_index", matrix_id, partition_id, e))
    }

    /// `row_ids` are three input rows followed by the output row.
    pub fn apply_zip3_map_with_index(
        &self,
        matrix_id: u32,
        partition_id: u32,
        row_ids: [i64; ZIP3_ROW_COUNT],
        func: &dyn Zip3MapWithIndexFunc,
    ) -> Result<()> {
        tracing::debug!(
            "zip3_map_with_index: matrix={} partition={} rows={:?}",
            matrix_id,
            partition_id,
            row_ids
        );
        let [a, b, c, out] = row_ids;
        self.store
            .with_partition_mut(matrix_id, partition_id, |rows| {
                let kind = rows.kind;
                let image = update::zip3_map_with_index(
                    [rows.row(a)?, rows.row(b)?, rows.row(c)?],
                    rows.row(out)?,
                    func,
                    kind,
                )?;
                update::commit(rows.row_mut(out)?, image)
            })
            .inspect_err(|e| log_failure("zip3_map_with_index", matrix_id, partition_id, e))
    }

    pub fn apply_map_spec(
        &self,
        matrix_id: u32,
        partition_id: u32,
        from_row: i64,
        to_row: i64,
        spec: &MapFuncSpec,
    ) -> Result<()> {
        let func = self.registry.resolve_map(spec)?;
        self.apply_map_into(matrix_id, partition_id, from_row, to_row, &*func)
    }

    pub fn apply_map_with_index_spec(
        &self,
        matrix_id: u32,
        partition_id: u32,
        from_row: i64,
        to_row: i64,
        spec: &IndexMapFuncSpec,
    ) -> Result<()> {
        let func = self.registry.resolve_map_with_index(spec)?;
        self.apply_map_with_index(matrix_id, partition_id, from_row, to_row, &*func)
    }

    pub fn apply_zip3_spec(
        &self,
        matrix_id: u32,
        partition_id: u32,
        row_ids: &[i64],
        spec: &Zip3FuncSpec,
    ) -> Result<()> {
        let row_ids: [i64; ZIP3_ROW_COUNT] =
            row_ids.try_into().map_err(|_| PsError::SizeMismatch {
                expected: ZIP3_ROW_COUNT,
                actual: row_ids.len(),
            })?;
        let func = self.registry.resolve_zip3(spec)?;
        self.apply_zip3_map_with_index(matrix_id, partition_id, row_ids, &*func)
    }
}

fn log_failure(op: &str, matrix_id: u32, partition_id: u32, error: &PsError) {
    tracing::warn!(
        "{} failed on matrix {} partition {}: {}",
        op,
        matrix_id,
        partition_id,
        error
    );
}
