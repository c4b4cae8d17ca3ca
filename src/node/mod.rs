//! Shard Node Module
//!
//! Ties the partition table, the row store and the push-down executor together for one
//! running shard.
//!
//! ## Responsibilities
//! - **Registration**: Computes the partition table of a new matrix and materializes the
//!   partitions this shard owns.
//! - **API**: Exposes push-down calls, row reads and partition dumps over HTTP.

pub mod handlers;
pub mod protocol;


use crate::error::{PsError, Result};
use crate::partition::partitioner::create_partition_table;
use crate::partition::router::ShardRouter;
use crate::partition::types::{BlockHint, MatrixShape, PartitionTable};
use crate::psf::executor::PsfExecutor;

use dashmap::{DashMap, DashSet};
use dashmap::mapref::entry::Entry;
use std::sync::Arc;

pub struct ShardNode {
    router: ShardRouter,
    executor: Arc<PsfExecutor>,
    tables: DashMap<u32, Arc<PartitionTable>>,
    pending: DashSet<u32>,
}

impl ShardNode {
    pub fn new(router: ShardRouter, executor: Arc<PsfExecutor>) -> Arc<Self> {
        Arc::new(Self {
            router,
            executor,
            tables: DashMap::new(),
            pending: DashSet::new(),
        })
    }

    pub fn router(&self) -> &ShardRouter {
        &self.router
    }

    pub fn executor(&self) -> &Arc<PsfExecutor> {
        &self.executor
    }

    /// Partitions a new matrix and materializes the partitions placed on this shard.
    ///
    /// The table is fixed once created; registering the same matrix id twice is
    /// rejected. The id is reserved in `pending` while rows are allocated; the table
    /// becomes visible only after every local partition exists.
    pub fn create_matrix(&self, shape: &MatrixShape, hint: &BlockHint) -> Result<Arc<PartitionTable>> {
        let matrix_id = shape.matrix_id;
        if !self.pending.insert(matrix_id) {
            return Err(already_registered(matrix_id));
        }
        let result = self.register(shape, hint);
        self.pending.remove(&matrix_id);
        result
    }

    fn register(&self, shape: &MatrixShape, hint: &BlockHint) -> Result<Arc<PartitionTable>> {
        if self.tables.contains_key(&shape.matrix_id) {
            return Err(already_registered(shape.matrix_id));
        }

        let table = Arc::new(create_partition_table(shape, hint, self.router.shard_count())?);
        let mine = self.router.my_partitions(&table);
        for partition in &mine {
            self.executor
                .store()
                .materialize(partition, shape.element_kind);
        }

        match self.tables.entry(shape.matrix_id) {
            Entry::Occupied(_) => return Err(already_registered(shape.matrix_id)),
            Entry::Vacant(entry) => {
                entry.insert(table.clone());
            }
        }
        tracing::info!(
            "Registered matrix {}: {} partitions, {} on shard {}",
            shape.matrix_id,
            table.len(),
            mine.len(),
            self.router.local_index()
        );
        Ok(table)
    }

    pub fn table(&self, matrix_id: u32) -> Option<Arc<PartitionTable>> {
        self.tables.get(&matrix_id).map(|entry| entry.value().clone())
    }

    /// Forgets the table and every local row of `matrix_id`.
    ///
    /// A matrix still being registered has no table yet and is left alone.
    pub fn drop_matrix(&self, matrix_id: u32) -> bool {
        let existed = self.tables.remove(&matrix_id).is_some();
        if existed {
            self.executor.store().drop_matrix(matrix_id);
        }
        existed
    }

    pub fn matrix_count(&self) -> usize {
        self.tables.len()
    }
}

fn already_registered(matrix_id: u32) -> PsError {
    PsError::Config(format!("Matrix {} is already registered", matrix_id))
}
