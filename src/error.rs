use thiserror::Error;

/// Errors surfaced by the partitioner and the push-down engine.
///
/// Every variant is local to one call against one partition; nothing here is
/// retried by the shard.
#[derive(Error, Debug)]
pub enum PsError {
    /// Invalid matrix metadata or shard count.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The partition is not hosted on this shard.
    #[error("Unknown partition {partition_id} of matrix {matrix_id}")]
    UnknownPartition { matrix_id: u32, partition_id: u32 },

    /// The row id is outside the partition or was never materialized.
    #[error("Unknown row {row_id} in partition {partition_id}")]
    UnknownRow { partition_id: u32, row_id: i64 },

    /// Dense rows bound to one call have different lengths.
    #[error("Row size mismatch: expected {expected}, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    /// A sparse row whose missing-key value is not `0.0`.
    #[error("Sparse row default value must be 0.0, got {0}")]
    NonZeroDefault(f64),

    /// A column key does not fit the transform's index domain.
    #[error("Column index {0} does not fit the transform index range")]
    IndexOutOfRange(i64),

    /// Dense and sparse rows mixed in one call.
    #[error("Rows bound to one call must share an encoding")]
    EncodingMismatch,

    /// A `Named` transform that no one registered.
    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    /// The transform returned an error; no row was mutated.
    #[error("Transform fault: {0}")]
    TransformFault(#[source] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, PsError>;
