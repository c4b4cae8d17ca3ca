//! Shard Storage Module
//!
//! Holds the rows of every partition hosted by this shard.
//!
//! ## Core Concepts
//! - **Encodings**: A row is either `Dense` (contiguous buffer addressed by column offset)
//!   or `Sparse` (column key -> value map whose missing keys read as `0.0`).
//! - **Partition locking**: Each hosted partition has one `RwLock`. Writers hold it for
//!   the whole call, readers share it, so no one observes a half-written row.
//! - **Materialization**: Rows are allocated when a partition is placed on the shard and
//!   dropped together with their matrix.

pub mod memory;
pub mod row;
