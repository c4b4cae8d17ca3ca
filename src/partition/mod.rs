//! Matrix Partitioning Module
//!
//! Splits a logical matrix into rectangular partitions and places them on shards.
//!
//! ## Core Concepts
//! - **Block sizing**: Without a hint, the block shape is derived from a per-partition
//!   element budget that depends on the element kind and the matrix size.
//! - **Tiling**: Partitions are emitted row-major and clipped at the matrix edge, so they
//!   cover the matrix exactly once.
//! - **Placement**: Partition `p` lives on shard `p mod shard_count`. The resulting
//!   `PartitionTable` is the addressing contract for every push-down call.

pub mod partitioner;
pub mod router;
pub mod types;
