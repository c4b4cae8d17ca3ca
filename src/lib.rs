//! Parameter Shard Data Plane
//!
//! This library crate holds the storage and compute core of a sharded parameter store.
//! It serves as the foundation for the shard binary (`main.rs`).
//!
//! ## Architecture Modules
//! - **`partition`**: Cuts a matrix into rectangular partitions and places them on shards
//!   round-robin. The resulting table is the addressing scheme for everything else.
//! - **`store`**: Per-shard row storage in dense or sparse encoding, one lock per partition.
//! - **`psf`**: Push-down update functions (Map, MapWithIndex, Zip3MapWithIndex) executed
//!   against hosted rows with all-or-nothing commits.
//! - **`node`**: Matrix registration and the HTTP surface of a running shard.
//! - **`config`**: Command-line options of the shard binary.
//! - **`error`**: Error kinds shared by every module.

pub mod config;
pub mod error;
pub mod node;
pub mod partition;
pub mod psf;
pub mod store;
