//! Push-down Update Function Module
//!
//! Executes caller-supplied numeric transforms where the partition lives instead of
//! shipping rows to the caller.
//!
//! ## Call Shapes
//! - **Map**: `(value) -> value` over one row, written back to itself or to a target row.
//! - **MapWithIndex**: `(column, value) -> value` from one row into another.
//! - **Zip3MapWithIndex**: `(column, v1, v2, v3) -> value` from three rows into a fourth.
//!
//! ## Submodules
//! - **`func`**: Transform traits and their serializable wire specs.
//! - **`registry`**: Named user transforms, resolved from `Named { name }` specs.
//! - **`update`**: One dense and one sparse kernel per call shape.
//! - **`executor`**: Lock-scoped, all-or-nothing execution against the `ShardStore`.

pub mod executor;
pub mod func;
pub mod registry;
pub mod update;

#[cfg(test)]
mod tests;
