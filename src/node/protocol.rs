//! Shard Network Protocol
//!
//! Endpoints and DTOs for matrix registration and push-down calls. Transforms travel
//! as tagged JSON specs (`{"op": "scale", "factor": 2.0}`).

use crate::partition::types::{BlockHint, MatrixShape, PartitionTable};
use crate::psf::func::{IndexMapFuncSpec, MapFuncSpec, Zip3FuncSpec};
use crate::store::row::RowStore;
use serde::{Deserialize, Serialize};

// --- API Endpoints ---

pub const ENDPOINT_CREATE_MATRIX: &str = "/matrix/create";
pub const ENDPOINT_MATRIX_TABLE: &str = "/matrix/table";
pub const ENDPOINT_DROP_MATRIX: &str = "/matrix/drop";
pub const ENDPOINT_MAP: &str = "/psf/map";
pub const ENDPOINT_MAP_WITH_INDEX: &str = "/psf/map_with_index";
pub const ENDPOINT_ZIP3_MAP_WITH_INDEX: &str = "/psf/zip3_map_with_index";
pub const ENDPOINT_ROW: &str = "/row";
/// Internal endpoint for bulk inspection of one partition.
pub const ENDPOINT_PARTITION_DUMP: &str = "/internal/partition";

// --- Data Transfer Objects ---

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateMatrixRequest {
    pub shape: MatrixShape,
    #[serde(default)]
    pub hint: BlockHint,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateMatrixResponse {
    pub table: Option<PartitionTable>,
    /// Partition ids materialized on the shard that answered.
    pub local_partitions: Vec<u32>,
    pub error: Option<String>,
}

/// `to_row` defaults to `from_row`, which maps the row in place.
#[derive(Debug, Serialize, Deserialize)]
pub struct MapRequest {
    pub matrix_id: u32,
    pub partition_id: u32,
    pub from_row: i64,
    #[serde(default)]
    pub to_row: Option<i64>,
    pub func: MapFuncSpec,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MapWithIndexRequest {
    pub matrix_id: u32,
    pub partition_id: u32,
    pub from_row: i64,
    pub to_row: i64,
    pub func: IndexMapFuncSpec,
}

/// `row_ids` holds three input rows followed by the output row.
#[derive(Debug, Serialize, Deserialize)]
pub struct Zip3MapWithIndexRequest {
    pub matrix_id: u32,
    pub partition_id: u32,
    pub row_ids: Vec<i64>,
    pub func: Zip3FuncSpec,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApplyResponse {
    pub success: bool,
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RowResponse {
    pub row: Option<RowStore>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RowEntry {
    pub row_id: i64,
    pub row: RowStore,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PartitionDumpResponse {
    pub matrix_id: u32,
    pub partition_id: u32,
    pub rows: Vec<RowEntry>,
}
