use axum::{
    Json,
    extract::{Extension, Path},
    http::StatusCode,
};
use std::sync::Arc;

use super::ShardNode;
use super::protocol::*;
use crate::error::{PsError, Result};

/// HTTP status for a failed call.
pub fn status_for(error: &PsError) -> StatusCode {
    match error {
        PsError::UnknownPartition { .. } | PsError::UnknownRow { .. } => StatusCode::NOT_FOUND,
        PsError::TransformFault(_) => StatusCode::UNPROCESSABLE_ENTITY,
        PsError::Config(_)
        | PsError::SizeMismatch { .. }
        | PsError::NonZeroDefault(_)
        | PsError::IndexOutOfRange(_)
        | PsError::EncodingMismatch
        | PsError::UnknownFunction(_) => StatusCode::BAD_REQUEST,
    }
}

/// Runs a lock-scoped push-down call off the async workers.
async fn run_apply<F>(op: &'static str, call: F) -> (StatusCode, Json<ApplyResponse>)
where
    F: FnOnce() -> Result<()> + Send + 'static,
{
    match tokio::task::spawn_blocking(call).await {
        Ok(Ok(())) => (
            StatusCode::OK,
            Json(ApplyResponse {
                success: true,
                error: None,
            }),
        ),
        Ok(Err(e)) => {
            tracing::error!("Failed to apply {}: {}", op, e);
            (
                status_for(&e),
                Json(ApplyResponse {
                    success: false,
                    error: Some(e.to_string()),
                }),
            )
        }
        Err(e) => {
            tracing::error!("{} task aborted: {}", op, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApplyResponse {
                    success: false,
                    error: Some(e.to_string()),
                }),
            )
        }
    }
}

pub async fn handle_create_matrix(
    Extension(node): Extension<Arc<ShardNode>>,
    Json(req): Json<CreateMatrixRequest>,
) -> (StatusCode, Json<CreateMatrixResponse>) {
    let matrix_id = req.shape.matrix_id;
    let worker = node.clone();
    let created =
        tokio::task::spawn_blocking(move || worker.create_matrix(&req.shape, &req.hint)).await;

    let created = match created {
        Ok(created) => created,
        Err(e) => {
            tracing::error!("create_matrix task aborted: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(CreateMatrixResponse {
                    table: None,
                    local_partitions: Vec::new(),
                    error: Some(e.to_string()),
                }),
            );
        }
    };

    match created {
        Ok(table) => {
            let local_partitions = node
                .router()
                .my_partitions(&table)
                .iter()
                .map(|p| p.partition_id)
                .collect();
            (
                StatusCode::OK,
                Json(CreateMatrixResponse {
                    table: Some(table.as_ref().clone()),
                    local_partitions,
                    error: None,
                }),
            )
        }
        Err(e) => {
            tracing::error!("Failed to create matrix {}: {}", matrix_id, e);
            (
                status_for(&e),
                Json(CreateMatrixResponse {
                    table: None,
                    local_partitions: Vec::new(),
                    error: Some(e.to_string()),
                }),
            )
        }
    }
}

pub async fn handle_get_table(
    Extension(node): Extension<Arc<ShardNode>>,
    Path(matrix_id): Path<u32>,
) -> (StatusCode, Json<CreateMatrixResponse>) {
    match node.table(matrix_id) {
        Some(table) => {
            let local_partitions = node
                .router()
                .my_partitions(&table)
                .iter()
                .map(|p| p.partition_id)
                .collect();
            (
                StatusCode::OK,
                Json(CreateMatrixResponse {
                    table: Some(table.as_ref().clone()),
                    local_partitions,
                    error: None,
                }),
            )
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(CreateMatrixResponse {
                table: None,
                local_partitions: Vec::new(),
                error: Some(format!("Unknown matrix {}", matrix_id)),
            }),
        ),
    }
}

pub async fn handle_drop_matrix(
    Extension(node): Extension<Arc<ShardNode>>,
    Path(matrix_id): Path<u32>,
) -> (StatusCode, Json<ApplyResponse>) {
    if node.drop_matrix(matrix_id) {
        (
            StatusCode::OK,
            Json(ApplyResponse {
                success: true,
                error: None,
            }),
        )
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(ApplyResponse {
                success: false,
                error: Some(format!("Unknown matrix {}", matrix_id)),
            }),
        )
    }
}

pub async fn handle_map(
    Extension(node): Extension<Arc<ShardNode>>,
    Json(req): Json<MapRequest>,
) -> (StatusCode, Json<ApplyResponse>) {
    let executor = node.executor().clone();
    run_apply("map", move || {
        let to_row = req.to_row.unwrap_or(req.from_row);
        executor.apply_map_spec(req.matrix_id, req.partition_id, req.from_row, to_row, &req.func)
    })
    .await
}

pub async fn handle_map_with_index(
    Extension(node): Extension<Arc<ShardNode>>,
    Json(req): Json<MapWithIndexRequest>,
) -> (StatusCode, Json<ApplyResponse>) {
    let executor = node.executor().clone();
    run_apply("map_with_index", move || {
        executor.apply_map_with_index_spec(
            req.matrix_id,
            req.partition_id,
            req.from_row,
            req.to_row,
            &req.func,
        )
    })
    .await
}

pub async fn handle_zip3_map_with_index(
    Extension(node): Extension<Arc<ShardNode>>,
    Json(req): Json<Zip3MapWithIndexRequest>,
) -> (StatusCode, Json<ApplyResponse>) {
    let executor = node.executor().clone();
    run_apply("zip3_map_with_index", move || {
        executor.apply_zip3_spec(req.matrix_id, req.partition_id, &req.row_ids, &req.func)
    })
    .await
}

pub async fn handle_get_row(
    Extension(node): Extension<Arc<ShardNode>>,
    Path((matrix_id, partition_id, row_id)): Path<(u32, u32, i64)>,
) -> (StatusCode, Json<RowResponse>) {
    match node
        .executor()
        .store()
        .read_row(matrix_id, partition_id, row_id)
    {
        Ok(row) => (StatusCode::OK, Json(RowResponse { row: Some(row) })),
        Err(e) => {
            tracing::debug!("Row read failed: {}", e);
            (status_for(&e), Json(RowResponse { row: None }))
        }
    }
}

pub async fn handle_partition_dump(
    Extension(node): Extension<Arc<ShardNode>>,
    Path((matrix_id, partition_id)): Path<(u32, u32)>,
) -> (StatusCode, Json<PartitionDumpResponse>) {
    match node
        .executor()
        .store()
        .dump_partition(matrix_id, partition_id)
    {
        Ok(rows) => (
            StatusCode::OK,
            Json(PartitionDumpResponse {
                matrix_id,
                partition_id,
                rows: rows
                    .into_iter()
                    .map(|(row_id, row)| RowEntry { row_id, row })
                    .collect(),
            }),
        ),
        Err(e) => {
            tracing::warn!("Partition dump failed: {}", e);
            (
                status_for(&e),
                Json(PartitionDumpResponse {
                    matrix_id,
                    partition_id,
                    rows: Vec::new(),
                }),
            )
        }
    }
}
