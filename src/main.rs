use axum::{
    Router,
    extract::Extension,
    routing::{get, post},
};
use clap::Parser;
use param_shard::config::ShardArgs;
use param_shard::node::ShardNode;
use param_shard::node::handlers::*;
use param_shard::node::protocol::*;
use param_shard::psf::executor::PsfExecutor;
use param_shard::psf::registry::FuncRegistry;
use param_shard::store::memory::ShardStore;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = ShardArgs::parse();

    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .init();

    let router = args.router()?;
    tracing::info!(
        "Starting shard {} of {} on {}",
        router.local_index(),
        router.shard_count(),
        args.bind
    );

    // 1. Storage and push-down engine:
    let store = ShardStore::new();
    let registry = FuncRegistry::new();
    let executor = PsfExecutor::new(store, registry);
    let node = ShardNode::new(router, executor);

    // 2. HTTP Router:
    let app = Router::new()
        .route(ENDPOINT_CREATE_MATRIX, post(handle_create_matrix))
        .route(&format!("{}/:matrix", ENDPOINT_MATRIX_TABLE), get(handle_get_table))
        .route(&format!("{}/:matrix", ENDPOINT_DROP_MATRIX), post(handle_drop_matrix))
        .route(ENDPOINT_MAP, post(handle_map))
        .route(ENDPOINT_MAP_WITH_INDEX, post(handle_map_with_index))
        .route(ENDPOINT_ZIP3_MAP_WITH_INDEX, post(handle_zip3_map_with_index))
        .route(
            &format!("{}/:matrix/:partition/:row", ENDPOINT_ROW),
            get(handle_get_row),
        )
        .route(
            &format!("{}/:matrix/:partition", ENDPOINT_PARTITION_DUMP),
            get(handle_partition_dump),
        )
        .layer(Extension(node.clone()));

    // 3. Spawn stats reporter:
    let stats_node = node.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(30));

        loop {
            interval.tick().await;
            tracing::info!(
                "Shard stats: {} matrices, {} local partitions",
                stats_node.matrix_count(),
                stats_node.executor().store().local_partition_count()
            );
        }
    });

    // 4. Start HTTP server:
    tracing::info!("HTTP server listening on {}", args.bind);

    let listener = tokio::net::TcpListener::bind(args.bind).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
