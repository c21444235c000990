// Content Service - posts, comments, likes, pins, plus the event consumer
// that converges the local replica of identity state

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

use daybook::{
    config::Config,
    content::{create_content_router, ContentState},
    infrastructure::{InProcessQueue, MemoryStore, SqliteStore},
    infrastructure::store::KeyValueStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;

    let store: Arc<dyn KeyValueStore> = if config.database.url.starts_with("sqlite") {
        Arc::new(SqliteStore::connect(&config.database.url).await.map_err(
            |e| anyhow::anyhow!("failed to open store: {}", e),
        )?)
    } else {
        Arc::new(MemoryStore::new())
    };
    // Stands in for the managed queue transport; a real deployment wires
    // both services to the same broker behind the MessageQueue trait.
    let queue = Arc::new(InProcessQueue::new(
        Duration::from_secs(config.queue.visibility_timeout_secs),
        config.queue.max_receives,
    ));

    let state = ContentState::new(store, config.posts.daily_ttl_minutes);

    // The consumer must never share the request-handling path; it lives on
    // its own task for the life of the process.
    let consumer = state.consumer(
        queue,
        config.queue.max_batch_size,
        Duration::from_secs(config.queue.wait_seconds),
    );
    let _consumer_task = consumer.spawn();

    let app = create_content_router(state).layer(CorsLayer::permissive());

    let addr: SocketAddr = config.server_address().parse()?;
    tracing::info!(%addr, "content service listening");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
