// Identity Service - profiles and social graph, publisher of replication events

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

use daybook::{
    config::Config,
    identity::{create_identity_router, IdentityState},
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

    let state = IdentityState::new(store, queue);
    let app = create_identity_router(state).layer(CorsLayer::permissive());

    let addr: SocketAddr = config.server_address().parse()?;
    tracing::info!(%addr, "identity service listening");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
