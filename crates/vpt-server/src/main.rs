use std::net::SocketAddr;
use std::sync::Arc;

use vpt_core::config::ServerConfig;
use vpt_exec::tasks::TaskManager;
use vpt_graph::NavigationGraphCache;
use vpt_server::{router, ServerState};
use vpt_store::memory::InMemoryStore;

#[tokio::main]
async fn main() {
    vpt_core::telemetry::init_tracing();

    let config = match ServerConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!(error = %e, "server configuration failed");
            std::process::exit(1);
        }
    };

    let state = Arc::new(ServerState {
        store: Arc::new(InMemoryStore::new()),
        graph_cache: Arc::new(NavigationGraphCache::new()),
        tasks: Arc::new(TaskManager::new()),
        scripts_dir: std::path::PathBuf::from(&config.scripts_dir),
        server_url: config.server_url.clone(),
        http_client: reqwest::Client::new(),
    });

    let app = router(state);
    let addr: SocketAddr = config.bind_addr();
    tracing::info!(%addr, "vpt-server listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind server listener");
    axum::serve(listener, app).await.expect("server error");
}
