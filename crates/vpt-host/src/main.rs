use std::net::SocketAddr;
use std::sync::Arc;

use vpt_blocks::standard_block_registry;
use vpt_controller::local::LocalController;
use vpt_controller::ControllerRegistry;
use vpt_core::config::HostConfig;
use vpt_core::model::HostName;
use vpt_exec::locks::DeviceLockCoordinator;
use vpt_graph::NavigationGraphCache;
use vpt_host::{router, HostState};
use vpt_store::memory::InMemoryStore;

#[tokio::main]
async fn main() {
    vpt_core::telemetry::init_tracing();

    let config = match HostConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!(error = %e, "host configuration failed");
            std::process::exit(1);
        }
    };

    let mut controllers = ControllerRegistry::new();
    controllers.register(Arc::new(LocalController::new("default")));

    let state = Arc::new(HostState {
        host_name: HostName::new(config.host_name.as_str()),
        store: Arc::new(InMemoryStore::new()),
        controllers,
        graph_cache: NavigationGraphCache::new(),
        blocks: Arc::new(standard_block_registry()),
        locks: DeviceLockCoordinator::new(),
        tasks: Arc::new(vpt_exec::tasks::TaskManager::new()),
        scripts_dir: std::path::PathBuf::from(&config.scripts_dir),
        http_client: reqwest::Client::new(),
    });

    let app = router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.bind_port));
    tracing::info!(%addr, "vpt-host listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind host listener");
    axum::serve(listener, app).await.expect("host server error");
}
