use std::sync::Arc;

use tracing::error;
use tracing_subscriber::EnvFilter;

use ssecast::broker::Registry;
use ssecast::config::load_config;
use ssecast::transport::http::start_http_server;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = load_config().expect("Failed to load configuration");
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let registry = Arc::new(Registry::new(config.broker.command_buffer));

    if let Err(e) = start_http_server(&addr, registry).await {
        error!(error = %e, "server exited");
        std::process::exit(1);
    }
}
