use tracing_subscriber::EnvFilter;

use glyphmatch_server::build_app;
use glyphmatch_server::config::ServerConfig;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = ServerConfig::load();
    config.validate();

    let listen_addr = config.listen_addr.clone();
    let (app, _state) = build_app(config);

    let listener = match tokio::net::TcpListener::bind(&listen_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(addr = %listen_addr, error = %e, "Failed to bind");
            std::process::exit(1);
        },
    };

    tracing::info!(addr = %listen_addr, "Glyphmatch server listening");
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "Server exited with error");
        std::process::exit(1);
    }
}
