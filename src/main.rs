use std::env;
use std::path::PathBuf;

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;

use beacon_backend::core::config::Settings;
use beacon_backend::core::logging;
use beacon_backend::server::router::router;
use beacon_backend::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = env::var("BEACON_CONFIG").ok().map(PathBuf::from);
    let settings = Settings::load(config_path.as_deref()).context("Failed to load settings")?;
    logging::init(&settings);

    let state = AppState::initialize(settings).context("Failed to initialize state")?;

    let port = env::var("PORT")
        .ok()
        .and_then(|val| val.parse::<u16>().ok())
        .unwrap_or(0);
    let bind_addr = format!("127.0.0.1:{}", port);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;
    let addr = listener.local_addr()?;

    println!("BEACON_PORT={}", addr.port());
    tracing::info!("Listening on {}", addr);

    let app: Router = router(state);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
