// Clinic API - Server Entry Point

use std::path::Path;

use clinic_api::db;
use clinic_api::server::{router, AppState};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let db_path = std::env::var("CLINIC_DB").unwrap_or_else(|_| "clinic.db".to_string());
    let conn = db::open(Path::new(&db_path))?;
    tracing::info!(path = %db_path, "database ready");

    let app = router(AppState::new(conn));

    let addr = std::env::var("CLINIC_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "clinic api listening");

    axum::serve(listener, app).await?;
    Ok(())
}
