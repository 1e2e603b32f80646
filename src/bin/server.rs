use std::sync::Arc;

use sea_orm::Database;
use tracing_subscriber::EnvFilter;

use botpanel::server::config::ServerConfig;
use botpanel::telegram::backend::{AutomationBackend, HttpBackend};
use botpanel::web;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Arc::new(ServerConfig::from_env()?);
    let db = Database::connect(&config.database_url).await?;
    let backend: Arc<dyn AutomationBackend> =
        Arc::new(HttpBackend::new(&config.automation_backend_url));

    let app = web::create_router(db, backend, config.clone());

    tracing::info!(
        listen_addr = %config.listen_addr,
        backend_url = %config.automation_backend_url,
        "dashboard listening"
    );
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
