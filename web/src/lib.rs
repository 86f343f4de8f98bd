use log::*;
use tokio::net::TcpListener;

pub use service::AppState;

pub(crate) mod controller;
mod error;
pub(crate) mod router;
pub(crate) mod sse;

pub use error::{Error, Result};

/// Binds the configured interface and port and serves the application until the
/// listener fails.
pub async fn init_server(app_state: AppState) -> std::io::Result<()> {
    let server_url = format!(
        "{}:{}",
        app_state.config.interface(),
        app_state.config.port
    );

    let listener = TcpListener::bind(&server_url).await?;
    info!("Server starting... listening for connections on http://{server_url}");

    let router = router::define_routes(app_state);
    axum::serve(listener, router).await
}
