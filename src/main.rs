use log::*;
use service::{config::Config, logging::Logger, AppState};

#[tokio::main]
async fn main() {
    let config = Config::new();
    Logger::init_logger(&config);

    info!(
        "Starting up SSE hub server [{}] in {} mode...",
        env!("CARGO_PKG_VERSION"),
        config.runtime_env()
    );

    let hub = service::init_hub(&config);
    let app_state = AppState::new(config, hub);

    if let Err(e) = web::init_server(app_state).await {
        error!("Failed to start server: {e}");
        std::process::exit(1);
    }
}
