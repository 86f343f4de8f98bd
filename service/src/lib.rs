use config::Config;
use log::info;
use sse::Hub;

pub mod config;
pub mod logging;

/// Starts the process-wide SSE hub using the configured options.
/// Must be called from within a tokio runtime.
pub fn init_hub(config: &Config) -> Hub {
    let options = config.hub_options();
    info!(
        "SSE hub config: subscriber_buffer={}, overflow_policy={}, heartbeat={:?}",
        options.subscriber_buffer, options.overflow_policy, options.heartbeat_interval,
    );
    Hub::start(options)
}

// Service-level state shared by every request handler
// Needs to implement Clone to be able to be passed into Router as State
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub hub: Hub,
}

impl AppState {
    pub fn new(app_config: Config, hub: Hub) -> Self {
        Self {
            config: app_config,
            hub,
        }
    }

    pub fn hub(&self) -> &Hub {
        &self.hub
    }
}
