// Public API for integration tests and potential library usage

pub mod api;
pub mod champdup;
pub mod config;
pub mod protocol;
pub mod registry;
pub mod session;
pub mod types;
pub mod ws;

/// Shared application state handed to every route.
pub struct AppState {
    pub registry: registry::SessionRegistry,
    pub config: config::ServerConfig,
}

impl AppState {
    pub fn new(config: config::ServerConfig) -> Self {
        Self {
            registry: registry::SessionRegistry::new(),
            config,
        }
    }
}
