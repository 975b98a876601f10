// Application state for HTTP handlers
use crate::infrastructure::config::ServerConfig;

#[derive(Clone)]
pub struct AppState {
    pub config: ServerConfig,
}
