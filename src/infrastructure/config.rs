// Server configuration loaded once at startup
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_address")]
    pub address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// When true, requests are logged through the HTTP trace layer.
    #[serde(default = "default_true")]
    pub audit_log: bool,
    #[serde(default = "default_true")]
    pub gzip_enabled: bool,
    #[serde(default)]
    pub cors_allow_all: bool,
    /// Talk straight to a Prometheus-compatible API instead of proxying
    /// through Grafana's datasource endpoints.
    #[serde(default)]
    pub prometheus_mode: bool,
    #[serde(default = "default_cors_origin")]
    pub cors_allow_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            port: default_port(),
            audit_log: true,
            gzip_enabled: true,
            cors_allow_all: false,
            prometheus_mode: false,
            cors_allow_origin: default_cors_origin(),
        }
    }
}

fn default_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    10000
}

fn default_true() -> bool {
    true
}

fn default_cors_origin() -> String {
    "http://localhost:3006".to_string()
}

/// Load `config/server.{toml,yaml,...}` if present; every key is optional.
pub fn load_server_config() -> anyhow::Result<ServerConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/server").required(false))
        .build()?;

    Ok(settings.try_deserialize()?)
}
