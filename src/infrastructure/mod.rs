// Infrastructure layer - configuration and the Grafana HTTP client
pub mod config;
pub mod grafana;
