// Domain models - simplified boards and the raw Grafana wire shapes
pub mod board;
pub mod grafana;
