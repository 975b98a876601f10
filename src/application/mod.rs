// Application layer - board flattening and query translation use cases
pub mod board_service;
pub mod datasource_resolver;
pub mod query_service;
