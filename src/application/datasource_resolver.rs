// Seam for resolving a datasource display name to its Grafana identity
use async_trait::async_trait;

use crate::domain::board::DataSourceRef;
use crate::error::ProxyError;

#[async_trait]
pub trait DatasourceResolver: Send + Sync {
    /// Look up a datasource by its display name.
    async fn resolve(&self, name: &str) -> Result<DataSourceRef, ProxyError>;
}
