use async_trait::async_trait;
use site_deploy_core::contract::InvalidationBatch;

use super::AdapterError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidationStatus {
    InProgress,
    Completed,
}

#[async_trait]
pub trait CdnClient: Send + Sync {
    /// Submits the batch and returns the invalidation id.
    async fn create_invalidation(&self, batch: &InvalidationBatch) -> Result<String, AdapterError>;

    async fn invalidation_status(
        &self,
        distribution_id: &str,
        invalidation_id: &str,
    ) -> Result<InvalidationStatus, AdapterError>;
}
