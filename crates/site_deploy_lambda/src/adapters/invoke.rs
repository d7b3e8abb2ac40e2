use async_trait::async_trait;

use super::AdapterError;

/// Synchronous (request/response) invocation of the secondary publish function.
#[async_trait]
pub trait UploaderInvoker: Send + Sync {
    async fn invoke_uploader(&self, payload: &[u8]) -> Result<Vec<u8>, AdapterError>;
}
