use std::path::Path;

use async_trait::async_trait;
use site_deploy_core::file_options::ObjectHeaders;

use super::AdapterError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    pub key: String,
    pub size: u64,
    /// Unix epoch seconds.
    pub last_modified: Option<i64>,
}

/// Object-store operations used by the fetch, publish and retention steps.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn download_to_file(&self, bucket: &str, key: &str, path: &Path)
        -> Result<(), AdapterError>;

    async fn read_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, AdapterError>;

    /// All objects whose key starts with `prefix`, across every page.
    async fn list_objects(&self, bucket: &str, prefix: &str)
        -> Result<Vec<ObjectInfo>, AdapterError>;

    /// Top-level common prefixes (`name/`) from a `/` delimiter listing.
    async fn list_top_level_prefixes(&self, bucket: &str) -> Result<Vec<String>, AdapterError>;

    /// Content checksum recorded on upload, if the object has one.
    async fn object_checksum(&self, bucket: &str, key: &str)
        -> Result<Option<String>, AdapterError>;

    async fn upload_file(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        headers: &ObjectHeaders,
        checksum: &str,
    ) -> Result<(), AdapterError>;

    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> Result<(), AdapterError>;
}
