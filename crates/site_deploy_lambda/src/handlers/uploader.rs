//! Secondary publish function: deploys one source per invocation on behalf
//! of the fan-out.

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;
use site_deploy_core::contract::{UploadPayload, UploadResponse, ValidationError};
use site_deploy_core::destination::s3_url;
use tracing::{error, info};

use crate::adapters::object_store::ObjectStore;
use crate::error::DeployError;
use crate::pipeline::deploy::deploy_source;

#[derive(Clone)]
pub struct UploaderDependencies {
    pub store: Arc<dyn ObjectStore>,
    pub workspace_root: Option<PathBuf>,
}

/// Never fails: every error becomes `{"Status": false, "Reason": ...}`.
pub async fn handle_upload_event(event: Value, dependencies: &UploaderDependencies) -> UploadResponse {
    match upload(event, dependencies).await {
        Ok(()) => UploadResponse::succeeded(),
        Err(failure) => {
            error!(
                component = "uploader",
                event = "upload_failed",
                error_kind = failure.kind().as_str(),
                error = %failure,
            );
            UploadResponse::failed(failure.to_string())
        }
    }
}

async fn upload(event: Value, dependencies: &UploaderDependencies) -> Result<(), DeployError> {
    let payload: UploadPayload = serde_json::from_value(event)
        .map_err(|error| ValidationError::new(format!("malformed upload payload: {error}")))?;
    let (source, target) = payload.into_parts()?;

    info!(
        component = "uploader",
        event = "upload_started",
        source = %source.s3_url(),
        destination = %s3_url(&target.bucket, &target.prefix),
        sync_mode = ?target.sync_mode,
    );

    let summary = deploy_source(
        dependencies.store.as_ref(),
        &source,
        &target,
        dependencies.workspace_root.as_deref(),
    )
    .await?;

    info!(
        component = "uploader",
        event = "upload_completed",
        source = %source.s3_url(),
        uploaded = summary.copied + summary.uploaded,
        deleted = summary.deleted,
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::test_helpers::{zip_archive, MemoryObjectStore};

    fn dependencies(store: Arc<MemoryObjectStore>) -> UploaderDependencies {
        UploaderDependencies {
            store,
            workspace_root: None,
        }
    }

    #[tokio::test]
    async fn publishes_the_payload_source() {
        let store = Arc::new(MemoryObjectStore::new());
        store.seed("assets", "a.zip", &zip_archive(&[("index.html", "hello NAME")]));
        store.seed("site", "web/stale.txt", b"old");

        let response = handle_upload_event(
            json!({
                "SourceBucketName": "assets",
                "SourceObjectKey": "a.zip",
                "DestinationBucketName": "site",
                "DestinationBucketKeyPrefix": "web",
                "ReplaceValues": [{"files": "*.html", "search": "NAME", "replace": "world"}],
            }),
            &dependencies(store.clone()),
        )
        .await;

        assert_eq!(response, UploadResponse::succeeded());
        assert_eq!(store.keys("site"), vec!["web/index.html"]);
        assert_eq!(store.body("site", "web/index.html").as_deref(), Some(&b"hello world"[..]));
    }

    #[tokio::test]
    async fn merge_payload_keeps_sibling_objects() {
        let store = Arc::new(MemoryObjectStore::new());
        store.seed("assets", "a.zip", &zip_archive(&[("a.txt", "a")]));
        store.seed("site", "b.txt", b"b");

        let response = handle_upload_event(
            json!({
                "SourceBucketName": "assets",
                "SourceObjectKey": "a.zip",
                "DestinationBucketName": "site",
                "PruneStale": false,
            }),
            &dependencies(store.clone()),
        )
        .await;

        assert!(response.status);
        assert_eq!(store.keys("site"), vec!["a.txt", "b.txt"]);
    }

    #[tokio::test]
    async fn failures_are_reported_in_the_response() {
        let store = Arc::new(MemoryObjectStore::new());

        let missing = handle_upload_event(
            json!({"SourceBucketName": "assets", "SourceObjectKey": "gone.zip", "DestinationBucketName": "site"}),
            &dependencies(store.clone()),
        )
        .await;
        assert!(!missing.status);
        assert!(missing
            .reason
            .as_deref()
            .is_some_and(|reason| reason.contains("s3://assets/gone.zip")));

        let malformed = handle_upload_event(json!({"SourceBucketName": 3}), &dependencies(store)).await;
        assert!(!malformed.status);
        assert!(malformed
            .reason
            .as_deref()
            .is_some_and(|reason| reason.starts_with("malformed upload payload")));
    }
}
