//! In-memory doubles for the adapter traits, shared by unit and integration
//! tests.

use std::collections::BTreeMap;
use std::io::{Cursor, Write};
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;
use site_deploy_core::contract::{InvalidationBatch, UploadPayload, UploadResponse};
use site_deploy_core::file_options::{content_checksum, ObjectHeaders};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::adapters::callback::ResponseSender;
use crate::adapters::cdn::{CdnClient, InvalidationStatus};
use crate::adapters::invoke::UploaderInvoker;
use crate::adapters::object_store::{ObjectInfo, ObjectStore};
use crate::adapters::AdapterError;
use crate::handlers::uploader::{handle_upload_event, UploaderDependencies};

/// Builds a zip archive from `(path, content)` pairs.
///
/// # Panics
///
/// Panics if the in-memory writer fails (should never happen).
pub fn zip_archive(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    for (path, content) in entries {
        writer.start_file(*path, options).expect("zip entry should start");
        writer
            .write_all(content.as_bytes())
            .expect("zip entry should be written");
    }
    writer.finish().expect("zip should finish").into_inner()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub headers: ObjectHeaders,
    pub checksum: Option<String>,
    pub last_modified: Option<i64>,
}

#[derive(Default)]
struct StoreState {
    objects: BTreeMap<(String, String), StoredObject>,
    calls: Vec<String>,
    uploads: usize,
    clock: i64,
    download_failure: Option<String>,
    prefix_listing_failure: Option<String>,
    delete_failure_prefixes: Vec<String>,
    listing_failure_prefixes: Vec<String>,
}

/// Object store keyed by `(bucket, key)` that records every call.
#[derive(Default)]
pub struct MemoryObjectStore {
    state: Mutex<StoreState>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, bucket: &str, key: &str, body: &[u8]) {
        let mut state = self.state.lock().expect("store lock");
        state.clock += 1;
        let last_modified = state.clock;
        state.objects.insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                body: body.to_vec(),
                headers: ObjectHeaders::default(),
                checksum: Some(content_checksum(body)),
                last_modified: Some(last_modified),
            },
        );
    }

    pub fn seed_at(&self, bucket: &str, key: &str, body: &[u8], last_modified: i64) {
        self.seed(bucket, key, body);
        let mut state = self.state.lock().expect("store lock");
        if let Some(object) = state.objects.get_mut(&(bucket.to_string(), key.to_string())) {
            object.last_modified = Some(last_modified);
        }
    }

    /// Sorted keys currently stored in `bucket`.
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        let state = self.state.lock().expect("store lock");
        state
            .objects
            .keys()
            .filter(|(stored_bucket, _)| stored_bucket == bucket)
            .map(|(_, key)| key.clone())
            .collect()
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        let state = self.state.lock().expect("store lock");
        state
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    pub fn body(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.object(bucket, key).map(|object| object.body)
    }

    pub fn upload_count(&self) -> usize {
        self.state.lock().expect("store lock").uploads
    }

    /// Operation names in call order, e.g. `list_objects`.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().expect("store lock").calls.clone()
    }

    pub fn fail_downloads(&self, message: &str) {
        self.state.lock().expect("store lock").download_failure = Some(message.to_string());
    }

    pub fn fail_prefix_listings(&self, message: &str) {
        self.state.lock().expect("store lock").prefix_listing_failure = Some(message.to_string());
    }

    pub fn fail_deletes_under(&self, prefix: &str) {
        self.state
            .lock()
            .expect("store lock")
            .delete_failure_prefixes
            .push(prefix.to_string());
    }

    /// Fails `list_objects` for any prefix inside `prefix`.
    pub fn fail_listings_under(&self, prefix: &str) {
        self.state
            .lock()
            .expect("store lock")
            .listing_failure_prefixes
            .push(prefix.to_string());
    }

    fn record(&self, operation: &str) {
        self.state
            .lock()
            .expect("store lock")
            .calls
            .push(operation.to_string());
    }

    fn fetch(&self, operation: &'static str, bucket: &str, key: &str) -> Result<Vec<u8>, AdapterError> {
        let state = self.state.lock().expect("store lock");
        if let Some(message) = &state.download_failure {
            return Err(AdapterError::service(operation, message));
        }
        state
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .map(|object| object.body.clone())
            .ok_or_else(|| AdapterError::NotFound {
                operation,
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn download_to_file(&self, bucket: &str, key: &str, path: &Path) -> Result<(), AdapterError> {
        self.record("download_to_file");
        let body = self.fetch("download object", bucket, key)?;
        std::fs::write(path, body).map_err(|error| AdapterError::io("download object", path.display(), error))
    }

    async fn read_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, AdapterError> {
        self.record("read_object");
        self.fetch("read object", bucket, key)
    }

    async fn list_objects(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectInfo>, AdapterError> {
        self.record("list_objects");
        let state = self.state.lock().expect("store lock");
        if state
            .listing_failure_prefixes
            .iter()
            .any(|failing| prefix.starts_with(failing.as_str()))
        {
            return Err(AdapterError::service("list objects", format!("access denied for {prefix}")));
        }
        Ok(state
            .objects
            .iter()
            .filter(|((stored_bucket, key), _)| stored_bucket == bucket && key.starts_with(prefix))
            .map(|((_, key), object)| ObjectInfo {
                key: key.clone(),
                size: object.body.len() as u64,
                last_modified: object.last_modified,
            })
            .collect())
    }

    async fn list_top_level_prefixes(&self, bucket: &str) -> Result<Vec<String>, AdapterError> {
        self.record("list_top_level_prefixes");
        let state = self.state.lock().expect("store lock");
        if let Some(message) = &state.prefix_listing_failure {
            return Err(AdapterError::service("list top-level prefixes", message));
        }
        let mut prefixes: Vec<String> = state
            .objects
            .keys()
            .filter(|(stored_bucket, _)| stored_bucket == bucket)
            .filter_map(|(_, key)| key.split_once('/').map(|(top, _)| format!("{top}/")))
            .collect();
        prefixes.dedup();
        Ok(prefixes)
    }

    async fn object_checksum(&self, bucket: &str, key: &str) -> Result<Option<String>, AdapterError> {
        self.record("object_checksum");
        let state = self.state.lock().expect("store lock");
        Ok(state
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .and_then(|object| object.checksum.clone()))
    }

    async fn upload_file(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        headers: &ObjectHeaders,
        checksum: &str,
    ) -> Result<(), AdapterError> {
        self.record("upload_file");
        let body = std::fs::read(path).map_err(|error| AdapterError::io("upload object", path.display(), error))?;
        let mut state = self.state.lock().expect("store lock");
        state.clock += 1;
        state.uploads += 1;
        let last_modified = state.clock;
        state.objects.insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                body,
                headers: headers.clone(),
                checksum: Some(checksum.to_string()),
                last_modified: Some(last_modified),
            },
        );
        Ok(())
    }

    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> Result<(), AdapterError> {
        self.record("delete_objects");
        let mut state = self.state.lock().expect("store lock");
        if let Some(key) = keys.iter().find(|key| {
            state
                .delete_failure_prefixes
                .iter()
                .any(|prefix| key.starts_with(prefix.as_str()))
        }) {
            return Err(AdapterError::service("delete objects", format!("access denied for {key}")));
        }
        for key in keys {
            state.objects.remove(&(bucket.to_string(), key.clone()));
        }
        Ok(())
    }
}

enum InvokerBehavior {
    Succeed,
    FailFor { object_key: String, reason: String },
    Delegate(UploaderDependencies),
}

/// Uploader double that records every payload it receives.
pub struct RecordingInvoker {
    behavior: InvokerBehavior,
    payloads: Mutex<Vec<UploadPayload>>,
}

impl RecordingInvoker {
    pub fn succeeding() -> Self {
        Self::with_behavior(InvokerBehavior::Succeed)
    }

    /// Reports failure for the source whose object key is `object_key`.
    pub fn failing_for(object_key: &str, reason: &str) -> Self {
        Self::with_behavior(InvokerBehavior::FailFor {
            object_key: object_key.to_string(),
            reason: reason.to_string(),
        })
    }

    /// Runs the real uploader handler against `dependencies`.
    pub fn delegating(dependencies: UploaderDependencies) -> Self {
        Self::with_behavior(InvokerBehavior::Delegate(dependencies))
    }

    fn with_behavior(behavior: InvokerBehavior) -> Self {
        Self {
            behavior,
            payloads: Mutex::new(Vec::new()),
        }
    }

    pub fn payloads(&self) -> Vec<UploadPayload> {
        self.payloads.lock().expect("payload lock").clone()
    }
}

#[async_trait]
impl UploaderInvoker for RecordingInvoker {
    async fn invoke_uploader(&self, payload: &[u8]) -> Result<Vec<u8>, AdapterError> {
        let decoded: UploadPayload = serde_json::from_slice(payload)
            .map_err(|error| AdapterError::service("invoke uploader function", error))?;
        self.payloads.lock().expect("payload lock").push(decoded.clone());

        let response = match &self.behavior {
            InvokerBehavior::Succeed => UploadResponse::succeeded(),
            InvokerBehavior::FailFor { object_key, reason } if *object_key == decoded.source_object_key => {
                UploadResponse::failed(reason.clone())
            }
            InvokerBehavior::FailFor { .. } => UploadResponse::succeeded(),
            InvokerBehavior::Delegate(dependencies) => {
                let event: Value = serde_json::from_slice(payload)
                    .map_err(|error| AdapterError::service("invoke uploader function", error))?;
                handle_upload_event(event, dependencies).await
            }
        };
        serde_json::to_vec(&response).map_err(|error| AdapterError::service("invoke uploader function", error))
    }
}

/// CDN double whose invalidations complete after a fixed number of polls.
pub struct FakeCdn {
    polls_until_complete: usize,
    create_failure: Option<String>,
    batches: Mutex<Vec<InvalidationBatch>>,
    polls: Mutex<usize>,
}

impl FakeCdn {
    pub fn completing_after(polls_until_complete: usize) -> Self {
        Self {
            polls_until_complete,
            create_failure: None,
            batches: Mutex::new(Vec::new()),
            polls: Mutex::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            create_failure: Some(message.to_string()),
            ..Self::completing_after(0)
        }
    }

    pub fn batches(&self) -> Vec<InvalidationBatch> {
        self.batches.lock().expect("batch lock").clone()
    }

    pub fn status_polls(&self) -> usize {
        *self.polls.lock().expect("poll lock")
    }
}

#[async_trait]
impl CdnClient for FakeCdn {
    async fn create_invalidation(&self, batch: &InvalidationBatch) -> Result<String, AdapterError> {
        if let Some(message) = &self.create_failure {
            return Err(AdapterError::service("create invalidation", message));
        }
        let mut batches = self.batches.lock().expect("batch lock");
        batches.push(batch.clone());
        Ok(format!("I{}", batches.len()))
    }

    async fn invalidation_status(
        &self,
        _distribution_id: &str,
        _invalidation_id: &str,
    ) -> Result<InvalidationStatus, AdapterError> {
        let mut polls = self.polls.lock().expect("poll lock");
        *polls += 1;
        if *polls >= self.polls_until_complete {
            Ok(InvalidationStatus::Completed)
        } else {
            Ok(InvalidationStatus::InProgress)
        }
    }
}

/// Response sender that keeps every PUT it was asked to deliver.
#[derive(Default)]
pub struct RecordingResponder {
    fail: bool,
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingResponder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// `(url, body)` pairs in send order.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().expect("responder lock").clone()
    }

    /// Parsed bodies in send order.
    ///
    /// # Panics
    ///
    /// Panics if a body is not JSON.
    pub fn bodies(&self) -> Vec<Value> {
        self.sent()
            .into_iter()
            .map(|(_, body)| serde_json::from_str(&body).expect("response body should be json"))
            .collect()
    }
}

#[async_trait]
impl ResponseSender for RecordingResponder {
    async fn put_response(&self, url: &str, body: String) -> Result<u16, AdapterError> {
        self.sent
            .lock()
            .expect("responder lock")
            .push((url.to_string(), body));
        if self.fail {
            return Err(AdapterError::service("put custom resource response", "connection reset"));
        }
        Ok(200)
    }
}
