//! AWS SDK implementations of the adapter traits.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use aws_config::timeout::TimeoutConfig;
use aws_config::SdkConfig;
use aws_sdk_cloudfront::types::{InvalidationBatch as CloudFrontBatch, Paths};
use aws_sdk_lambda::types::InvocationType;
use aws_sdk_s3::primitives::{ByteStream, DateTime, DateTimeFormat};
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use site_deploy_core::contract::InvalidationBatch;
use site_deploy_core::file_options::{ObjectHeaders, CHECKSUM_METADATA_KEY};
use tokio::io::AsyncWriteExt;

use super::cdn::{CdnClient, InvalidationStatus};
use super::invoke::UploaderInvoker;
use super::object_store::{ObjectInfo, ObjectStore};
use super::AdapterError;

/// Matches the secondary function's maximum run time.
const UPLOADER_READ_TIMEOUT: Duration = Duration::from_secs(900);
const DELETE_BATCH_SIZE: usize = 1_000;

#[derive(Clone)]
pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
}

impl S3ObjectStore {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: aws_sdk_s3::Client::new(config),
        }
    }

    pub fn from_client(client: aws_sdk_s3::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn download_to_file(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
    ) -> Result<(), AdapterError> {
        let operation = "download object";
        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|error| {
                let service_error = error.into_service_error();
                if service_error.is_no_such_key() {
                    AdapterError::NotFound {
                        operation,
                        bucket: bucket.to_string(),
                        key: key.to_string(),
                    }
                } else {
                    AdapterError::service(operation, service_error)
                }
            })?;

        let mut file = tokio::fs::File::create(path)
            .await
            .map_err(|error| AdapterError::io(operation, path.display(), error))?;
        let mut body = response.body;
        while let Some(chunk) = body
            .try_next()
            .await
            .map_err(|error| AdapterError::service(operation, error))?
        {
            file.write_all(&chunk)
                .await
                .map_err(|error| AdapterError::io(operation, path.display(), error))?;
        }
        file.flush()
            .await
            .map_err(|error| AdapterError::io(operation, path.display(), error))?;

        Ok(())
    }

    async fn read_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, AdapterError> {
        let operation = "read object";
        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|error| {
                let service_error = error.into_service_error();
                if service_error.is_no_such_key() {
                    AdapterError::NotFound {
                        operation,
                        bucket: bucket.to_string(),
                        key: key.to_string(),
                    }
                } else {
                    AdapterError::service(operation, service_error)
                }
            })?;

        let bytes = response
            .body
            .collect()
            .await
            .map_err(|error| AdapterError::service(operation, error))?
            .into_bytes();
        Ok(bytes.to_vec())
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
    ) -> Result<Vec<ObjectInfo>, AdapterError> {
        let mut objects = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let response = self
                .client
                .list_objects_v2()
                .bucket(bucket)
                .prefix(prefix)
                .set_continuation_token(continuation_token.take())
                .send()
                .await
                .map_err(|error| AdapterError::service("list objects", error.into_service_error()))?;

            for object in response.contents() {
                let Some(key) = object.key() else {
                    continue;
                };
                objects.push(ObjectInfo {
                    key: key.to_string(),
                    size: object.size().and_then(|size| u64::try_from(size).ok()).unwrap_or(0),
                    last_modified: object.last_modified().map(DateTime::secs),
                });
            }

            match response.next_continuation_token() {
                Some(token) if response.is_truncated().unwrap_or(false) => {
                    continuation_token = Some(token.to_string());
                }
                _ => break,
            }
        }

        Ok(objects)
    }

    async fn list_top_level_prefixes(&self, bucket: &str) -> Result<Vec<String>, AdapterError> {
        let mut prefixes = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let response = self
                .client
                .list_objects_v2()
                .bucket(bucket)
                .delimiter("/")
                .set_continuation_token(continuation_token.take())
                .send()
                .await
                .map_err(|error| {
                    AdapterError::service("list top-level prefixes", error.into_service_error())
                })?;

            prefixes.extend(
                response
                    .common_prefixes()
                    .iter()
                    .filter_map(|common| common.prefix())
                    .map(str::to_string),
            );

            match response.next_continuation_token() {
                Some(token) if response.is_truncated().unwrap_or(false) => {
                    continuation_token = Some(token.to_string());
                }
                _ => break,
            }
        }

        Ok(prefixes)
    }

    async fn object_checksum(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<Option<String>, AdapterError> {
        match self.client.head_object().bucket(bucket).key(key).send().await {
            Ok(output) => Ok(output
                .metadata()
                .and_then(|metadata| metadata.get(CHECKSUM_METADATA_KEY))
                .cloned()),
            Err(error) => {
                let service_error = error.into_service_error();
                if service_error.is_not_found() {
                    Ok(None)
                } else {
                    Err(AdapterError::service("head object", service_error))
                }
            }
        }
    }

    async fn upload_file(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        headers: &ObjectHeaders,
        checksum: &str,
    ) -> Result<(), AdapterError> {
        let operation = "upload object";
        let body = ByteStream::from_path(path)
            .await
            .map_err(|error| AdapterError::service(operation, error))?;

        let mut request = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .metadata(CHECKSUM_METADATA_KEY, checksum)
            .set_cache_control(headers.cache_control.clone())
            .set_content_type(headers.content_type.clone())
            .set_content_encoding(headers.content_encoding.clone())
            .set_content_disposition(headers.content_disposition.clone())
            .set_content_language(headers.content_language.clone());

        if let Some(expires) = &headers.expires {
            let parsed = DateTime::from_str(expires, DateTimeFormat::HttpDate)
                .or_else(|_| DateTime::from_str(expires, DateTimeFormat::DateTime))
                .map_err(|error| {
                    AdapterError::service(operation, format!("invalid expires '{expires}': {error}"))
                })?;
            request = request.expires(parsed);
        }

        request
            .send()
            .await
            .map(|_| ())
            .map_err(|error| AdapterError::service(operation, error.into_service_error()))
    }

    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> Result<(), AdapterError> {
        let operation = "delete objects";

        for chunk in keys.chunks(DELETE_BATCH_SIZE) {
            let identifiers = chunk
                .iter()
                .map(|key| ObjectIdentifier::builder().key(key).build())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|error| AdapterError::service(operation, error))?;
            let delete = Delete::builder()
                .set_objects(Some(identifiers))
                .quiet(true)
                .build()
                .map_err(|error| AdapterError::service(operation, error))?;

            let output = self
                .client
                .delete_objects()
                .bucket(bucket)
                .delete(delete)
                .send()
                .await
                .map_err(|error| AdapterError::service(operation, error.into_service_error()))?;

            if let Some(first) = output.errors().first() {
                return Err(AdapterError::service(
                    operation,
                    format!(
                        "{} of {} keys failed, first {}: {}",
                        output.errors().len(),
                        chunk.len(),
                        first.key().unwrap_or_default(),
                        first.message().unwrap_or_default()
                    ),
                ));
            }
        }

        Ok(())
    }
}

pub struct LambdaUploaderInvoker {
    lambda_client: aws_sdk_lambda::Client,
    function_name: String,
}

impl LambdaUploaderInvoker {
    pub fn new(config: &SdkConfig, function_name: impl Into<String>) -> Self {
        let lambda_config = aws_sdk_lambda::config::Builder::from(config)
            .timeout_config(
                TimeoutConfig::builder()
                    .read_timeout(UPLOADER_READ_TIMEOUT)
                    .build(),
            )
            .build();

        Self {
            lambda_client: aws_sdk_lambda::Client::from_conf(lambda_config),
            function_name: function_name.into(),
        }
    }
}

#[async_trait]
impl UploaderInvoker for LambdaUploaderInvoker {
    async fn invoke_uploader(&self, payload: &[u8]) -> Result<Vec<u8>, AdapterError> {
        let operation = "invoke uploader function";
        let output = self
            .lambda_client
            .invoke()
            .function_name(&self.function_name)
            .invocation_type(InvocationType::RequestResponse)
            .set_payload(Some(payload.to_vec().into()))
            .send()
            .await
            .map_err(|error| AdapterError::service(operation, error.into_service_error()))?;

        let body = output
            .payload()
            .map(|blob| blob.as_ref().to_vec())
            .unwrap_or_default();

        if let Some(function_error) = output.function_error() {
            return Err(AdapterError::service(
                operation,
                format!(
                    "{} returned {function_error}: {}",
                    self.function_name,
                    String::from_utf8_lossy(&body)
                ),
            ));
        }

        Ok(body)
    }
}

pub struct CloudFrontCdnClient {
    client: aws_sdk_cloudfront::Client,
}

impl CloudFrontCdnClient {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: aws_sdk_cloudfront::Client::new(config),
        }
    }
}

#[async_trait]
impl CdnClient for CloudFrontCdnClient {
    async fn create_invalidation(&self, batch: &InvalidationBatch) -> Result<String, AdapterError> {
        let operation = "create invalidation";
        let quantity = i32::try_from(batch.paths.len())
            .map_err(|_| AdapterError::service(operation, "too many invalidation paths"))?;
        let paths = Paths::builder()
            .quantity(quantity)
            .set_items(Some(batch.paths.clone()))
            .build()
            .map_err(|error| AdapterError::service(operation, error))?;
        let request_batch = CloudFrontBatch::builder()
            .paths(paths)
            .caller_reference(&batch.caller_reference)
            .build()
            .map_err(|error| AdapterError::service(operation, error))?;

        let output = self
            .client
            .create_invalidation()
            .distribution_id(&batch.distribution_id)
            .invalidation_batch(request_batch)
            .send()
            .await
            .map_err(|error| AdapterError::service(operation, error.into_service_error()))?;

        output
            .invalidation()
            .map(|invalidation| invalidation.id().to_string())
            .ok_or_else(|| AdapterError::service(operation, "response did not include an invalidation"))
    }

    async fn invalidation_status(
        &self,
        distribution_id: &str,
        invalidation_id: &str,
    ) -> Result<InvalidationStatus, AdapterError> {
        let operation = "get invalidation";
        let output = self
            .client
            .get_invalidation()
            .distribution_id(distribution_id)
            .id(invalidation_id)
            .send()
            .await
            .map_err(|error| AdapterError::service(operation, error.into_service_error()))?;

        match output.invalidation().map(|invalidation| invalidation.status()) {
            Some("Completed") => Ok(InvalidationStatus::Completed),
            Some(_) => Ok(InvalidationStatus::InProgress),
            None => Err(AdapterError::service(
                operation,
                "response did not include an invalidation",
            )),
        }
    }
}
