use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::destination::{default_distribution_path, normalize_prefix};
use crate::file_options::FileOptionSet;

pub const DEFAULT_STANDALONE_DISTRIBUTION_PATH: &str = "/*";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestType {
    Create,
    Update,
    Delete,
}

impl RequestType {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        match raw {
            "Create" => Ok(Self::Create),
            "Update" => Ok(Self::Update),
            "Delete" => Ok(Self::Delete),
            "" => Err(ValidationError::new("invalid request: missing RequestType")),
            other => Err(ValidationError::new(format!(
                "invalid request: unsupported RequestType '{other}'"
            ))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "Create",
            Self::Update => "Update",
            Self::Delete => "Delete",
        }
    }
}

/// Correlation fields echoed back in every terminal signal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResponseTarget {
    #[serde(rename = "ResponseURL")]
    pub response_url: String,
    #[serde(rename = "StackId", default)]
    pub stack_id: String,
    #[serde(rename = "RequestId", default)]
    pub request_id: String,
    #[serde(rename = "LogicalResourceId", default)]
    pub logical_resource_id: String,
}

impl ResponseTarget {
    /// Reads the correlation fields from an event that did not deserialize,
    /// ignoring any that are not strings. `None` without a usable URL.
    pub fn from_raw(event: &Value) -> Option<Self> {
        let field = |name: &str| event.get(name).and_then(Value::as_str);
        let response_url = field("ResponseURL").filter(|url| !url.trim().is_empty())?;

        Some(Self {
            response_url: response_url.to_string(),
            stack_id: field("StackId").unwrap_or_default().to_string(),
            request_id: field("RequestId").unwrap_or_default().to_string(),
            logical_resource_id: field("LogicalResourceId").unwrap_or_default().to_string(),
        })
    }
}

/// Inbound custom-resource event before any property is interpreted.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct CustomResourceEvent {
    #[serde(rename = "RequestType", default)]
    pub request_type: String,
    #[serde(rename = "ResourceProperties", default)]
    pub resource_properties: Value,
    #[serde(rename = "OldResourceProperties", default)]
    pub old_resource_properties: Value,
    #[serde(rename = "PhysicalResourceId", default)]
    pub physical_resource_id: Option<String>,
    #[serde(flatten)]
    pub target: ResponseTarget,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceArchive {
    #[serde(rename = "BucketName")]
    pub bucket_name: String,
    #[serde(rename = "ObjectKey")]
    pub object_key: String,
}

impl SourceArchive {
    pub fn s3_url(&self) -> String {
        format!("s3://{}/{}", self.bucket_name, self.object_key)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReplaceRule {
    pub files: String,
    pub search: String,
    pub replace: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncMode {
    /// Destination prefix is made identical to the local tree.
    Mirror,
    /// Objects are added or updated, nothing is removed.
    Merge,
}

/// Destination and per-file settings shared by every source of one deployment.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishTarget {
    pub bucket: String,
    pub prefix: String,
    pub file_options: Vec<FileOptionSet>,
    pub replace_rules: Vec<ReplaceRule>,
    pub sync_mode: SyncMode,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeploymentProperties {
    pub sources: Vec<SourceArchive>,
    pub destination_bucket: String,
    pub destination_prefix: String,
    pub distribution_id: Option<String>,
    pub distribution_paths: Vec<String>,
    pub file_options: Vec<FileOptionSet>,
    pub replace_rules: Vec<ReplaceRule>,
    pub filenames: Option<SourceArchive>,
}

impl DeploymentProperties {
    pub fn publish_target(&self) -> PublishTarget {
        // Sibling sources share one prefix, so only a lone source may prune.
        let sync_mode = if self.sources.len() > 1 {
            SyncMode::Merge
        } else {
            SyncMode::Mirror
        };

        PublishTarget {
            bucket: self.destination_bucket.clone(),
            prefix: self.destination_prefix.clone(),
            file_options: self.file_options.clone(),
            replace_rules: self.replace_rules.clone(),
            sync_mode,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreviousDestination {
    pub bucket: String,
    pub prefix: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeploymentRequest {
    pub request_type: RequestType,
    pub physical_resource_id: Option<String>,
    pub properties: DeploymentProperties,
    pub previous: PreviousDestination,
    pub target: ResponseTarget,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidationProperties {
    pub distribution_id: Option<String>,
    pub distribution_paths: Vec<String>,
    pub wait_for_invalidation: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidationRequest {
    pub request_type: RequestType,
    pub physical_resource_id: Option<String>,
    pub properties: InvalidationProperties,
    pub target: ResponseTarget,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidationBatch {
    pub distribution_id: String,
    pub paths: Vec<String>,
    pub caller_reference: String,
}

impl InvalidationBatch {
    pub fn new(distribution_id: impl Into<String>, paths: Vec<String>) -> Self {
        Self {
            distribution_id: distribution_id.into(),
            paths,
            caller_reference: Uuid::new_v4().to_string(),
        }
    }
}

/// Payload sent to the secondary publish function, one per source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UploadPayload {
    #[serde(rename = "SourceBucketName")]
    pub source_bucket_name: String,
    #[serde(rename = "SourceObjectKey")]
    pub source_object_key: String,
    #[serde(rename = "DestinationBucketName")]
    pub destination_bucket_name: String,
    #[serde(rename = "DestinationBucketKeyPrefix", default)]
    pub destination_bucket_key_prefix: String,
    #[serde(rename = "FileOptions", default)]
    pub file_options: Vec<FileOptionSet>,
    #[serde(rename = "ReplaceValues", default)]
    pub replace_values: Vec<ReplaceRule>,
    #[serde(rename = "PruneStale", default = "default_prune_stale")]
    pub prune_stale: bool,
}

fn default_prune_stale() -> bool {
    true
}

impl UploadPayload {
    pub fn from_parts(source: &SourceArchive, target: &PublishTarget) -> Self {
        Self {
            source_bucket_name: source.bucket_name.clone(),
            source_object_key: source.object_key.clone(),
            destination_bucket_name: target.bucket.clone(),
            destination_bucket_key_prefix: target.prefix.clone(),
            file_options: target.file_options.clone(),
            replace_values: target.replace_rules.clone(),
            prune_stale: target.sync_mode == SyncMode::Mirror,
        }
    }

    pub fn into_parts(self) -> Result<(SourceArchive, PublishTarget), ValidationError> {
        if self.source_bucket_name.trim().is_empty() {
            return Err(missing_property("SourceBucketName"));
        }
        if self.source_object_key.trim().is_empty() {
            return Err(missing_property("SourceObjectKey"));
        }
        if self.destination_bucket_name.trim().is_empty() {
            return Err(missing_property("DestinationBucketName"));
        }
        for option_set in &self.file_options {
            option_set.parse()?;
        }

        let sync_mode = if self.prune_stale {
            SyncMode::Mirror
        } else {
            SyncMode::Merge
        };

        Ok((
            SourceArchive {
                bucket_name: self.source_bucket_name,
                object_key: self.source_object_key,
            },
            PublishTarget {
                bucket: self.destination_bucket_name,
                prefix: normalize_prefix(&self.destination_bucket_key_prefix),
                file_options: self.file_options,
                replace_rules: self.replace_values,
                sync_mode,
            },
        ))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadResponse {
    #[serde(rename = "Status")]
    pub status: bool,
    #[serde(rename = "Reason", default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl UploadResponse {
    pub fn succeeded() -> Self {
        Self {
            status: true,
            reason: None,
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            status: false,
            reason: Some(reason.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ValidationError {}

pub fn parse_event(event: Value) -> Result<CustomResourceEvent, ValidationError> {
    serde_json::from_value(event)
        .map_err(|error| ValidationError::new(format!("malformed custom resource event: {error}")))
}

pub fn validate_deployment_request(
    event: &CustomResourceEvent,
) -> Result<DeploymentRequest, ValidationError> {
    let request_type = RequestType::parse(&event.request_type)?;
    let props = properties_object(&event.resource_properties, "ResourceProperties")?;
    let props = &*props;

    let destination_bucket = required_string(props, "DestinationBucketName")?;
    let sources: Vec<SourceArchive> = match request_type {
        RequestType::Delete => optional_list(props, "Sources")?.unwrap_or_default(),
        RequestType::Create | RequestType::Update => {
            let sources: Vec<SourceArchive> =
                optional_list(props, "Sources")?.ok_or_else(|| missing_property("Sources"))?;
            for source in &sources {
                if source.bucket_name.trim().is_empty() || source.object_key.trim().is_empty() {
                    return Err(ValidationError::new(
                        "invalid request resource property Sources: BucketName and ObjectKey must be non-empty",
                    ));
                }
            }
            sources
        }
    };

    let raw_prefix = optional_string(props, "DestinationBucketKeyPrefix")?.unwrap_or_default();
    let distribution_paths = optional_list::<String>(props, "DistributionPaths")?
        .unwrap_or_else(|| vec![default_distribution_path(&raw_prefix)]);
    let destination_prefix = normalize_prefix(&raw_prefix);

    let file_options: Vec<FileOptionSet> =
        optional_list(props, "FileOptions")?.unwrap_or_default();
    for option_set in &file_options {
        option_set.parse()?;
    }

    let replace_rules: Vec<ReplaceRule> =
        optional_list(props, "ReplaceValues")?.unwrap_or_default();
    let filenames = optional_object::<SourceArchive>(props, "Filenames")?;

    let properties = DeploymentProperties {
        sources,
        destination_bucket,
        destination_prefix,
        distribution_id: optional_string(props, "DistributionId")?
            .filter(|value| !value.trim().is_empty()),
        distribution_paths,
        file_options,
        replace_rules,
        filenames,
    };

    Ok(DeploymentRequest {
        request_type,
        physical_resource_id: event.physical_resource_id.clone(),
        properties,
        previous: previous_destination(&event.old_resource_properties),
        target: event.target.clone(),
    })
}

pub fn validate_invalidation_request(
    event: &CustomResourceEvent,
) -> Result<InvalidationRequest, ValidationError> {
    let request_type = RequestType::parse(&event.request_type)?;
    let props = properties_object(&event.resource_properties, "ResourceProperties")?;
    let props = &*props;

    let wait_for_invalidation = match optional_string(props, "WaitForInvalidation")? {
        None => true,
        Some(value) => value == "true",
    };

    Ok(InvalidationRequest {
        request_type,
        physical_resource_id: event.physical_resource_id.clone(),
        properties: InvalidationProperties {
            distribution_id: optional_string(props, "DistributionId")?
                .filter(|value| !value.trim().is_empty()),
            distribution_paths: optional_list(props, "DistributionPaths")?
                .unwrap_or_else(|| vec![DEFAULT_STANDALONE_DISTRIBUTION_PATH.to_string()]),
            wait_for_invalidation,
        },
        target: event.target.clone(),
    })
}

fn previous_destination(old_properties: &Value) -> PreviousDestination {
    let field = |name: &str| {
        old_properties
            .get(name)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };

    PreviousDestination {
        bucket: field("DestinationBucketName"),
        prefix: normalize_prefix(&field("DestinationBucketKeyPrefix")),
    }
}

fn missing_property(name: &str) -> ValidationError {
    ValidationError::new(format!("missing request resource property {name}"))
}

fn invalid_property(name: &str, detail: impl std::fmt::Display) -> ValidationError {
    ValidationError::new(format!("invalid request resource property {name}: {detail}"))
}

fn properties_object<'a>(
    value: &'a Value,
    name: &str,
) -> Result<std::borrow::Cow<'a, Map<String, Value>>, ValidationError> {
    match value {
        Value::Null => Ok(std::borrow::Cow::Owned(Map::new())),
        Value::Object(map) => Ok(std::borrow::Cow::Borrowed(map)),
        _ => Err(ValidationError::new(format!(
            "invalid request: {name} must be a JSON object"
        ))),
    }
}

fn required_string(props: &Map<String, Value>, name: &str) -> Result<String, ValidationError> {
    match optional_string(props, name)? {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(missing_property(name)),
    }
}

fn optional_string(
    props: &Map<String, Value>,
    name: &str,
) -> Result<Option<String>, ValidationError> {
    match props.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.clone())),
        Some(_) => Err(invalid_property(name, "expected a string")),
    }
}

fn optional_list<T: DeserializeOwned>(
    props: &Map<String, Value>,
    name: &str,
) -> Result<Option<Vec<T>>, ValidationError> {
    match props.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(value @ Value::Array(_)) => serde_json::from_value(value.clone())
            .map(Some)
            .map_err(|error| invalid_property(name, error)),
        Some(_) => Err(invalid_property(name, "expected a list")),
    }
}

fn optional_object<T: DeserializeOwned>(
    props: &Map<String, Value>,
    name: &str,
) -> Result<Option<T>, ValidationError> {
    match props.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(value @ Value::Object(_)) => serde_json::from_value(value.clone())
            .map(Some)
            .map_err(|error| invalid_property(name, error)),
        Some(_) => Err(invalid_property(name, "expected an object")),
    }
}
