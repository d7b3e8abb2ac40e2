use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::contract::ResponseTarget;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResponseStatus {
    Success,
    Failed,
}

/// Body of the single terminal signal PUT to the pre-signed response URL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct CustomResourceResponse {
    pub status: ResponseStatus,
    pub reason: String,
    pub physical_resource_id: String,
    pub stack_id: String,
    pub request_id: String,
    pub logical_resource_id: String,
    pub no_echo: bool,
    pub data: Map<String, Value>,
}

impl CustomResourceResponse {
    pub fn new(
        status: ResponseStatus,
        target: &ResponseTarget,
        physical_resource_id: Option<&str>,
        reason: Option<&str>,
        log_stream_name: &str,
    ) -> Self {
        Self {
            status,
            reason: reason
                .map(str::to_string)
                .unwrap_or_else(|| default_reason(log_stream_name)),
            physical_resource_id: physical_resource_id
                .map(str::to_string)
                .unwrap_or_else(|| log_stream_name.to_string()),
            stack_id: target.stack_id.clone(),
            request_id: target.request_id.clone(),
            logical_resource_id: target.logical_resource_id.clone(),
            no_echo: false,
            data: Map::new(),
        }
    }

    pub fn to_body(&self) -> String {
        serde_json::to_string(self).expect("custom resource response should serialize")
    }
}

pub fn default_reason(log_stream_name: &str) -> String {
    format!("See the details in CloudWatch Log Stream: {log_stream_name}")
}
