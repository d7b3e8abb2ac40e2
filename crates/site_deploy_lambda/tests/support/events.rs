#![allow(dead_code)]

use serde_json::{json, Value};

pub const RESPONSE_URL: &str = "https://cloudformation-custom-resource-response.example/signed";

/// A custom-resource event with fixed correlation identifiers.
pub fn custom_resource_event(
    request_type: &str,
    physical_resource_id: Option<&str>,
    properties: Value,
    old_properties: Value,
) -> Value {
    let mut event = json!({
        "RequestType": request_type,
        "ResponseURL": RESPONSE_URL,
        "StackId": "arn:aws:cloudformation:eu-west-1:123456789012:stack/site/1",
        "RequestId": "request-1",
        "LogicalResourceId": "SiteDeployment",
        "ResourceType": "Custom::CDKBucketDeployment",
        "ResourceProperties": properties,
        "OldResourceProperties": old_properties,
    });
    if let Some(physical_resource_id) = physical_resource_id {
        event["PhysicalResourceId"] = json!(physical_resource_id);
    }
    event
}

pub fn create(properties: Value) -> Value {
    custom_resource_event("Create", None, properties, Value::Null)
}

pub fn update(physical_resource_id: &str, properties: Value, old_properties: Value) -> Value {
    custom_resource_event("Update", Some(physical_resource_id), properties, old_properties)
}

pub fn delete(physical_resource_id: &str, properties: Value) -> Value {
    custom_resource_event("Delete", Some(physical_resource_id), properties, Value::Null)
}

pub fn source(bucket: &str, key: &str) -> Value {
    json!({"BucketName": bucket, "ObjectKey": key})
}
