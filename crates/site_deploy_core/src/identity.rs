use uuid::Uuid;

use crate::contract::{RequestType, ValidationError};

pub const PHYSICAL_ID_PREFIX: &str = "aws.cdk.s3deployment.";

/// Reported when a Create fails before an identity exists. The Delete issued
/// by the subsequent rollback carries this value and must not touch anything.
pub const CREATE_FAILED_PHYSICAL_ID_MARKER: &str =
    "AWSCDK::CustomResourceProviderFramework::CREATE_FAILED";

pub fn allocate_physical_id() -> String {
    format!("{PHYSICAL_ID_PREFIX}{}", Uuid::new_v4())
}

pub fn resolve_physical_id(
    request_type: RequestType,
    inbound: Option<&str>,
) -> Result<String, ValidationError> {
    match request_type {
        RequestType::Create => Ok(allocate_physical_id()),
        RequestType::Update | RequestType::Delete => match inbound {
            Some(value) if !value.trim().is_empty() => Ok(value.to_string()),
            _ => Err(ValidationError::new(format!(
                "invalid request: request type is '{}' but 'PhysicalResourceId' is not defined",
                request_type.as_str()
            ))),
        },
    }
}

pub fn is_create_failed_marker(physical_id: Option<&str>) -> bool {
    physical_id == Some(CREATE_FAILED_PHYSICAL_ID_MARKER)
}

/// Identity reported when a request fails before one is resolved: the
/// CREATE_FAILED marker for a Create, otherwise the inbound id if any.
pub fn failure_physical_id(request_type: Option<&str>, inbound: Option<&str>) -> Option<String> {
    if request_type == Some(RequestType::Create.as_str()) {
        Some(CREATE_FAILED_PHYSICAL_ID_MARKER.to_string())
    } else {
        inbound.map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_allocates_fresh_prefixed_identity() {
        let first = resolve_physical_id(RequestType::Create, Some("ignored"))
            .expect("create should allocate");
        let second = resolve_physical_id(RequestType::Create, None).expect("create should allocate");

        assert!(first.starts_with(PHYSICAL_ID_PREFIX));
        let token = &first[PHYSICAL_ID_PREFIX.len()..];
        assert!(Uuid::parse_str(token).is_ok());
        assert_ne!(first, second);
    }

    #[test]
    fn update_and_delete_echo_inbound_identity() {
        for request_type in [RequestType::Update, RequestType::Delete] {
            let resolved =
                resolve_physical_id(request_type, Some("X")).expect("identity should be echoed");
            assert_eq!(resolved, "X");
        }
    }

    #[test]
    fn update_without_identity_is_rejected() {
        let error =
            resolve_physical_id(RequestType::Update, None).expect_err("update should fail");
        assert_eq!(
            error.message(),
            "invalid request: request type is 'Update' but 'PhysicalResourceId' is not defined"
        );
        assert!(resolve_physical_id(RequestType::Delete, Some("  ")).is_err());
    }

    #[test]
    fn failure_identity_depends_on_request_type() {
        assert_eq!(
            failure_physical_id(Some("Create"), Some("X")).as_deref(),
            Some(CREATE_FAILED_PHYSICAL_ID_MARKER)
        );
        assert_eq!(failure_physical_id(Some("Update"), Some("X")).as_deref(), Some("X"));
        assert_eq!(failure_physical_id(None, None), None);
    }
}
