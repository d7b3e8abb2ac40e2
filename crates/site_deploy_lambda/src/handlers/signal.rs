//! Terminal signal shared by the custom-resource handlers.

use serde_json::Value;
use site_deploy_core::contract::{ResponseTarget, ValidationError};
use site_deploy_core::identity::failure_physical_id;
use site_deploy_core::response::{CustomResourceResponse, ResponseStatus};
use tracing::{error, info};

use crate::adapters::callback::ResponseSender;
use crate::context::InvocationContext;
use crate::error::DeployError;

/// Lifecycle of one custom-resource invocation, as reported in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Received,
    Validated,
    Processing,
    Signaled,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Validated => "validated",
            Self::Processing => "processing",
            Self::Signaled => "signaled",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub response: CustomResourceResponse,
    pub delivered: bool,
}

/// Builds the response for a finished invocation. Failures carry the error
/// message as the reason.
pub fn outcome_response(
    outcome: &Result<(), DeployError>,
    target: &ResponseTarget,
    physical_resource_id: Option<&str>,
    context: &InvocationContext,
) -> CustomResourceResponse {
    match outcome {
        Ok(()) => CustomResourceResponse::new(
            ResponseStatus::Success,
            target,
            physical_resource_id,
            None,
            &context.log_stream_name,
        ),
        Err(failure) => {
            error!(
                component = "resource_protocol",
                event = "request_failed",
                error_kind = failure.kind().as_str(),
                error = %failure,
            );
            CustomResourceResponse::new(
                ResponseStatus::Failed,
                target,
                physical_resource_id,
                Some(&failure.to_string()),
                &context.log_stream_name,
            )
        }
    }
}

/// PUTs the response once. Delivery failures are logged, never retried.
pub async fn send(
    responder: &dyn ResponseSender,
    target: &ResponseTarget,
    response: CustomResourceResponse,
) -> Signal {
    let body = response.to_body();
    info!(
        component = "resource_protocol",
        event = "signal_sending",
        phase = Phase::Signaled.as_str(),
        status = ?response.status,
        physical_resource_id = %response.physical_resource_id,
        body = %body,
    );

    let delivered = match responder.put_response(&target.response_url, body).await {
        Ok(status_code) => {
            info!(
                component = "resource_protocol",
                event = "signal_sent",
                status_code,
            );
            true
        }
        Err(delivery_error) => {
            error!(
                component = "resource_protocol",
                event = "signal_failed",
                error = %delivery_error,
            );
            false
        }
    };

    Signal {
        response,
        delivered,
    }
}

/// Answers an event that did not deserialize. It is still signaled FAILED
/// when a response URL can be read from it; otherwise the parse error is
/// returned, as there is nowhere to report it.
pub async fn reject_unreadable(
    raw: &Value,
    invalid: ValidationError,
    context: &InvocationContext,
    responder: &dyn ResponseSender,
) -> Result<Signal, DeployError> {
    let Some(target) = ResponseTarget::from_raw(raw) else {
        return Err(invalid.into());
    };
    let raw_field = |name: &str| raw.get(name).and_then(Value::as_str);
    let physical_resource_id =
        failure_physical_id(raw_field("RequestType"), raw_field("PhysicalResourceId"));

    info!(
        component = "resource_protocol",
        event = "request_received",
        phase = Phase::Received.as_str(),
        readable = false,
    );
    let response = outcome_response(
        &Err(invalid.into()),
        &target,
        physical_resource_id.as_deref(),
        context,
    );
    Ok(send(responder, &target, response).await)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::test_helpers::RecordingResponder;

    fn target() -> ResponseTarget {
        ResponseTarget {
            response_url: "https://callback.example/signed".to_string(),
            stack_id: "stack".to_string(),
            request_id: "request".to_string(),
            logical_resource_id: "Site".to_string(),
        }
    }

    #[test]
    fn failure_reason_is_the_error_message() {
        let outcome = Err(DeployError::publish("s3://d/p/", "access denied"));
        let response = outcome_response(&outcome, &target(), Some("id"), &InvocationContext::new("stream"));

        assert_eq!(response.status, ResponseStatus::Failed);
        assert_eq!(response.reason, "failed to publish to s3://d/p/: access denied");
        assert_eq!(response.physical_resource_id, "id");
    }

    #[test]
    fn success_without_id_falls_back_to_log_stream() {
        let response = outcome_response(&Ok(()), &target(), None, &InvocationContext::new("stream"));

        assert_eq!(response.status, ResponseStatus::Success);
        assert_eq!(response.physical_resource_id, "stream");
        assert_eq!(response.reason, "See the details in CloudWatch Log Stream: stream");
    }

    #[tokio::test]
    async fn delivery_failure_is_reported_not_raised() {
        let responder = RecordingResponder::failing();
        let response = outcome_response(&Ok(()), &target(), Some("id"), &InvocationContext::new("stream"));

        let signal = send(&responder, &target(), response).await;

        assert!(!signal.delivered);
        assert_eq!(responder.sent().len(), 1);
        assert_eq!(responder.sent()[0].0, "https://callback.example/signed");
    }

    #[tokio::test]
    async fn unreadable_event_with_url_is_signaled_failed() {
        let responder = RecordingResponder::new();
        let raw = json!({
            "RequestType": "Update",
            "ResponseURL": "https://callback.example/signed",
            "PhysicalResourceId": "X",
            "StackId": null,
        });

        let signal = reject_unreadable(
            &raw,
            ValidationError::new("malformed custom resource event: bad StackId"),
            &InvocationContext::new("stream"),
            &responder,
        )
        .await
        .expect("addressable event should be signaled");

        assert!(signal.delivered);
        assert_eq!(signal.response.status, ResponseStatus::Failed);
        assert_eq!(signal.response.physical_resource_id, "X");
        assert_eq!(signal.response.reason, "malformed custom resource event: bad StackId");
        assert_eq!(responder.sent().len(), 1);
    }

    #[tokio::test]
    async fn unreadable_event_without_url_is_returned() {
        let responder = RecordingResponder::new();

        let result = reject_unreadable(
            &json!({"RequestType": "Create"}),
            ValidationError::new("malformed custom resource event"),
            &InvocationContext::new("stream"),
            &responder,
        )
        .await;

        assert!(result.is_err());
        assert!(responder.sent().is_empty());
    }
}
