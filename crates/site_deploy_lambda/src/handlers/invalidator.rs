//! Standalone custom resource that only invalidates a CDN distribution.

use std::sync::Arc;

use serde_json::Value;
use site_deploy_core::contract::{
    parse_event, validate_invalidation_request, CustomResourceEvent, RequestType,
};
use site_deploy_core::identity::{failure_physical_id, resolve_physical_id};
use tracing::info;

use crate::adapters::callback::ResponseSender;
use crate::adapters::cdn::CdnClient;
use crate::context::InvocationContext;
use crate::error::DeployError;
use crate::handlers::signal::{self, Phase, Signal};
use crate::pipeline::invalidation::{self, WaitPolicy};

#[derive(Clone)]
pub struct InvalidatorDependencies {
    pub cdn: Arc<dyn CdnClient>,
    pub responder: Arc<dyn ResponseSender>,
    pub wait: WaitPolicy,
}

pub async fn handle_invalidation_event(
    event: Value,
    context: &InvocationContext,
    dependencies: &InvalidatorDependencies,
) -> Result<Signal, DeployError> {
    let event = match parse_event(event.clone()) {
        Ok(parsed) => parsed,
        Err(invalid) => {
            return signal::reject_unreadable(
                &event,
                invalid,
                context,
                dependencies.responder.as_ref(),
            )
            .await
        }
    };
    info!(
        component = "resource_protocol",
        event = "request_received",
        phase = Phase::Received.as_str(),
        request_type = %event.request_type,
        request_id = %event.target.request_id,
        logical_resource_id = %event.target.logical_resource_id,
    );

    let (physical_resource_id, outcome) = process(&event, context, dependencies).await;
    let response = signal::outcome_response(
        &outcome,
        &event.target,
        physical_resource_id.as_deref(),
        context,
    );
    Ok(signal::send(dependencies.responder.as_ref(), &event.target, response).await)
}

async fn process(
    event: &CustomResourceEvent,
    context: &InvocationContext,
    dependencies: &InvalidatorDependencies,
) -> (Option<String>, Result<(), DeployError>) {
    let fallback_id = failure_physical_id(
        Some(&event.request_type),
        event.physical_resource_id.as_deref(),
    );

    let request = match validate_invalidation_request(event) {
        Ok(request) => request,
        Err(invalid) => return (fallback_id, Err(invalid.into())),
    };
    let physical_resource_id = match resolve_physical_id(
        request.request_type,
        request.physical_resource_id.as_deref(),
    ) {
        Ok(physical_resource_id) => physical_resource_id,
        Err(invalid) => return (fallback_id, Err(invalid.into())),
    };

    let properties = &request.properties;
    let distribution_id = match (request.request_type, &properties.distribution_id) {
        (RequestType::Delete, _) | (_, None) => {
            info!(
                component = "cache_invalidator",
                event = "invalidation_skipped",
                request_type = request.request_type.as_str(),
            );
            return (Some(physical_resource_id), Ok(()));
        }
        (_, Some(distribution_id)) => distribution_id,
    };

    let wait = properties
        .wait_for_invalidation
        .then(|| dependencies.wait.within(context.remaining_time()));
    let outcome = invalidation::invalidate(
        dependencies.cdn.as_ref(),
        distribution_id,
        properties.distribution_paths.clone(),
        wait,
    )
    .await
    .map(|_| ());

    (Some(physical_resource_id), outcome)
}
