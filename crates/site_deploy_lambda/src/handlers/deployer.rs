//! Main custom-resource handler: deploys source archives to a bucket prefix.

use std::sync::Arc;

use serde_json::Value;
use site_deploy_core::contract::{
    parse_event, validate_deployment_request, CustomResourceEvent, DeploymentRequest, RequestType,
};
use site_deploy_core::destination::s3_url;
use site_deploy_core::identity::{
    failure_physical_id, is_create_failed_marker, resolve_physical_id,
};
use tracing::{info, warn};

use crate::adapters::callback::ResponseSender;
use crate::adapters::cdn::CdnClient;
use crate::adapters::invoke::UploaderInvoker;
use crate::adapters::object_store::ObjectStore;
use crate::config::HandlerConfig;
use crate::context::InvocationContext;
use crate::error::DeployError;
use crate::handlers::signal::{self, Phase, Signal};
use crate::pipeline::{deploy, invalidation, publish, retention};

#[derive(Clone)]
pub struct DeployerDependencies {
    pub store: Arc<dyn ObjectStore>,
    pub cdn: Arc<dyn CdnClient>,
    /// Fan-out target. Sources are published in-process when `None`.
    pub uploader: Option<Arc<dyn UploaderInvoker>>,
    pub responder: Arc<dyn ResponseSender>,
    pub config: HandlerConfig,
}

/// Runs one invocation to its single terminal signal. Only an event with no
/// readable response URL is returned as an error.
pub async fn handle_deployment_event(
    event: Value,
    context: &InvocationContext,
    dependencies: &DeployerDependencies,
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
        physical_resource_id = event.physical_resource_id.as_deref().unwrap_or_default(),
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
    dependencies: &DeployerDependencies,
) -> (Option<String>, Result<(), DeployError>) {
    if event.request_type == RequestType::Delete.as_str()
        && is_create_failed_marker(event.physical_resource_id.as_deref())
    {
        info!(
            component = "resource_protocol",
            event = "failed_create_delete_skipped",
        );
        return (event.physical_resource_id.clone(), Ok(()));
    }

    let fallback_id = failure_physical_id(
        Some(&event.request_type),
        event.physical_resource_id.as_deref(),
    );

    let request = match validate_deployment_request(event) {
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

    info!(
        component = "resource_protocol",
        event = "request_validated",
        phase = Phase::Validated.as_str(),
        physical_resource_id = %physical_resource_id,
        destination = %s3_url(&request.properties.destination_bucket, &request.properties.destination_prefix),
        previous_destination = %s3_url(&request.previous.bucket, &request.previous.prefix),
        sources = request.properties.sources.len(),
    );

    let outcome = run_isolated(request, context.clone(), dependencies.clone()).await;
    (Some(physical_resource_id), outcome)
}

/// Runs processing on its own task so that a panic still ends in a signal.
async fn run_isolated(
    request: DeploymentRequest,
    context: InvocationContext,
    dependencies: DeployerDependencies,
) -> Result<(), DeployError> {
    let task = tokio::spawn(async move {
        info!(
            component = "resource_protocol",
            event = "processing_started",
            phase = Phase::Processing.as_str(),
            request_type = request.request_type.as_str(),
        );
        match request.request_type {
            RequestType::Create | RequestType::Update => {
                deploy_request(&request, &context, &dependencies).await
            }
            RequestType::Delete => delete_request(&request, &dependencies).await,
        }
    });

    task.await.unwrap_or_else(|join_error| {
        Err(DeployError::Internal {
            message: format!("request processing did not finish: {join_error}"),
        })
    })
}

async fn deploy_request(
    request: &DeploymentRequest,
    context: &InvocationContext,
    dependencies: &DeployerDependencies,
) -> Result<(), DeployError> {
    let properties = &request.properties;
    let target = properties.publish_target();
    let store = dependencies.store.as_ref();

    deploy::deploy_sources(
        store,
        dependencies.uploader.clone(),
        &properties.sources,
        &target,
        dependencies.config.workspace_root.as_deref(),
    )
    .await?;

    if let Some(manifest) = &properties.filenames {
        publish::purge_unlisted(store, &target, manifest).await?;
    }

    let report = retention::cleanup(
        store,
        &properties.destination_bucket,
        &properties.destination_prefix,
        &request.previous.prefix,
        dependencies.config.retention,
    )
    .await;
    if !report.failed.is_empty() || !report.skipped.is_empty() {
        warn!(
            component = "deployment_retention",
            event = "cleanup_incomplete",
            deleted = ?report.deleted,
            failed = ?report.failed,
            skipped = ?report.skipped,
        );
    }

    if let Some(distribution_id) = &properties.distribution_id {
        let wait = dependencies
            .config
            .invalidation_wait
            .within(context.remaining_time());
        invalidation::invalidate(
            dependencies.cdn.as_ref(),
            distribution_id,
            properties.distribution_paths.clone(),
            Some(wait),
        )
        .await?;
    }

    Ok(())
}

async fn delete_request(
    request: &DeploymentRequest,
    dependencies: &DeployerDependencies,
) -> Result<(), DeployError> {
    let properties = &request.properties;
    let destination = s3_url(&properties.destination_bucket, &properties.destination_prefix);

    let removed = publish::remove_recursive(
        dependencies.store.as_ref(),
        &properties.destination_bucket,
        &properties.destination_prefix,
    )
    .await
    .map_err(|error| DeployError::publish(&destination, error))?;

    info!(
        component = "deployer",
        event = "destination_removed",
        destination = %destination,
        objects = removed,
    );
    Ok(())
}
