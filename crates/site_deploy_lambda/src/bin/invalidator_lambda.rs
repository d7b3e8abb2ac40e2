use std::sync::Arc;

use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;
use site_deploy_core::response::CustomResourceResponse;
use site_deploy_lambda::adapters::aws::CloudFrontCdnClient;
use site_deploy_lambda::adapters::callback::HttpResponseSender;
use site_deploy_lambda::config::HandlerConfig;
use site_deploy_lambda::context::InvocationContext;
use site_deploy_lambda::handlers::invalidator::{
    handle_invalidation_event, InvalidatorDependencies,
};
use site_deploy_lambda::telemetry::init_tracing;

async fn handle_request(
    event: LambdaEvent<Value>,
    dependencies: &InvalidatorDependencies,
) -> Result<CustomResourceResponse, Error> {
    let context = InvocationContext::from_lambda(&event.context);
    let signal = handle_invalidation_event(event.payload, &context, dependencies).await?;
    Ok(signal.response)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_tracing();

    let config = HandlerConfig::from_env()?;
    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let dependencies = InvalidatorDependencies {
        cdn: Arc::new(CloudFrontCdnClient::new(&aws_config)),
        responder: Arc::new(HttpResponseSender::new()?),
        wait: config.invalidation_wait,
    };

    let dependencies = &dependencies;
    lambda_runtime::run(service_fn(move |event| handle_request(event, dependencies))).await
}
