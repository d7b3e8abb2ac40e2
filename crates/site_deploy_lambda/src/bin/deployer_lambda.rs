use std::sync::Arc;

use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;
use site_deploy_core::response::CustomResourceResponse;
use site_deploy_lambda::adapters::aws::{CloudFrontCdnClient, LambdaUploaderInvoker, S3ObjectStore};
use site_deploy_lambda::adapters::callback::HttpResponseSender;
use site_deploy_lambda::adapters::invoke::UploaderInvoker;
use site_deploy_lambda::config::HandlerConfig;
use site_deploy_lambda::context::InvocationContext;
use site_deploy_lambda::handlers::deployer::{handle_deployment_event, DeployerDependencies};
use site_deploy_lambda::telemetry::init_tracing;

async fn handle_request(
    event: LambdaEvent<Value>,
    dependencies: &DeployerDependencies,
) -> Result<CustomResourceResponse, Error> {
    let context = InvocationContext::from_lambda(&event.context);
    let signal = handle_deployment_event(event.payload, &context, dependencies).await?;
    Ok(signal.response)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_tracing();

    let config = HandlerConfig::from_env()?;
    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let uploader = config.uploader_function_name.as_ref().map(|function_name| {
        Arc::new(LambdaUploaderInvoker::new(&aws_config, function_name.clone()))
            as Arc<dyn UploaderInvoker>
    });

    let dependencies = DeployerDependencies {
        store: Arc::new(S3ObjectStore::new(&aws_config)),
        cdn: Arc::new(CloudFrontCdnClient::new(&aws_config)),
        uploader,
        responder: Arc::new(HttpResponseSender::new()?),
        config,
    };

    let dependencies = &dependencies;
    lambda_runtime::run(service_fn(move |event| handle_request(event, dependencies))).await
}
