use std::sync::Arc;

use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;
use site_deploy_core::contract::UploadResponse;
use site_deploy_lambda::adapters::aws::S3ObjectStore;
use site_deploy_lambda::config::HandlerConfig;
use site_deploy_lambda::handlers::uploader::{handle_upload_event, UploaderDependencies};
use site_deploy_lambda::telemetry::init_tracing;

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_tracing();

    let config = HandlerConfig::from_env()?;
    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let dependencies = UploaderDependencies {
        store: Arc::new(S3ObjectStore::new(&aws_config)),
        workspace_root: config.workspace_root,
    };

    let dependencies = &dependencies;
    lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| async move {
        Ok::<UploadResponse, Error>(handle_upload_event(event.payload, dependencies).await)
    }))
    .await
}
