use std::path::Path;
use std::sync::Arc;

use site_deploy_core::contract::{PublishTarget, SourceArchive};
use site_deploy_core::destination::s3_url;
use tracing::info;

use crate::adapters::invoke::UploaderInvoker;
use crate::adapters::object_store::ObjectStore;
use crate::error::DeployError;
use crate::pipeline::publish::{publish, PublishSummary};
use crate::pipeline::workspace::Workspace;
use crate::pipeline::{archive, fanout, rewrite};

/// Fetches, rewrites and publishes one source archive inside a private
/// workspace that is removed on return.
pub async fn deploy_source(
    store: &dyn ObjectStore,
    source: &SourceArchive,
    target: &PublishTarget,
    workspace_root: Option<&Path>,
) -> Result<PublishSummary, DeployError> {
    let workspace = Workspace::create(workspace_root)
        .map_err(|error| DeployError::fetch(source.s3_url(), format!("failed to create workspace: {error}")))?;

    let contents = archive::fetch_and_extract(store, source, &workspace).await?;

    if !target.replace_rules.is_empty() {
        let rules = target.replace_rules.clone();
        let directory = contents.clone();
        tokio::task::spawn_blocking(move || rewrite::apply(&directory, &rules))
            .await
            .map_err(|error| DeployError::rewrite(contents.display(), format!("rewrite task failed: {error}")))??;
    }

    publish(store, &contents, target).await
}

/// Publishes every source to the target: through the uploader function when
/// one is configured, otherwise one after another in this process.
pub async fn deploy_sources(
    store: &dyn ObjectStore,
    uploader: Option<Arc<dyn UploaderInvoker>>,
    sources: &[SourceArchive],
    target: &PublishTarget,
    workspace_root: Option<&Path>,
) -> Result<(), DeployError> {
    info!(
        component = "deployer",
        event = "sources_publishing",
        destination = %s3_url(&target.bucket, &target.prefix),
        sources = sources.len(),
        fanout = uploader.is_some(),
    );

    match uploader {
        Some(invoker) => fanout::deploy_all(invoker, sources, target)
            .await
            .into_result()
            .map(|_| ()),
        None => {
            for source in sources {
                deploy_source(store, source, target, workspace_root).await?;
            }
            Ok(())
        }
    }
}
