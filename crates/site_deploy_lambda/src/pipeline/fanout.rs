use std::sync::Arc;

use site_deploy_core::contract::{PublishTarget, SourceArchive, UploadPayload, UploadResponse};
use site_deploy_core::destination::s3_url;
use tokio::task::JoinSet;
use tracing::{error, info};

use crate::adapters::invoke::UploaderInvoker;
use crate::error::DeployError;

/// Outcome of one fan-out. Failures are kept in the order they completed.
#[derive(Debug, Default)]
pub struct FanoutReport {
    pub succeeded: Vec<SourceArchive>,
    pub failures: Vec<DeployError>,
}

impl FanoutReport {
    /// The first failure observed, or the number of published sources.
    pub fn into_result(self) -> Result<usize, DeployError> {
        match self.failures.into_iter().next() {
            Some(failure) => Err(failure),
            None => Ok(self.succeeded.len()),
        }
    }
}

/// Invokes the uploader once per source, all concurrently, and waits for
/// every invocation to finish before reporting.
pub async fn deploy_all(
    invoker: Arc<dyn UploaderInvoker>,
    sources: &[SourceArchive],
    target: &PublishTarget,
) -> FanoutReport {
    let destination = s3_url(&target.bucket, &target.prefix);
    let mut tasks = JoinSet::new();

    for source in sources {
        let invoker = Arc::clone(&invoker);
        let source = source.clone();
        let payload = UploadPayload::from_parts(&source, target);
        let destination = destination.clone();
        tasks.spawn(async move {
            let result = invoke_one(invoker.as_ref(), &payload, &source, &destination).await;
            (source, result)
        });
    }

    let mut report = FanoutReport::default();
    while let Some(joined) = tasks.join_next().await {
        let (source, result) = match joined {
            Ok(outcome) => outcome,
            Err(join_error) => {
                let failure = DeployError::Internal {
                    message: format!("uploader task did not finish: {join_error}"),
                };
                error!(
                    component = "fanout_invoker",
                    event = "upload_task_aborted",
                    error = %failure,
                );
                report.failures.push(failure);
                continue;
            }
        };

        match result {
            Ok(()) => {
                info!(
                    component = "fanout_invoker",
                    event = "source_published",
                    source = %source.s3_url(),
                    destination = %destination,
                );
                report.succeeded.push(source);
            }
            Err(failure) => {
                error!(
                    component = "fanout_invoker",
                    event = "source_publish_failed",
                    source = %source.s3_url(),
                    error_kind = failure.kind().as_str(),
                    error = %failure,
                );
                report.failures.push(failure);
            }
        }
    }

    report
}

async fn invoke_one(
    invoker: &dyn UploaderInvoker,
    payload: &UploadPayload,
    source: &SourceArchive,
    destination: &str,
) -> Result<(), DeployError> {
    let source_url = source.s3_url();
    let body = serde_json::to_vec(payload)
        .map_err(|error| DeployError::publish(destination, format!("{source_url}: {error}")))?;
    let response_body = invoker
        .invoke_uploader(&body)
        .await
        .map_err(|error| DeployError::publish(destination, format!("{source_url}: {error}")))?;

    let response: UploadResponse = serde_json::from_slice(&response_body).map_err(|error| {
        DeployError::publish(
            destination,
            format!("{source_url}: unreadable uploader response: {error}"),
        )
    })?;
    if response.status {
        Ok(())
    } else {
        Err(DeployError::publish(
            destination,
            format!(
                "{source_url}: {}",
                response.reason.as_deref().unwrap_or("uploader reported failure")
            ),
        ))
    }
}

#[cfg(test)]
mod tests {
    use site_deploy_core::contract::SyncMode;

    use super::*;
    use crate::test_helpers::RecordingInvoker;

    fn sources(keys: &[&str]) -> Vec<SourceArchive> {
        keys.iter()
            .map(|key| SourceArchive {
                bucket_name: "assets".to_string(),
                object_key: key.to_string(),
            })
            .collect()
    }

    fn target() -> PublishTarget {
        PublishTarget {
            bucket: "site".to_string(),
            prefix: "web".to_string(),
            file_options: Vec::new(),
            replace_rules: Vec::new(),
            sync_mode: SyncMode::Merge,
        }
    }

    #[tokio::test]
    async fn sends_one_payload_per_source() {
        let invoker = Arc::new(RecordingInvoker::succeeding());

        let report = deploy_all(invoker.clone(), &sources(&["a.zip", "b.zip", "c.zip"]), &target()).await;

        assert_eq!(report.into_result().expect("fan-out should succeed"), 3);
        let mut keys: Vec<String> = invoker
            .payloads()
            .into_iter()
            .map(|payload| {
                assert_eq!(payload.destination_bucket_name, "site");
                assert_eq!(payload.destination_bucket_key_prefix, "web");
                assert!(!payload.prune_stale);
                payload.source_object_key
            })
            .collect();
        keys.sort();
        assert_eq!(keys, vec!["a.zip", "b.zip", "c.zip"]);
    }

    #[tokio::test]
    async fn drains_all_invocations_and_surfaces_a_failure() {
        let invoker = Arc::new(RecordingInvoker::failing_for("b.zip", "disk full"));

        let report = deploy_all(invoker.clone(), &sources(&["a.zip", "b.zip", "c.zip"]), &target()).await;

        assert_eq!(invoker.payloads().len(), 3);
        assert_eq!(report.succeeded.len(), 2);
        let failure = report.into_result().expect_err("fan-out should fail");
        assert_eq!(
            failure.to_string(),
            "failed to publish to s3://site/web/: s3://assets/b.zip: disk full"
        );
    }

    #[tokio::test]
    async fn empty_source_list_succeeds() {
        let invoker = Arc::new(RecordingInvoker::succeeding());
        let report = deploy_all(invoker, &[], &target()).await;
        assert_eq!(report.into_result().expect("nothing to do"), 0);
    }
}
