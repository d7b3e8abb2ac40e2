use site_deploy_core::destination::s3_url;
use site_deploy_core::retention::{
    plan_deletions, unprotected_generations, DeploymentGeneration, RetentionPolicy,
};
use tracing::{error, info, warn};

use crate::adapters::object_store::ObjectStore;
use crate::error::DeployError;
use crate::pipeline::publish::remove_recursive;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetentionReport {
    pub deleted: Vec<String>,
    pub failed: Vec<String>,
    /// Generations whose age could not be read. They are neither ranked
    /// nor deleted.
    pub skipped: Vec<String>,
}

/// Removes superseded `deploy-*` folders from `bucket`. Best effort: listing
/// or deletion failures are logged and never fail the deployment.
pub async fn cleanup(
    store: &dyn ObjectStore,
    bucket: &str,
    current_prefix: &str,
    previous_prefix: &str,
    policy: RetentionPolicy,
) -> RetentionReport {
    let mut report = RetentionReport::default();

    let common_prefixes = match store.list_top_level_prefixes(bucket).await {
        Ok(prefixes) => prefixes,
        Err(list_error) => {
            warn!(
                component = "deployment_retention",
                event = "listing_failed",
                bucket,
                error = %list_error,
            );
            return report;
        }
    };

    let candidates = unprotected_generations(&common_prefixes, current_prefix, previous_prefix);
    if candidates.is_empty() {
        return report;
    }

    let mut generations = Vec::with_capacity(candidates.len());
    for name in candidates {
        let last_modified = if policy.keep_recent == 0 {
            None
        } else {
            match newest_timestamp(store, bucket, &name).await {
                Some(newest) => newest,
                None => {
                    report.skipped.push(name);
                    continue;
                }
            }
        };
        generations.push(DeploymentGeneration {
            name,
            last_modified,
        });
    }

    for name in plan_deletions(generations, policy) {
        match remove_recursive(store, bucket, &name).await {
            Ok(objects) => {
                info!(
                    component = "deployment_retention",
                    event = "deployment_removed",
                    prefix = %s3_url(bucket, &name),
                    objects,
                );
                report.deleted.push(name);
            }
            Err(remove_error) => {
                let failure = DeployError::retention(s3_url(bucket, &name), remove_error);
                error!(
                    component = "deployment_retention",
                    event = "deployment_remove_failed",
                    error_kind = failure.kind().as_str(),
                    error = %failure,
                );
                report.failed.push(name);
            }
        }
    }

    report
}

/// `None` when the generation could not be listed; `Some(None)` when it has
/// no timestamped objects.
async fn newest_timestamp(
    store: &dyn ObjectStore,
    bucket: &str,
    name: &str,
) -> Option<Option<i64>> {
    match store.list_objects(bucket, &format!("{name}/")).await {
        Ok(objects) => Some(objects.iter().filter_map(|object| object.last_modified).max()),
        Err(list_error) => {
            warn!(
                component = "deployment_retention",
                event = "generation_listing_failed",
                prefix = %s3_url(bucket, name),
                error = %list_error,
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::MemoryObjectStore;

    fn seeded(generations: &[(&str, i64)]) -> MemoryObjectStore {
        let store = MemoryObjectStore::new();
        for (name, last_modified) in generations {
            store.seed_at("d", &format!("{name}/index.html"), b"x", *last_modified);
        }
        store.seed("d", "assets/logo.png", b"png");
        store
    }

    fn top_level(store: &MemoryObjectStore) -> Vec<String> {
        let mut names: Vec<String> = store
            .keys("d")
            .into_iter()
            .filter_map(|key| key.split('/').next().map(str::to_string))
            .collect();
        names.dedup();
        names
    }

    #[tokio::test]
    async fn deletes_everything_but_current_and_previous() {
        let store = seeded(&[("deploy-1", 10), ("deploy-2", 20), ("deploy-3", 30)]);

        let report = cleanup(&store, "d", "deploy-3", "deploy-2", RetentionPolicy::default()).await;

        assert_eq!(report.deleted, vec!["deploy-1"]);
        assert_eq!(top_level(&store), vec!["assets", "deploy-2", "deploy-3"]);
    }

    #[tokio::test]
    async fn keeps_most_recent_generations() {
        let store = seeded(&[
            ("deploy-a", 40),
            ("deploy-b", 10),
            ("deploy-c", 30),
            ("deploy-d", 20),
            ("deploy-e", 50),
        ]);

        let report = cleanup(&store, "d", "deploy-e", "", RetentionPolicy { keep_recent: 2 }).await;

        let mut deleted = report.deleted.clone();
        deleted.sort();
        assert_eq!(deleted, vec!["deploy-b", "deploy-d"]);
    }

    #[tokio::test]
    async fn deletion_failures_are_skipped() {
        let store = seeded(&[("deploy-1", 10), ("deploy-2", 20), ("deploy-3", 30)]);
        store.fail_deletes_under("deploy-1/");

        let report = cleanup(&store, "d", "deploy-3", "", RetentionPolicy::default()).await;

        assert_eq!(report.failed, vec!["deploy-1"]);
        assert_eq!(report.deleted, vec!["deploy-2"]);
    }

    #[tokio::test]
    async fn unlistable_generation_is_never_deleted() {
        let store = seeded(&[
            ("deploy-a", 40),
            ("deploy-b", 10),
            ("deploy-c", 30),
            ("deploy-e", 50),
        ]);
        store.fail_listings_under("deploy-a/");

        let report = cleanup(&store, "d", "deploy-e", "", RetentionPolicy { keep_recent: 1 }).await;

        assert_eq!(report.deleted, vec!["deploy-b"]);
        assert_eq!(report.skipped, vec!["deploy-a"]);
        assert!(report.failed.is_empty());
        assert_eq!(store.keys("d").iter().filter(|key| key.starts_with("deploy-a/")).count(), 1);
    }

    #[tokio::test]
    async fn listing_failure_yields_empty_report() {
        let store = seeded(&[("deploy-1", 10)]);
        store.fail_prefix_listings("throttled");

        let report = cleanup(&store, "d", "deploy-2", "", RetentionPolicy::default()).await;
        assert_eq!(report, RetentionReport::default());
    }
}
