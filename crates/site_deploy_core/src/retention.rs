//! Deployment retention policy.
//!
//! Every top-level folder named `deploy-<token>` is one generation of
//! published content. The folder being deployed and the one referenced by the
//! previous resource properties are always kept, so a run of failed
//! deployments never removes the content still being served. Beyond those,
//! the `keep_recent` newest generations survive and everything older is
//! deleted. A `keep_recent` of zero deletes every unprotected generation.

use std::cmp::Reverse;

use crate::destination::{is_deployment_marker, normalize_prefix, top_level_name};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub keep_recent: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentGeneration {
    pub name: String,
    /// Newest object timestamp under the folder, in Unix epoch seconds.
    pub last_modified: Option<i64>,
}

/// Deployment folders eligible for deletion, in listing order.
pub fn unprotected_generations(
    common_prefixes: &[String],
    current_prefix: &str,
    previous_prefix: &str,
) -> Vec<String> {
    let current = normalize_prefix(current_prefix);
    let previous = normalize_prefix(previous_prefix);

    common_prefixes
        .iter()
        .map(|prefix| top_level_name(prefix))
        .filter(|name| is_deployment_marker(name))
        .filter(|name| *name != current && *name != previous)
        .map(str::to_string)
        .collect()
}

pub fn plan_deletions(
    mut generations: Vec<DeploymentGeneration>,
    policy: RetentionPolicy,
) -> Vec<String> {
    generations.sort_by_key(|generation| {
        (
            Reverse(generation.last_modified.unwrap_or(i64::MIN)),
            Reverse(generation.name.clone()),
        )
    });

    generations
        .into_iter()
        .skip(policy.keep_recent)
        .map(|generation| generation.name)
        .collect()
}
