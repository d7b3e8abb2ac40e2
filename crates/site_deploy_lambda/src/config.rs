use std::path::PathBuf;
use std::time::Duration;

use site_deploy_core::retention::RetentionPolicy;

use crate::error::DeployError;
use crate::pipeline::invalidation::WaitPolicy;

pub const UPLOADER_FUNCTION_NAME: &str = "UPLOADER_FUNCTION_NAME";
pub const RETENTION_KEEP_RECENT: &str = "RETENTION_KEEP_RECENT";
pub const INVALIDATION_WAIT_TIMEOUT_SECS: &str = "INVALIDATION_WAIT_TIMEOUT_SECS";
pub const INVALIDATION_POLL_INTERVAL_SECS: &str = "INVALIDATION_POLL_INTERVAL_SECS";
pub const WORKSPACE_ROOT: &str = "WORKSPACE_ROOT";

pub const DEFAULT_INVALIDATION_WAIT_TIMEOUT: Duration = Duration::from_secs(600);
pub const DEFAULT_INVALIDATION_POLL_INTERVAL: Duration = Duration::from_secs(20);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerConfig {
    /// Secondary publish function. Sources are processed in-process when unset.
    pub uploader_function_name: Option<String>,
    pub retention: RetentionPolicy,
    pub invalidation_wait: WaitPolicy,
    pub workspace_root: Option<PathBuf>,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            uploader_function_name: None,
            retention: RetentionPolicy::default(),
            invalidation_wait: WaitPolicy {
                ceiling: DEFAULT_INVALIDATION_WAIT_TIMEOUT,
                poll_interval: DEFAULT_INVALIDATION_POLL_INTERVAL,
            },
            workspace_root: None,
        }
    }
}

impl HandlerConfig {
    pub fn from_env() -> Result<Self, DeployError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, DeployError> {
        let defaults = Self::default();
        let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let keep_recent = match non_empty(RETENTION_KEEP_RECENT) {
            Some(raw) => parse_number(RETENTION_KEEP_RECENT, &raw)?,
            None => defaults.retention.keep_recent as u64,
        };
        let ceiling = match non_empty(INVALIDATION_WAIT_TIMEOUT_SECS) {
            Some(raw) => Duration::from_secs(parse_number(INVALIDATION_WAIT_TIMEOUT_SECS, &raw)?),
            None => defaults.invalidation_wait.ceiling,
        };
        let poll_interval = match non_empty(INVALIDATION_POLL_INTERVAL_SECS) {
            Some(raw) => {
                let seconds = parse_number(INVALIDATION_POLL_INTERVAL_SECS, &raw)?;
                if seconds == 0 {
                    return Err(DeployError::Config {
                        name: INVALIDATION_POLL_INTERVAL_SECS.to_string(),
                        message: "must be a positive integer".to_string(),
                    });
                }
                Duration::from_secs(seconds)
            }
            None => defaults.invalidation_wait.poll_interval,
        };

        Ok(Self {
            uploader_function_name: non_empty(UPLOADER_FUNCTION_NAME),
            retention: RetentionPolicy {
                keep_recent: usize::try_from(keep_recent).map_err(|_| DeployError::Config {
                    name: RETENTION_KEEP_RECENT.to_string(),
                    message: "is too large".to_string(),
                })?,
            },
            invalidation_wait: WaitPolicy {
                ceiling,
                poll_interval,
            },
            workspace_root: non_empty(WORKSPACE_ROOT).map(PathBuf::from),
        })
    }
}

fn parse_number(name: &str, raw: &str) -> Result<u64, DeployError> {
    raw.trim().parse::<u64>().map_err(|error| DeployError::Config {
        name: name.to_string(),
        message: format!("'{raw}' is not a non-negative integer: {error}"),
    })
}
