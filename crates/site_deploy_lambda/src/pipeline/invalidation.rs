use std::time::Duration;

use site_deploy_core::contract::InvalidationBatch;
use tokio::time::Instant;
use tracing::info;

use crate::adapters::cdn::{CdnClient, InvalidationStatus};
use crate::error::DeployError;

/// Time kept back from the invocation deadline so the signal can still be
/// delivered after a wait gives up.
pub const SIGNAL_RESERVE: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    pub ceiling: Duration,
    pub poll_interval: Duration,
}

impl WaitPolicy {
    /// Caps the ceiling so that waiting ends at least [`SIGNAL_RESERVE`]
    /// before the invocation runs out of time.
    pub fn within(self, remaining: Option<Duration>) -> Self {
        let Some(remaining) = remaining else {
            return self;
        };
        Self {
            ceiling: self.ceiling.min(remaining.saturating_sub(SIGNAL_RESERVE)),
            ..self
        }
    }
}

/// Creates one invalidation for `paths` and, when `wait` is set, polls until
/// it completes or the ceiling passes. Status is read once before the first
/// sleep, so a zero ceiling still accepts an invalidation that is already
/// complete. Returns the invalidation id.
pub async fn invalidate(
    cdn: &dyn CdnClient,
    distribution_id: &str,
    paths: Vec<String>,
    wait: Option<WaitPolicy>,
) -> Result<String, DeployError> {
    let batch = InvalidationBatch::new(distribution_id, paths);
    let invalidation_id = cdn
        .create_invalidation(&batch)
        .await
        .map_err(|error| DeployError::invalidation(distribution_id, error))?;

    info!(
        component = "cache_invalidator",
        event = "invalidation_created",
        distribution_id,
        invalidation_id = %invalidation_id,
        paths = ?batch.paths,
        caller_reference = %batch.caller_reference,
    );

    let Some(wait) = wait else {
        return Ok(invalidation_id);
    };

    let started = Instant::now();
    loop {
        let status = cdn
            .invalidation_status(distribution_id, &invalidation_id)
            .await
            .map_err(|error| DeployError::invalidation(distribution_id, error))?;
        if status == InvalidationStatus::Completed {
            info!(
                component = "cache_invalidator",
                event = "invalidation_completed",
                distribution_id,
                invalidation_id = %invalidation_id,
                waited_secs = started.elapsed().as_secs(),
            );
            return Ok(invalidation_id);
        }

        let elapsed = started.elapsed();
        if elapsed >= wait.ceiling {
            return Err(DeployError::invalidation(
                distribution_id,
                format!(
                    "invalidation {invalidation_id} did not complete within {}s",
                    wait.ceiling.as_secs()
                ),
            ));
        }
        tokio::time::sleep(wait.poll_interval.min(wait.ceiling - elapsed)).await;
    }
}
