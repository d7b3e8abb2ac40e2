use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// The parts of the Lambda invocation context the handlers rely on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationContext {
    pub log_stream_name: String,
    pub deadline: Option<SystemTime>,
}

impl InvocationContext {
    pub fn new(log_stream_name: impl Into<String>) -> Self {
        Self {
            log_stream_name: log_stream_name.into(),
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: SystemTime) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn from_lambda(context: &lambda_runtime::Context) -> Self {
        Self {
            log_stream_name: context.env_config.log_stream.clone(),
            deadline: Some(UNIX_EPOCH + Duration::from_millis(context.deadline)),
        }
    }

    /// Time left before the host terminates the invocation. `None` when no
    /// deadline is known.
    pub fn remaining_time(&self) -> Option<Duration> {
        self.deadline.map(|deadline| {
            deadline
                .duration_since(SystemTime::now())
                .unwrap_or(Duration::ZERO)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remaining_time_saturates_at_zero() {
        let past = InvocationContext::new("stream").with_deadline(UNIX_EPOCH);
        assert_eq!(past.remaining_time(), Some(Duration::ZERO));
        assert_eq!(InvocationContext::new("stream").remaining_time(), None);
    }

    #[test]
    fn remaining_time_counts_down_to_deadline() {
        let context = InvocationContext::new("stream")
            .with_deadline(SystemTime::now() + Duration::from_secs(120));
        let remaining = context.remaining_time().expect("deadline should be set");
        assert!(remaining > Duration::from_secs(110));
        assert!(remaining <= Duration::from_secs(120));
    }
}
