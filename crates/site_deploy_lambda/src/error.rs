use site_deploy_core::contract::ValidationError;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Fetch,
    Rewrite,
    Publish,
    Retention,
    Invalidation,
    Config,
    Internal,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Fetch => "fetch",
            Self::Rewrite => "rewrite",
            Self::Publish => "publish",
            Self::Retention => "retention",
            Self::Invalidation => "invalidation",
            Self::Config => "config",
            Self::Internal => "internal",
        }
    }
}

#[derive(Debug, Error)]
pub enum DeployError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("failed to fetch {source_url}: {message}")]
    Fetch { source_url: String, message: String },
    #[error("failed to rewrite {path}: {message}")]
    Rewrite { path: String, message: String },
    #[error("failed to publish to {destination}: {message}")]
    Publish { destination: String, message: String },
    #[error("failed to remove deployment {prefix}: {message}")]
    Retention { prefix: String, message: String },
    #[error("failed to invalidate distribution {distribution_id}: {message}")]
    Invalidation {
        distribution_id: String,
        message: String,
    },
    #[error("invalid configuration {name}: {message}")]
    Config { name: String, message: String },
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl DeployError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Fetch { .. } => ErrorKind::Fetch,
            Self::Rewrite { .. } => ErrorKind::Rewrite,
            Self::Publish { .. } => ErrorKind::Publish,
            Self::Retention { .. } => ErrorKind::Retention,
            Self::Invalidation { .. } => ErrorKind::Invalidation,
            Self::Config { .. } => ErrorKind::Config,
            Self::Internal { .. } => ErrorKind::Internal,
        }
    }

    pub fn fetch(source_url: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Fetch {
            source_url: source_url.into(),
            message: message.to_string(),
        }
    }

    pub fn rewrite(path: impl std::fmt::Display, message: impl std::fmt::Display) -> Self {
        Self::Rewrite {
            path: path.to_string(),
            message: message.to_string(),
        }
    }

    pub fn publish(destination: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Publish {
            destination: destination.into(),
            message: message.to_string(),
        }
    }

    pub fn retention(prefix: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Retention {
            prefix: prefix.into(),
            message: message.to_string(),
        }
    }

    pub fn invalidation(distribution_id: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Invalidation {
            distribution_id: distribution_id.into(),
            message: message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_keep_their_message() {
        let error = DeployError::from(ValidationError::new(
            "missing request resource property DestinationBucketName",
        ));
        assert_eq!(error.kind(), ErrorKind::Validation);
        assert_eq!(
            error.to_string(),
            "missing request resource property DestinationBucketName"
        );
    }

    #[test]
    fn publish_errors_name_destination() {
        let error = DeployError::publish("s3://d/site/", "access denied");
        assert_eq!(error.kind().as_str(), "publish");
        assert_eq!(error.to_string(), "failed to publish to s3://d/site/: access denied");
    }
}
