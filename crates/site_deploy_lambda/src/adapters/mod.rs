//! Seams between the deployment pipeline and the outside world.
//!
//! Each trait has an AWS implementation in [`aws`] (or [`callback`] for the
//! plain HTTPS response) and an in-memory double in `test_helpers`.

use thiserror::Error;

pub mod aws;
pub mod callback;
pub mod cdn;
pub mod invoke;
pub mod object_store;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("{operation}: s3://{bucket}/{key} does not exist")]
    NotFound {
        operation: &'static str,
        bucket: String,
        key: String,
    },
    #[error("{operation}: {message}")]
    Service {
        operation: &'static str,
        message: String,
    },
    #[error("{operation}: {path}: {source}")]
    Io {
        operation: &'static str,
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl AdapterError {
    pub fn service(operation: &'static str, message: impl std::fmt::Display) -> Self {
        Self::Service {
            operation,
            message: message.to_string(),
        }
    }

    pub fn io(operation: &'static str, path: impl std::fmt::Display, source: std::io::Error) -> Self {
        Self::Io {
            operation,
            path: path.to_string(),
            source,
        }
    }
}
