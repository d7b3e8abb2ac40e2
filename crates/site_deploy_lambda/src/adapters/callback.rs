use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};

use super::AdapterError;

const CALLBACK_TIMEOUT: Duration = Duration::from_secs(30);

/// Delivers the terminal custom-resource signal to its pre-signed URL.
#[async_trait]
pub trait ResponseSender: Send + Sync {
    /// Returns the HTTP status code of the accepted PUT.
    async fn put_response(&self, url: &str, body: String) -> Result<u16, AdapterError>;
}

pub struct HttpResponseSender {
    client: reqwest::Client,
}

impl HttpResponseSender {
    pub fn new() -> Result<Self, AdapterError> {
        let client = reqwest::Client::builder()
            .timeout(CALLBACK_TIMEOUT)
            .build()
            .map_err(|error| AdapterError::service("build response client", error))?;
        Ok(Self { client })
    }

    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ResponseSender for HttpResponseSender {
    async fn put_response(&self, url: &str, body: String) -> Result<u16, AdapterError> {
        // The pre-signed URL is signed without a content type.
        let response = self
            .client
            .put(url)
            .header(CONTENT_TYPE, "")
            .header(CONTENT_LENGTH, body.len())
            .body(body)
            .send()
            .await
            .map_err(|error| AdapterError::service("put custom resource response", error))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AdapterError::service(
                "put custom resource response",
                format!("callback returned HTTP {status}"),
            ));
        }
        Ok(status.as_u16())
    }
}
