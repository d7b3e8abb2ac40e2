#![allow(dead_code)]

use std::sync::Arc;

use serde_json::Value;
use site_deploy_lambda::adapters::invoke::UploaderInvoker;
use site_deploy_lambda::config::HandlerConfig;
use site_deploy_lambda::context::InvocationContext;
use site_deploy_lambda::handlers::deployer::{handle_deployment_event, DeployerDependencies};
use site_deploy_lambda::handlers::signal::Signal;
use site_deploy_lambda::handlers::uploader::UploaderDependencies;
use site_deploy_lambda::test_helpers::{
    zip_archive, FakeCdn, MemoryObjectStore, RecordingInvoker, RecordingResponder,
};

pub const LOG_STREAM: &str = "2026/10/17/[$LATEST]0123456789abcdef";

/// Deployer wired to in-memory adapters.
pub struct DeployerHarness {
    pub store: Arc<MemoryObjectStore>,
    pub cdn: Arc<FakeCdn>,
    pub responder: Arc<RecordingResponder>,
    pub uploader: Option<Arc<RecordingInvoker>>,
    pub config: HandlerConfig,
}

impl Default for DeployerHarness {
    fn default() -> Self {
        Self::new()
    }
}

impl DeployerHarness {
    pub fn new() -> Self {
        Self {
            store: Arc::new(MemoryObjectStore::new()),
            cdn: Arc::new(FakeCdn::completing_after(1)),
            responder: Arc::new(RecordingResponder::new()),
            uploader: None,
            config: HandlerConfig::default(),
        }
    }

    /// Publishes through a fan-out uploader that runs the real uploader
    /// handler against the same store.
    pub fn with_fanout(mut self) -> Self {
        self.uploader = Some(Arc::new(RecordingInvoker::delegating(UploaderDependencies {
            store: self.store.clone(),
            workspace_root: None,
        })));
        self
    }

    pub fn with_cdn(mut self, cdn: FakeCdn) -> Self {
        self.cdn = Arc::new(cdn);
        self
    }

    pub fn with_responder(mut self, responder: RecordingResponder) -> Self {
        self.responder = Arc::new(responder);
        self
    }

    pub fn with_config(mut self, config: HandlerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn seed_archive(&self, bucket: &str, key: &str, entries: &[(&str, &str)]) {
        self.store.seed(bucket, key, &zip_archive(entries));
    }

    pub fn dependencies(&self) -> DeployerDependencies {
        DeployerDependencies {
            store: self.store.clone(),
            cdn: self.cdn.clone(),
            uploader: self
                .uploader
                .clone()
                .map(|uploader| uploader as Arc<dyn UploaderInvoker>),
            responder: self.responder.clone(),
            config: self.config.clone(),
        }
    }

    pub async fn run(&self, event: Value) -> Signal {
        handle_deployment_event(event, &InvocationContext::new(LOG_STREAM), &self.dependencies())
            .await
            .expect("event should reach the signal phase")
    }

    /// The single signal body, asserting exactly one was sent.
    pub fn only_signal(&self) -> Value {
        let bodies = self.responder.bodies();
        assert_eq!(bodies.len(), 1, "expected exactly one signal, got {bodies:?}");
        bodies.into_iter().next().expect("one signal")
    }
}
