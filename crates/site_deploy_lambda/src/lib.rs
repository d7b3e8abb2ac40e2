//! AWS-oriented adapters and handlers for site deployment custom resources.
//!
//! This crate owns runtime integration details (Lambda handlers, the S3,
//! Lambda and CloudFront adapters, the response callback) and the deployment
//! pipeline built on top of them. Request contracts and policies come from
//! `site_deploy_core`.

pub mod adapters;
pub mod config;
pub mod context;
pub mod error;
pub mod handlers;
pub mod pipeline;
pub mod telemetry;

#[cfg(feature = "test-helpers")]
pub mod test_helpers;
