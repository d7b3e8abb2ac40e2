//! Shared site deployment domain primitives.
//!
//! This crate owns the custom-resource request/response contracts, property
//! validation, physical identity rules, destination key layout and the
//! retention policy. It intentionally excludes AWS SDK and Lambda runtime
//! concerns; those live in `site_deploy_lambda`.

pub mod contract;
pub mod destination;
pub mod file_options;
pub mod identity;
pub mod response;
pub mod retention;
