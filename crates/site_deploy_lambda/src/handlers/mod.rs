//! Lambda entry points. Each handler takes the raw event and explicit
//! dependencies so the binaries stay thin and tests can drive them directly.

pub mod deployer;
pub mod invalidator;
pub mod signal;
pub mod uploader;
