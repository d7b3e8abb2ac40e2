//! Deployment pipeline steps, in the order a Create/Update runs them:
//! fetch and extract each source archive, rewrite its files, publish the
//! tree (directly or through the fan-out uploader), prune old deployment
//! generations, then invalidate the CDN.

pub mod archive;
pub mod deploy;
pub mod fanout;
pub mod invalidation;
pub mod publish;
pub mod retention;
pub mod rewrite;
pub mod workspace;
