//! Workspace preparation step for CI/CD pipelines
//!
//! Reads pipeline-supplied configuration (action type, iteration index,
//! JSON blobs describing resources), optionally enriches it with tags
//! fetched from a remote inventory API, derives canonical resource
//! identifiers, and republishes a flat set of key/value variables for
//! consumption by later pipeline steps.
//!
//! # Module Structure
//!
//! - [`config`] - JSON configuration blob parsing and validation
//! - [`inventory`] - Tag lookup against the remote inventory API
//! - [`workspace`] - The create/update/delete action workflows
//! - [`output`] - Published variable accumulation and sink files
//! - [`error`] - Error taxonomy and exit-code mapping

pub mod config;
pub mod error;
pub mod inventory;
pub mod output;
pub mod workspace;

/// Version injected at compile time via WSPREP_VERSION env var (set by CI/CD),
/// or "dev" for local builds.
pub const VERSION: &str = match option_env!("WSPREP_VERSION") {
    Some(v) => v,
    None => "dev",
};
