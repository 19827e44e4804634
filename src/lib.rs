//! # Artifact Dedup
//!
//! Flags possible duplicates when a batch of artifacts is uploaded to a
//! catalog that already holds thousands of them.
//!
//! ## Core Philosophy
//! - **Never auto-merge** - a match is a suggestion for a human reviewer
//! - **Show WHY** - every flag names the existing artifact and the distance
//! - **Degrade, don't abort** - unreadable images are skipped, not fatal
//!
//! ## Architecture
//! - `core` - Descriptors, matching, caching and batch orchestration
//! - `events` - Event-driven progress reporting
//! - `error` - Error types with paths and artifact ids
//!
//! The `artifact-match` binary is a thin command-line layer on top.

pub mod core;
pub mod error;
pub mod events;

// Re-export commonly used types at the crate root
pub use error::{ArtifactMatchError, Result};

/// Initialize tracing for the library
///
/// Filters come from `RUST_LOG`. Logs go to stderr so that JSON output on
/// stdout stays parseable. Calling this twice is harmless.
pub fn init_tracing() {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
