//! Dynamic form layout resolution
//!
//! Turns static layout definitions plus a data-model snapshot into the
//! concrete node tree a renderer can draw: repeating groups expanded into
//! row instances, bindings rewritten with row indices, hidden expressions
//! resolved to a fixed point and the whole thing validated.
//!
//! The core pipeline is pure and synchronous; see [`pass::run_pass`]. The
//! [`scheduler`] module wraps it in a debounced async loop for interactive
//! use.

pub mod binding;
pub mod config;
pub mod datamodel;
pub mod diagnostics;
pub mod expression;
pub mod hidden;
pub mod hierarchy;
pub mod layout;
pub mod pass;
pub mod scheduler;
pub mod sources;
pub mod validation;

// Re-export main types
pub use config::EngineConfig;
pub use pass::{run_pass, PassInput, PassOutput};

use tracing_subscriber::EnvFilter;

/// Set up logging for an embedding application. Reads `RUST_LOG`, defaults
/// to `info`. Call at most once.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}
