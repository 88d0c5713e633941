#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! File and environment backed configuration for volcast runs.
//!
//! Layout: `model.rs` (typed policy documents), `defaults.rs` (default values and
//! environment keys), `validate.rs` (range checks and parsing helpers),
//! `loader.rs` (document loading with environment overrides).

pub mod defaults;
pub mod error;
pub mod loader;
pub mod model;
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::{load_config, load_config_with_env};
pub use model::{ConcurrencyMode, CopyPolicy, TelemetrySettings, VolcastConfig};
pub use validate::validate_config;
