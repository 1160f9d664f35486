//! # delve-config
//!
//! Configuration system for the Delve runtime. Reads from `delve.toml`, then
//! applies environment variable overrides. CLI flags are applied by the caller.

pub mod loader;
pub mod schema;

pub use loader::ConfigLoader;
pub use schema::DelveConfig;
pub use schema::{ApiConfig, ConfigWarning, ExplorerConfig, LoggingConfig, WarningSeverity};
