//! # delve-cli
//!
//! Command-line interface for the Delve exploration runtime.
//!
//! ## Commands
//!
//! - `delve run`: Explore the graph and submit the report
//! - `delve config`: Show the resolved configuration
//! - `delve doctor`: Audit the configuration
//! - `delve version`: Show version and build info
//! - `delve completions`: Generate shell completions

pub mod commands;

pub use commands::Cli;
