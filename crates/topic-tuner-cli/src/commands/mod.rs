//! CLI command handlers
//!
//! # Modules
//!
//! - `search`: Load input, run the tuner, write the JSON report
//! - `default_config`: Print the default TOML configuration

pub mod default_config;
pub mod search;
