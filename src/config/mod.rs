//! Configuration module for Dredge
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use dredge::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("dredge.toml")).unwrap();
//! println!("Requests will be tried up to {} times", config.max_attempts);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    ClientConfig, DiagnosticsConfig, MailConfig, SmtpSecurity, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_USER_AGENT,
};

// Re-export parser functions
pub use parser::{load_config, parse_config};
pub use validation::validate;
