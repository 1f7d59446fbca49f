//! URL handling module for Dredge
//!
//! This module merges base URLs, path suffixes and query parameters into the
//! canonical target string handed to the request engine.

mod combine;

// Re-export main functions
pub use combine::{combine_url, with_params};
