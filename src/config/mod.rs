//! Configuration module for Lily-Mirror
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every field has a default pointing at the live LilyBBS site, so a missing
//! config file is not an error for the binary.
//!
//! # Example
//!
//! ```no_run
//! use lily_mirror::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("mirror.toml")).unwrap();
//! println!("Mirroring into: {}", config.storage.database_path);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, FetchConfig, SiteConfig, StorageConfig};

// Re-export parser functions
pub use parser::{load_config, parse_config};
pub use validation::validate;
