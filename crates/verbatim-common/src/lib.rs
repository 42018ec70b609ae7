//! Verbatim Common - Shared types and utilities
//!
//! This crate provides the configuration, error definitions and content
//! hashing used by the index engine and the command-line tools.

pub mod config;
pub mod error;
pub mod hash;

pub use config::Config;
pub use error::{Error, Result};
pub use hash::{content_hash, path_hash};
