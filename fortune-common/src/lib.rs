//! # Fortune Common Library
//!
//! Shared code for the fortune timeline workspace including:
//! - Error types
//! - Configuration loading (TOML + environment overrides)
//! - Date and duration utilities

pub mod config;
pub mod error;
pub mod time;

pub use error::{Error, Result};
