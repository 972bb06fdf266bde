//! ResendForward Common - Shared types and utilities
//!
//! This crate provides the configuration, error taxonomy, record enums and
//! timestamp handling shared by the storage, core and dashboard crates.

pub mod config;
pub mod error;
pub mod time;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
