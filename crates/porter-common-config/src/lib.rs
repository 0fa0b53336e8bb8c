//! Configuration types for Porter.
//!
//! This crate provides the configuration used to build fetch connectors,
//! read from `.porter/config.yaml` files and overridden by `PORTER_*`
//! environment variables.

pub mod env;
pub mod loader;
pub mod types;

pub use env::*;
pub use loader::*;
pub use types::*;
