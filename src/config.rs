//! Configuration loader and schema types.
//!
//! This module exposes the configuration schema used to drive the engine
//! and the terminal front-end, plus helpers to load configuration from disk.

mod load;
mod schema;

pub use load::default_log_path;
pub use schema::*;
