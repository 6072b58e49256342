//! Configuration model for postcrew.
//!
//! This module defines the Config struct that represents `postcrew.yaml` at
//! the project root. It supports forward-compatible YAML parsing (unknown
//! fields are ignored), defaults for every field, and validation of values.

mod model;
mod operations;
pub mod types;


pub use model::Config;
