//! LanWarden Common - Shared utilities: logging, configuration, persistence
//!
//! This crate provides common functionality used across all LanWarden crates.

pub mod config;
pub mod logging;
pub mod store;

pub use config::{Config, ConfigBuilder};
pub use logging::init_logging;
pub use store::{FileStore, KvStore, MemoryStore};
