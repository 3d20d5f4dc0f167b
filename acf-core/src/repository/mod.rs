//! Data access layer (Repository pattern)

pub mod config_store;

pub use config_store::{ConfigDocument, ConfigRepository, FileConfigRepository};
