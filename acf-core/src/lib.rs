//! ACF Core - IdM Access Configurator
//!
//! Derives and maintains host groups, bridged external groups, POSIX groups,
//! host-based-access rules and sudo rules in a FreeIPA directory for
//! declared applications, and manages time-bounded temporary access grants.

pub mod api;
pub mod config;
pub mod directory;
pub mod domain;
pub mod error;
pub mod naming;
pub mod repository;
pub mod server;
pub mod service;
pub mod state;
pub mod telemetry;

// Re-export commonly used types
pub use config::Config;
pub use error::{AppError, Result};
