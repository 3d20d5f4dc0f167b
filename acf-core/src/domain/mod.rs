//! Domain models for ACF Core

pub mod application;
pub mod directory;
pub mod report;
pub mod role;
pub mod system;
pub mod temporary_access;

pub use application::*;
pub use directory::*;
pub use report::*;
pub use role::*;
pub use system::*;
pub use temporary_access::*;
