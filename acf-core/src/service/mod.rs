//! Business logic layer

pub mod application;
pub mod graph;
pub mod provision;
pub mod sweeper;
pub mod system;
pub mod temporary_access;

pub use application::ApplicationService;
pub use graph::ObjectGraphBuilder;
pub use provision::ApplicationProvisioner;
pub use sweeper::ExpirationSweeper;
pub use system::SystemService;
pub use temporary_access::TemporaryAccessService;
