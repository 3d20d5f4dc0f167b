//! Application state traits for dependency injection
//!
//! Handlers are generic over [`HasServices`] so the same router runs against
//! the production `AppState` and against in-memory test implementations.

use crate::config::Config;
use crate::directory::DirectoryGateway;
use crate::repository::ConfigRepository;
use crate::service::{
    ApplicationProvisioner, ApplicationService, SystemService, TemporaryAccessService,
};

/// Trait for application state that provides access to all services.
pub trait HasServices: Clone + Send + Sync + 'static {
    /// The directory gateway type
    type Directory: DirectoryGateway + 'static;
    /// The configuration store type
    type ConfigRepo: ConfigRepository + 'static;

    /// Get the application configuration
    fn config(&self) -> &Config;

    /// Get the application declaration service
    fn application_service(&self) -> &ApplicationService<Self::ConfigRepo>;

    /// Get the provisioner
    fn provisioner(&self) -> &ApplicationProvisioner<Self::Directory, Self::ConfigRepo>;

    /// Get the temporary access lifecycle service
    fn temporary_access_service(&self) -> &TemporaryAccessService<Self::Directory, Self::ConfigRepo>;

    /// Get the system service
    fn system_service(&self) -> &SystemService<Self::Directory, Self::ConfigRepo>;
}
