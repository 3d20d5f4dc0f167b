//! Application declaration business logic

use crate::domain::{Application, CreateApplicationInput};
use crate::error::{AppError, Result};
use crate::repository::ConfigRepository;
use std::sync::Arc;
use validator::Validate;

pub struct ApplicationService<R: ConfigRepository> {
    repo: Arc<R>,
}

impl<R: ConfigRepository> ApplicationService<R> {
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    pub async fn create(&self, input: CreateApplicationInput) -> Result<Application> {
        input.validate()?;
        let application = Application::new(input);
        self.repo.create_application(&application).await?;
        tracing::info!(
            application = %application.name,
            realms = ?application.realms,
            environments = application.environments.len(),
            "Application declared"
        );
        Ok(application)
    }

    pub async fn get(&self, name: &str) -> Result<Application> {
        self.repo
            .find_application(name)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Application {} not found", name)))
    }

    pub async fn list(&self) -> Result<Vec<Application>> {
        self.repo.list_applications().await
    }

    /// Remove the declaration only; directory objects are left in place
    pub async fn delete(&self, name: &str) -> Result<()> {
        self.repo.delete_application(name).await?;
        tracing::info!(application = %name, "Application deleted");
        Ok(())
    }
}
