//! Directory introspection and service status

use crate::directory::DirectoryGateway;
use crate::domain::{AccessTestInput, AccessTestResult, ConfigExport, SystemStatus, TrustDomain};
use crate::error::Result;
use crate::repository::ConfigRepository;
use chrono::Utc;
use std::sync::Arc;
use validator::Validate;

pub struct SystemService<D: DirectoryGateway, R: ConfigRepository> {
    directory: Arc<D>,
    repo: Arc<R>,
    hbac_service: String,
    config_path: String,
}

impl<D: DirectoryGateway, R: ConfigRepository> SystemService<D, R> {
    pub fn new(
        directory: Arc<D>,
        repo: Arc<R>,
        hbac_service: impl Into<String>,
        config_path: impl Into<String>,
    ) -> Self {
        Self {
            directory,
            repo,
            hbac_service: hbac_service.into(),
            config_path: config_path.into(),
        }
    }

    pub async fn trusts(&self) -> Result<Vec<TrustDomain>> {
        self.directory.list_trust_domains().await
    }

    /// Status snapshot. Directory query failures show up as missing counts.
    pub async fn status(&self) -> Result<SystemStatus> {
        let document = self.repo.export().await?;
        let directory_connected = self.directory.ping().await;

        let (hosts_count, trusts_count) = if directory_connected {
            let hosts = self.directory.list_enrolled_hosts().await;
            let trusts = self.directory.list_trust_domains().await;
            if let Err(e) = &hosts {
                tracing::warn!(error = %e, "Host count unavailable");
            }
            if let Err(e) = &trusts {
                tracing::warn!(error = %e, "Trust count unavailable");
            }
            (hosts.ok().map(|h| h.len()), trusts.ok().map(|t| t.len()))
        } else {
            (None, None)
        };

        let mut temporary_access = SystemStatus::empty_request_counts();
        for request in &document.temporary_requests {
            *temporary_access
                .entry(request.status.to_string())
                .or_default() += 1;
        }

        Ok(SystemStatus {
            directory_connected,
            applications_count: document.applications.len(),
            hosts_count,
            trusts_count,
            config_path: self.config_path.clone(),
            last_updated: document.updated_at,
            temporary_access,
        })
    }

    /// Evaluate host-based access for a user from a trusted domain. Privilege
    /// rules are not evaluated remotely.
    pub async fn test_access(&self, input: AccessTestInput) -> Result<AccessTestResult> {
        input.validate()?;
        let user = format!("{}@{}", input.user, input.domain);

        let (hbac, hbac_error) = match self
            .directory
            .evaluate_hbac(&user, &input.target_host, &self.hbac_service)
            .await
        {
            Ok(decision) => (Some(decision), None),
            Err(e) => {
                tracing::warn!(user = %user, host = %input.target_host, error = %e, "HBAC test failed");
                (None, Some(e.to_string()))
            }
        };

        Ok(AccessTestResult {
            user,
            host: input.target_host,
            command: input.command,
            service: self.hbac_service.clone(),
            hbac,
            hbac_error,
            sudo_checked: false,
            sudo_message: "Sudo rules are evaluated on the target host".to_string(),
        })
    }

    pub async fn export(&self) -> Result<ConfigExport> {
        let document = self.repo.export().await?;
        Ok(ConfigExport::new(document, Utc::now()))
    }
}
