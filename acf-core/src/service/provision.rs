//! Application provisioning
//!
//! Each environment is handled in two phases: its host group is created and
//! populated first, then every (role, realm) cell is built concurrently up to
//! the configured limit. Cell reports keep role-then-realm order.

use super::graph::ObjectGraphBuilder;
use crate::directory::DirectoryGateway;
use crate::domain::{Application, CellReport, ObjectCategory, ObjectReport, OperationOutcome, ProvisionReport};
use crate::error::{AppError, Result};
use crate::naming::{self, HostPattern, ObjectNames};
use crate::repository::ConfigRepository;
use chrono::Utc;
use metrics::{counter, histogram};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

pub struct ApplicationProvisioner<D: DirectoryGateway, R: ConfigRepository> {
    builder: Arc<ObjectGraphBuilder<D>>,
    repo: Arc<R>,
    max_concurrency: usize,
}

impl<D: DirectoryGateway + 'static, R: ConfigRepository> ApplicationProvisioner<D, R> {
    pub fn new(builder: Arc<ObjectGraphBuilder<D>>, repo: Arc<R>, max_concurrency: usize) -> Self {
        Self {
            builder,
            repo,
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Provision a stored application and record the outcome on it
    pub async fn apply(&self, name: &str) -> Result<ProvisionReport> {
        let application = self
            .repo
            .find_application(name)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Application {} not found", name)))?;

        let report = self.provision(&application).await;
        self.repo
            .record_apply(&application.name, report.finished_at, &report)
            .await?;
        Ok(report)
    }

    /// Create the full object graph of an application. Directory failures are
    /// recorded in the report and never abort the run.
    pub async fn provision(&self, application: &Application) -> ProvisionReport {
        let started = Instant::now();
        let mut report = ProvisionReport::new(&application.name, Utc::now());
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));

        tracing::info!(
            application = %application.name,
            environments = application.environments.len(),
            realms = application.realms.len(),
            "Provisioning application"
        );

        for env in &application.environments {
            let host_group = naming::host_group_name(&application.name, &env.name);
            let resolved = env.resolved_pattern(&application.name);
            let host_group_report = match HostPattern::new(&resolved) {
                Ok(pattern) => self.builder.build_host_group(&host_group, &pattern).await,
                Err(e) => ObjectReport::new(
                    ObjectCategory::Hostgroups,
                    &host_group,
                    OperationOutcome::failed(format!("Invalid host pattern {}: {}", resolved, e)),
                ),
            };
            report.host_groups.push(host_group_report);

            let mut cells = JoinSet::new();
            let mut slots: Vec<Option<CellReport>> = Vec::new();
            for role in &env.roles {
                for realm in &application.realms {
                    let index = slots.len();
                    slots.push(None);

                    let builder = Arc::clone(&self.builder);
                    let semaphore = Arc::clone(&semaphore);
                    let names = ObjectNames::permanent(&application.name, &env.name, *role, realm);
                    let identity = naming::bridge_identity(&application.name, &env.name, *role);
                    let environment = env.name.clone();
                    let realm = realm.clone();
                    let role = *role;

                    cells.spawn(async move {
                        // The semaphore is never closed
                        let _permit = semaphore.acquire_owned().await.ok();
                        let graph = builder
                            .build_graph(&names, &realm, &identity, role.sudo_template())
                            .await;
                        (
                            index,
                            CellReport {
                                environment,
                                role,
                                realm,
                                report: graph,
                            },
                        )
                    });
                }
            }

            while let Some(joined) = cells.join_next().await {
                match joined {
                    Ok((index, cell)) => slots[index] = Some(cell),
                    Err(e) => tracing::error!(
                        application = %application.name,
                        environment = %env.name,
                        error = %e,
                        "Object graph task failed"
                    ),
                }
            }
            report.cells.extend(slots.into_iter().flatten());
        }

        report.finished_at = Utc::now();
        let result = if report.has_failures() { "partial" } else { "success" };
        counter!("acf_provision_runs_total", "result" => result).increment(1);
        histogram!("acf_provision_duration_seconds").record(started.elapsed().as_secs_f64());

        if report.has_failures() {
            tracing::warn!(
                application = %application.name,
                objects = report.object_count(),
                failures = report.failures().len(),
                "Provisioning finished with failures"
            );
        } else {
            tracing::info!(
                application = %application.name,
                objects = report.object_count(),
                "Provisioning finished"
            );
        }
        report
    }
}
