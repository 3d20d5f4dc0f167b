//! Temporary access lifecycle
//!
//! A request moves `pending -> approved -> expired | revoked` or
//! `pending -> denied | revoked`. Approved requests own an ephemeral object
//! graph named after the request id, attached to the permanent host group of
//! the environment. The stored record is authoritative: directory failures
//! are kept in the record's reports and never block a transition.

use super::graph::ObjectGraphBuilder;
use crate::directory::DirectoryGateway;
use crate::domain::{
    AccessRequestStatus, GraphReport, SweepSummary, TemporaryAccessInput, TemporaryAccessRequest,
};
use crate::error::{AppError, Result};
use crate::naming::ObjectNames;
use crate::repository::ConfigRepository;
use chrono::{DateTime, Duration, Utc};
use metrics::counter;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;
use validator::Validate;

/// Actor recorded when a decision carries none
pub const DEFAULT_ACTOR: &str = "admin";

pub struct TemporaryAccessService<D: DirectoryGateway, R: ConfigRepository> {
    builder: Arc<ObjectGraphBuilder<D>>,
    repo: Arc<R>,
    max_grant_hours: i64,
    /// One lock per request id in use, held from read to save
    locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
    sweep_guard: Mutex<()>,
}

impl<D: DirectoryGateway, R: ConfigRepository> TemporaryAccessService<D, R> {
    pub fn new(builder: Arc<ObjectGraphBuilder<D>>, repo: Arc<R>, max_grant_hours: i64) -> Self {
        Self {
            builder,
            repo,
            max_grant_hours,
            locks: Mutex::new(HashMap::new()),
            sweep_guard: Mutex::new(()),
        }
    }

    // ==================== Creation ====================

    /// Grant access immediately: the request starts approved and its graph is
    /// built before the record is saved
    pub async fn grant(&self, input: TemporaryAccessInput) -> Result<TemporaryAccessRequest> {
        self.grant_at(input, Utc::now()).await
    }

    pub async fn grant_at(
        &self,
        input: TemporaryAccessInput,
        now: DateTime<Utc>,
    ) -> Result<TemporaryAccessRequest> {
        let mut request = self.prepare(&input, now).await?;
        request.status = AccessRequestStatus::Approved;
        request.approved_by = Some(request.requested_by.clone());
        request.approved_at = Some(now);
        request.build_report = Some(self.build(&request).await);

        if let Err(e) = self.repo.insert_request(&request).await {
            self.roll_back(&request, &e).await;
            return Err(e);
        }
        record_transition(&request, "granted");
        Ok(request)
    }

    /// Record a pending request awaiting approval
    pub async fn request(&self, input: TemporaryAccessInput) -> Result<TemporaryAccessRequest> {
        self.request_at(input, Utc::now()).await
    }

    pub async fn request_at(
        &self,
        input: TemporaryAccessInput,
        now: DateTime<Utc>,
    ) -> Result<TemporaryAccessRequest> {
        let request = self.prepare(&input, now).await?;
        self.repo.insert_request(&request).await?;
        record_transition(&request, "requested");
        Ok(request)
    }

    /// Validate the input against the stored application and build a pending
    /// request using the application's spelling of the environment
    async fn prepare(
        &self,
        input: &TemporaryAccessInput,
        now: DateTime<Utc>,
    ) -> Result<TemporaryAccessRequest> {
        input.validate()?;
        if input.duration_hours > self.max_grant_hours {
            return Err(AppError::Validation(format!(
                "duration_hours: must be between 1 and {}",
                self.max_grant_hours
            )));
        }

        let application = self
            .repo
            .find_application(&input.application)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Application {} not found", input.application))
            })?;
        let environment = application.environment(&input.environment).ok_or_else(|| {
            AppError::BadRequest(format!(
                "Environment {} is not declared for application {}",
                input.environment, application.name
            ))
        })?;
        if !environment.has_role(input.role) {
            return Err(AppError::BadRequest(format!(
                "Role {} is not declared for {} {}",
                input.role, application.name, environment.name
            )));
        }
        if !application.has_realm(&input.realm) {
            return Err(AppError::BadRequest(format!(
                "Realm {} is not trusted by application {}",
                input.realm, application.name
            )));
        }

        let mut request = TemporaryAccessRequest::new(input, now);
        request.environment = environment.name.clone();
        Ok(request)
    }

    // ==================== Decisions ====================

    pub async fn approve(&self, id: Uuid, actor: Option<String>) -> Result<TemporaryAccessRequest> {
        self.approve_at(id, actor, Utc::now()).await
    }

    /// Build the graph of a pending request. The access window starts at
    /// approval time.
    pub async fn approve_at(
        &self,
        id: Uuid,
        actor: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<TemporaryAccessRequest> {
        self.serialized(id, async move {
            let mut request = self.load(id).await?;
            ensure_pending(&request, "approve")?;

            request.build_report = Some(self.build(&request).await);
            request.status = AccessRequestStatus::Approved;
            request.approved_by = Some(actor.unwrap_or_else(|| DEFAULT_ACTOR.to_string()));
            request.approved_at = Some(now);
            request.expires_at = now + Duration::hours(request.duration_hours);

            // The stored record stays pending, so nothing would tear the graph down later
            if let Err(e) = self.repo.update_request(&request).await {
                self.roll_back(&request, &e).await;
                return Err(e);
            }
            record_transition(&request, "approved");
            Ok(request)
        })
        .await
    }

    pub async fn deny(&self, id: Uuid, actor: Option<String>) -> Result<TemporaryAccessRequest> {
        self.deny_at(id, actor, Utc::now()).await
    }

    pub async fn deny_at(
        &self,
        id: Uuid,
        actor: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<TemporaryAccessRequest> {
        self.serialized(id, async move {
            let mut request = self.load(id).await?;
            ensure_pending(&request, "deny")?;

            request.status = AccessRequestStatus::Denied;
            request.denied_by = Some(actor.unwrap_or_else(|| DEFAULT_ACTOR.to_string()));
            request.denied_at = Some(now);

            self.repo.update_request(&request).await?;
            record_transition(&request, "denied");
            Ok(request)
        })
        .await
    }

    pub async fn revoke(&self, id: Uuid, actor: Option<String>) -> Result<TemporaryAccessRequest> {
        self.revoke_at(id, actor, Utc::now()).await
    }

    /// Revoke a pending or approved request. Approved requests have their
    /// graph torn down first.
    pub async fn revoke_at(
        &self,
        id: Uuid,
        actor: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<TemporaryAccessRequest> {
        self.serialized(id, async move {
            let mut request = self.load(id).await?;
            if request.status.is_terminal() {
                return Err(AppError::InvalidStateTransition(format!(
                    "Cannot revoke request {} in state {}",
                    id, request.status
                )));
            }

            if request.status == AccessRequestStatus::Approved {
                request.teardown_report = Some(self.tear_down(&request).await);
            }
            request.status = AccessRequestStatus::Revoked;
            request.revoked_by = Some(actor.unwrap_or_else(|| DEFAULT_ACTOR.to_string()));
            request.revoked_at = Some(now);

            self.repo.update_request(&request).await?;
            record_transition(&request, "revoked");
            Ok(request)
        })
        .await
    }

    // ==================== Expiration ====================

    pub async fn expire_sweep(&self) -> Result<SweepSummary> {
        self.expire_sweep_at(Utc::now()).await
    }

    /// Expire every approved request whose window has closed. Only one sweep
    /// runs at a time; an overlapping call returns a skipped summary.
    pub async fn expire_sweep_at(&self, now: DateTime<Utc>) -> Result<SweepSummary> {
        let Ok(_guard) = self.sweep_guard.try_lock() else {
            tracing::debug!("Expiration sweep already running, skipping");
            return Ok(SweepSummary {
                skipped: true,
                ..Default::default()
            });
        };

        let due: Vec<Uuid> = self
            .repo
            .list_requests()
            .await?
            .into_iter()
            .filter(|r| r.is_due(now))
            .map(|r| r.id)
            .collect();

        let mut summary = SweepSummary {
            due: due.len(),
            ..Default::default()
        };

        for id in due {
            match self.expire_one(id, now).await {
                Ok(Some(request)) => {
                    let failed = request
                        .teardown_report
                        .as_ref()
                        .is_some_and(GraphReport::has_failures);
                    if failed {
                        summary.teardown_failures.push(id);
                    }
                    summary.expired.push(id);
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(request_id = %id, error = %e, "Failed to expire request");
                }
            }
        }

        counter!("acf_expiration_sweeps_total").increment(1);
        if !summary.expired.is_empty() {
            tracing::info!(
                expired = summary.expired.len(),
                teardown_failures = summary.teardown_failures.len(),
                "Expired temporary access requests"
            );
        }
        Ok(summary)
    }

    /// Re-check the request under its lock; a concurrent revoke may have won
    async fn expire_one(&self, id: Uuid, now: DateTime<Utc>) -> Result<Option<TemporaryAccessRequest>> {
        self.serialized(id, async move {
            let mut request = self.load(id).await?;
            if !request.is_due(now) {
                return Ok(None);
            }

            request.teardown_report = Some(self.tear_down(&request).await);
            request.status = AccessRequestStatus::Expired;
            request.expired_at = Some(now);

            self.repo.update_request(&request).await?;
            record_transition(&request, "expired");
            Ok(Some(request))
        })
        .await
    }

    // ==================== Queries ====================

    pub async fn get(&self, id: Uuid) -> Result<TemporaryAccessRequest> {
        self.load(id).await
    }

    /// Requests, newest first, optionally restricted to one status
    pub async fn list(&self, status: Option<AccessRequestStatus>) -> Result<Vec<TemporaryAccessRequest>> {
        let mut requests: Vec<_> = self
            .repo
            .list_requests()
            .await?
            .into_iter()
            .filter(|r| status.map_or(true, |s| r.status == s))
            .collect();
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(requests)
    }

    // ==================== Internals ====================

    async fn load(&self, id: Uuid) -> Result<TemporaryAccessRequest> {
        self.repo
            .find_request(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Temporary access request {} not found", id)))
    }

    /// Run `work` while holding the lock of request `id`
    async fn serialized<T>(&self, id: Uuid, work: impl Future<Output = Result<T>>) -> Result<T> {
        let lock = {
            let mut locks = self.locks.lock().await;
            Arc::clone(locks.entry(id).or_default())
        };

        let result = {
            let _held = lock.lock().await;
            work.await
        };

        // Entries are cloned and released under the table lock, so a count of
        // one means no caller holds or waits for this id
        let mut locks = self.locks.lock().await;
        drop(lock);
        if locks.get(&id).is_some_and(|l| Arc::strong_count(l) == 1) {
            locks.remove(&id);
        }
        result
    }

    fn names(request: &TemporaryAccessRequest) -> ObjectNames {
        ObjectNames::temporary(
            &request.application,
            &request.environment,
            request.role,
            &request.realm,
            &request.id,
        )
    }

    async fn build(&self, request: &TemporaryAccessRequest) -> GraphReport {
        let names = Self::names(request);
        tracing::info!(
            request_id = %request.id,
            user = %request.user,
            application = %request.application,
            environment = %request.environment,
            role = %request.role,
            expires_at = %request.expires_at,
            "Building temporary access"
        );
        self.builder
            .build_graph(&names, &request.realm, &request.user, request.role.sudo_template())
            .await
    }

    /// Remove a graph whose record could not be saved
    async fn roll_back(&self, request: &TemporaryAccessRequest, error: &AppError) {
        tracing::error!(
            request_id = %request.id,
            user = %request.user,
            error = %error,
            "Failed to save temporary access, removing its objects"
        );
        let report = self.tear_down(request).await;
        if report.has_failures() {
            tracing::error!(
                request_id = %request.id,
                failures = report.failures().len(),
                "Temporary access objects left in the directory"
            );
        }
    }

    async fn tear_down(&self, request: &TemporaryAccessRequest) -> GraphReport {
        let names = Self::names(request);
        tracing::info!(
            request_id = %request.id,
            user = %request.user,
            status = %request.status,
            "Tearing down temporary access"
        );
        self.builder.tear_down_graph(&names).await
    }
}

fn ensure_pending(request: &TemporaryAccessRequest, action: &str) -> Result<()> {
    if request.status == AccessRequestStatus::Pending {
        Ok(())
    } else {
        Err(AppError::InvalidStateTransition(format!(
            "Cannot {} request {} in state {}",
            action, request.id, request.status
        )))
    }
}

fn record_transition(request: &TemporaryAccessRequest, event: &'static str) {
    counter!("acf_temporary_access_transitions_total", "event" => event).increment(1);
    tracing::info!(
        request_id = %request.id,
        user = %request.user,
        status = %request.status,
        event,
        "Temporary access transition"
    );
}
