//! Temporary access request domain types

use super::application::{validate_object_name, validate_realm};
use super::report::GraphReport;
use super::role::Role;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Temporary access request status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccessRequestStatus {
    #[default]
    Pending,
    Approved,
    Denied,
    Expired,
    Revoked,
}

impl AccessRequestStatus {
    /// Denied, expired and revoked requests never change again
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Denied | Self::Expired | Self::Revoked)
    }
}

impl std::str::FromStr for AccessRequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "denied" => Ok(Self::Denied),
            "expired" => Ok(Self::Expired),
            "revoked" => Ok(Self::Revoked),
            _ => Err(format!("Unknown access request status: {}", s)),
        }
    }
}

impl std::fmt::Display for AccessRequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Approved => write!(f, "approved"),
            Self::Denied => write!(f, "denied"),
            Self::Expired => write!(f, "expired"),
            Self::Revoked => write!(f, "revoked"),
        }
    }
}

/// Time-bounded access for one user to one application environment role
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemporaryAccessRequest {
    pub id: Uuid,
    pub user: String,
    /// Trust realm the user comes from
    pub realm: String,
    pub application: String,
    pub environment: String,
    pub role: Role,
    #[serde(default)]
    pub reason: String,
    pub requested_by: String,
    pub duration_hours: i64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status: AccessRequestStatus,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub denied_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub denied_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revoked_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revoked_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expired_at: Option<DateTime<Utc>>,
    /// Outcome of the ephemeral graph build, once one was attempted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_report: Option<GraphReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teardown_report: Option<GraphReport>,
}

impl TemporaryAccessRequest {
    /// New pending request created at `now`
    pub fn new(input: &TemporaryAccessInput, now: DateTime<Utc>) -> Self {
        let requested_by = input
            .requested_by
            .clone()
            .unwrap_or_else(|| input.user.clone());
        Self {
            id: Uuid::new_v4(),
            user: input.user.clone(),
            realm: input.realm.clone(),
            application: input.application.clone(),
            environment: input.environment.clone(),
            role: input.role,
            reason: input.reason.clone().unwrap_or_default(),
            requested_by,
            duration_hours: input.duration_hours,
            created_at: now,
            expires_at: now + Duration::hours(input.duration_hours),
            status: AccessRequestStatus::Pending,
            approved_by: None,
            approved_at: None,
            denied_by: None,
            denied_at: None,
            revoked_by: None,
            revoked_at: None,
            expired_at: None,
            build_report: None,
            teardown_report: None,
        }
    }

    /// Approved and past its expiry
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == AccessRequestStatus::Approved && self.expires_at <= now
    }

    /// External principal placed in the ephemeral bridge group
    pub fn principal(&self) -> String {
        format!("{}@{}", self.user, self.realm)
    }
}

/// Input for granting or requesting temporary access
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TemporaryAccessInput {
    #[validate(custom(function = "validate_principal_name"))]
    pub user: String,
    #[validate(custom(function = "validate_realm"))]
    pub realm: String,
    #[validate(custom(function = "validate_object_name"))]
    pub application: String,
    #[validate(custom(function = "validate_object_name"))]
    pub environment: String,
    pub role: Role,
    #[validate(range(min = 1))]
    pub duration_hours: i64,
    #[validate(length(max = 1024))]
    pub reason: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub requested_by: Option<String>,
}

/// Approve, deny or revoke body
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct DecisionInput {
    #[validate(length(min = 1, max = 255))]
    pub actor: Option<String>,
}

fn validate_principal_name(name: &str) -> Result<(), validator::ValidationError> {
    if PRINCIPAL_REGEX.is_match(name) {
        Ok(())
    } else {
        Err(validator::ValidationError::new("invalid_user"))
    }
}

lazy_static::lazy_static! {
    static ref PRINCIPAL_REGEX: regex::Regex =
        regex::Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]{0,254}$").unwrap();
}

/// Result of one expiration sweep
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SweepSummary {
    /// Approved requests past their expiry when the sweep started
    pub due: usize,
    pub expired: Vec<Uuid>,
    /// Expired requests whose teardown reported failures
    pub teardown_failures: Vec<Uuid>,
    /// Another sweep was already running
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub skipped: bool,
}
