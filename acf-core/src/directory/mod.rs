//! Identity directory gateway
//!
//! One call performs one directory operation. Object operations never fail
//! with an error: they return an [`OperationOutcome`] whose diagnostic text
//! ends up in a report. Creating an object that already exists and deleting
//! one that is already gone both count as success. Queries (host listing,
//! trusts, access evaluation) return `Result` because callers depend on
//! their data.

pub mod ipa;

pub use ipa::IpaDirectory;

use crate::domain::{HbacDecision, OperationOutcome, TrustDomain};
use crate::error::Result;
use async_trait::async_trait;

/// Group flavour passed to group creation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKind {
    /// POSIX group with a GID
    Posix,
    /// External group whose members live in a trusted realm
    External,
}

/// Member added to a group
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupMember {
    /// `identity@REALM` from a trusted realm
    External(String),
    /// Nested directory group
    Group(String),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DirectoryGateway: Send + Sync {
    // Host groups
    async fn create_host_group(&self, name: &str, description: &str) -> OperationOutcome;
    async fn delete_host_group(&self, name: &str) -> OperationOutcome;
    async fn add_host_group_member(&self, host_group: &str, host: &str) -> OperationOutcome;

    // Groups
    async fn create_group(&self, name: &str, description: &str, kind: GroupKind)
        -> OperationOutcome;
    async fn delete_group(&self, name: &str) -> OperationOutcome;
    async fn add_group_member(&self, group: &str, member: GroupMember) -> OperationOutcome;

    // Host-based-access rules
    async fn create_hbac_rule(&self, name: &str, description: &str) -> OperationOutcome;
    async fn delete_hbac_rule(&self, name: &str) -> OperationOutcome;
    async fn add_hbac_rule_group(&self, rule: &str, group: &str) -> OperationOutcome;
    async fn add_hbac_rule_host_group(&self, rule: &str, host_group: &str) -> OperationOutcome;
    async fn add_hbac_rule_service(&self, rule: &str, service: &str) -> OperationOutcome;

    // Privilege-escalation rules
    async fn create_sudo_rule(&self, name: &str, description: &str) -> OperationOutcome;
    async fn delete_sudo_rule(&self, name: &str) -> OperationOutcome;
    async fn add_sudo_rule_group(&self, rule: &str, group: &str) -> OperationOutcome;
    async fn add_sudo_rule_host_group(&self, rule: &str, host_group: &str) -> OperationOutcome;
    async fn add_sudo_rule_command(&self, rule: &str, command: &str) -> OperationOutcome;

    // Queries
    async fn list_enrolled_hosts(&self) -> Result<Vec<String>>;
    async fn list_trust_domains(&self) -> Result<Vec<TrustDomain>>;
    async fn evaluate_hbac(&self, user: &str, host: &str, service: &str) -> Result<HbacDecision>;
    /// Whether the directory answers at all
    async fn ping(&self) -> bool;
}
