//! Object graph builder
//!
//! Creates and deletes the directory objects of one (environment, role,
//! realm) cell in dependency order. A failed step is recorded and later
//! steps still run; follow-up steps on an object only run once that object
//! exists.

use crate::directory::{DirectoryGateway, GroupKind, GroupMember};
use crate::domain::{GraphReport, ObjectCategory, ObjectReport, OperationOutcome, SudoTemplate};
use crate::naming::{HostPattern, ObjectNames};
use std::sync::Arc;

pub struct ObjectGraphBuilder<D: DirectoryGateway> {
    directory: Arc<D>,
    hbac_service: String,
}

impl<D: DirectoryGateway> ObjectGraphBuilder<D> {
    pub fn new(directory: Arc<D>, hbac_service: impl Into<String>) -> Self {
        Self {
            directory,
            hbac_service: hbac_service.into(),
        }
    }

    /// Create the environment host group and add every enrolled host matching
    /// `pattern`
    pub async fn build_host_group(&self, name: &str, pattern: &HostPattern) -> ObjectReport {
        let outcome = self
            .directory
            .create_host_group(name, &format!("Host group for {}", name))
            .await;
        let mut report = ObjectReport::new(ObjectCategory::Hostgroups, name, outcome);

        let hosts = match self.directory.list_enrolled_hosts().await {
            Ok(hosts) => hosts,
            Err(e) => {
                tracing::warn!(host_group = %name, error = %e, "Host enumeration failed");
                report.step(
                    "list_hosts",
                    pattern.as_str(),
                    OperationOutcome::failed(e.to_string()),
                );
                return report;
            }
        };

        let matched = pattern.filter(&hosts);
        tracing::debug!(
            host_group = %name,
            pattern = %pattern.as_str(),
            enrolled = hosts.len(),
            matched = matched.len(),
            "Populating host group"
        );
        for host in matched {
            let outcome = self.directory.add_host_group_member(name, host).await;
            report.step("add_member", host, outcome);
        }
        report
    }

    /// Build bridge group, POSIX group, access rule and sudo rule for one cell.
    /// The host group named in `names` must already exist.
    pub async fn build_graph(
        &self,
        names: &ObjectNames,
        realm: &str,
        identity: &str,
        template: SudoTemplate,
    ) -> GraphReport {
        let mut report = GraphReport::default();
        let principal = format!("{}@{}", identity, realm);

        // Bridge group backed by the identity in the trusted realm
        let outcome = self
            .directory
            .create_group(
                &names.bridge_group,
                &format!("External group for {}", principal),
                GroupKind::External,
            )
            .await;
        let mut bridge = ObjectReport::new(ObjectCategory::ExternalGroups, &names.bridge_group, outcome);
        if bridge.outcome.success {
            let outcome = self
                .directory
                .add_group_member(&names.bridge_group, GroupMember::External(principal.clone()))
                .await;
            bridge.step("add_external_member", &principal, outcome);
        }
        report.push(bridge);

        let outcome = self
            .directory
            .create_group(
                &names.posix_group,
                &format!("POSIX group for {}", names.posix_group),
                GroupKind::Posix,
            )
            .await;
        let mut posix = ObjectReport::new(ObjectCategory::PosixGroups, &names.posix_group, outcome);
        if posix.outcome.success {
            let outcome = self
                .directory
                .add_group_member(&names.posix_group, GroupMember::Group(names.bridge_group.clone()))
                .await;
            posix.step("add_group_member", &names.bridge_group, outcome);
        }
        report.push(posix);

        let outcome = self
            .directory
            .create_hbac_rule(&names.access_rule, &format!("HBAC rule for {}", names.access_rule))
            .await;
        let mut hbac = ObjectReport::new(ObjectCategory::HbacRules, &names.access_rule, outcome);
        if hbac.outcome.success {
            let rule = &names.access_rule;
            let outcome = self.directory.add_hbac_rule_group(rule, &names.posix_group).await;
            hbac.step("add_user_group", &names.posix_group, outcome);
            let outcome = self
                .directory
                .add_hbac_rule_host_group(rule, &names.host_group)
                .await;
            hbac.step("add_host_group", &names.host_group, outcome);
            let outcome = self
                .directory
                .add_hbac_rule_service(rule, &self.hbac_service)
                .await;
            hbac.step("add_service", &self.hbac_service, outcome);
        }
        report.push(hbac);

        let outcome = self
            .directory
            .create_sudo_rule(
                &names.sudo_rule,
                &format!("Sudo rule for {} ({})", names.sudo_rule, template.description),
            )
            .await;
        let mut sudo = ObjectReport::new(ObjectCategory::SudoRules, &names.sudo_rule, outcome);
        if sudo.outcome.success {
            let rule = &names.sudo_rule;
            let outcome = self.directory.add_sudo_rule_group(rule, &names.posix_group).await;
            sudo.step("add_user_group", &names.posix_group, outcome);
            let outcome = self
                .directory
                .add_sudo_rule_host_group(rule, &names.host_group)
                .await;
            sudo.step("add_host_group", &names.host_group, outcome);
            for command in template.commands {
                let outcome = self.directory.add_sudo_rule_command(rule, command).await;
                sudo.step("add_command", command, outcome);
            }
        }
        report.push(sudo);

        if report.has_failures() {
            tracing::warn!(
                bridge_group = %names.bridge_group,
                failures = report.failures().len(),
                "Object graph built with failures"
            );
        }
        report
    }

    /// Delete the role-scoped objects in reverse dependency order. The host
    /// group is shared and stays.
    pub async fn tear_down_graph(&self, names: &ObjectNames) -> GraphReport {
        let mut report = GraphReport::default();

        let outcome = self.directory.delete_sudo_rule(&names.sudo_rule).await;
        report.push(ObjectReport::new(ObjectCategory::SudoRules, &names.sudo_rule, outcome));

        let outcome = self.directory.delete_hbac_rule(&names.access_rule).await;
        report.push(ObjectReport::new(ObjectCategory::HbacRules, &names.access_rule, outcome));

        let outcome = self.directory.delete_group(&names.posix_group).await;
        report.push(ObjectReport::new(ObjectCategory::PosixGroups, &names.posix_group, outcome));

        let outcome = self.directory.delete_group(&names.bridge_group).await;
        report.push(ObjectReport::new(
            ObjectCategory::ExternalGroups,
            &names.bridge_group,
            outcome,
        ));

        report
    }
}
