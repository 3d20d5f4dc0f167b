//! Directory gateway backed by the FreeIPA command line client

use super::{DirectoryGateway, GroupKind, GroupMember};
use crate::config::DirectoryConfig;
use crate::domain::{HbacDecision, OperationOutcome, TrustDomain};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use metrics::{counter, histogram};
use std::time::{Duration, Instant};
use tokio::process::Command;

/// Which failure text means the directory is already in the desired state
#[derive(Debug, Clone, Copy)]
enum Tolerate {
    AlreadyExists,
    NotFound,
    AlreadyMember,
}

impl Tolerate {
    fn matches(&self, diagnostic: &str) -> bool {
        let text = diagnostic.to_lowercase();
        match self {
            Self::AlreadyExists => text.contains("already exists"),
            Self::NotFound => text.contains("not found"),
            Self::AlreadyMember => text.contains("already a member"),
        }
    }
}

#[derive(Debug)]
struct CommandOutput {
    success: bool,
    stdout: String,
    stderr: String,
}

impl CommandOutput {
    fn failed(message: String) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr: message,
        }
    }

    /// stderr when present, stdout otherwise
    fn diagnostic(&self) -> String {
        if self.stderr.trim().is_empty() {
            self.stdout.trim().to_string()
        } else {
            self.stderr.trim().to_string()
        }
    }
}

/// Runs `ipa <subcommand> ...` for every directory operation
#[derive(Debug, Clone)]
pub struct IpaDirectory {
    binary: String,
    timeout: Duration,
}

impl IpaDirectory {
    pub fn new(config: &DirectoryConfig) -> Self {
        Self {
            binary: config.ipa_binary.clone(),
            timeout: config.command_timeout(),
        }
    }

    async fn run(&self, args: &[&str]) -> CommandOutput {
        let operation = args.first().copied().unwrap_or("unknown").to_string();
        let started = Instant::now();

        let mut command = Command::new(&self.binary);
        command.args(args).kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Err(_) => CommandOutput::failed(format!(
                "{} {} timed out after {}s",
                self.binary,
                operation,
                self.timeout.as_secs()
            )),
            Ok(Err(e)) => {
                CommandOutput::failed(format!("Failed to execute {}: {}", self.binary, e))
            }
            Ok(Ok(output)) => CommandOutput {
                success: output.status.success(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            },
        };

        histogram!("acf_directory_operation_duration_seconds", "operation" => operation.clone())
            .record(started.elapsed().as_secs_f64());

        output
    }

    async fn object_op(&self, args: &[&str], tolerate: Tolerate) -> OperationOutcome {
        let operation = args.first().copied().unwrap_or("unknown").to_string();
        let output = self.run(args).await;
        let diagnostic = output.diagnostic();

        let (outcome, result) = if output.success {
            (OperationOutcome::ok(diagnostic), "success")
        } else if tolerate.matches(&diagnostic) {
            tracing::debug!(command = %args.join(" "), "Directory already in desired state");
            (OperationOutcome::unchanged(diagnostic), "unchanged")
        } else {
            tracing::error!(command = %args.join(" "), error = %diagnostic, "Directory command failed");
            (OperationOutcome::failed(diagnostic), "failure")
        };

        counter!("acf_directory_operations_total", "operation" => operation, "result" => result)
            .increment(1);
        outcome
    }

    async fn query(&self, args: &[&str]) -> Result<CommandOutput> {
        let output = self.run(args).await;
        if output.success {
            Ok(output)
        } else {
            Err(AppError::Directory(format!(
                "{} failed: {}",
                args.join(" "),
                output.diagnostic()
            )))
        }
    }
}

#[async_trait]
impl DirectoryGateway for IpaDirectory {
    async fn create_host_group(&self, name: &str, description: &str) -> OperationOutcome {
        self.object_op(
            &["hostgroup-add", name, "--desc", description],
            Tolerate::AlreadyExists,
        )
        .await
    }

    async fn delete_host_group(&self, name: &str) -> OperationOutcome {
        self.object_op(&["hostgroup-del", name], Tolerate::NotFound)
            .await
    }

    async fn add_host_group_member(&self, host_group: &str, host: &str) -> OperationOutcome {
        self.object_op(
            &["hostgroup-add-member", host_group, "--hosts", host],
            Tolerate::AlreadyMember,
        )
        .await
    }

    async fn create_group(
        &self,
        name: &str,
        description: &str,
        kind: GroupKind,
    ) -> OperationOutcome {
        let mut args = vec!["group-add", name];
        if kind == GroupKind::External {
            args.push("--external");
        }
        args.extend(["--desc", description]);
        self.object_op(&args, Tolerate::AlreadyExists).await
    }

    async fn delete_group(&self, name: &str) -> OperationOutcome {
        self.object_op(&["group-del", name], Tolerate::NotFound)
            .await
    }

    async fn add_group_member(&self, group: &str, member: GroupMember) -> OperationOutcome {
        let args = match &member {
            GroupMember::External(principal) => {
                vec!["group-add-member", group, "--external", principal.as_str()]
            }
            GroupMember::Group(nested) => {
                vec!["group-add-member", group, "--groups", nested.as_str()]
            }
        };
        self.object_op(&args, Tolerate::AlreadyMember).await
    }

    async fn create_hbac_rule(&self, name: &str, description: &str) -> OperationOutcome {
        self.object_op(
            &["hbacrule-add", name, "--desc", description],
            Tolerate::AlreadyExists,
        )
        .await
    }

    async fn delete_hbac_rule(&self, name: &str) -> OperationOutcome {
        self.object_op(&["hbacrule-del", name], Tolerate::NotFound)
            .await
    }

    async fn add_hbac_rule_group(&self, rule: &str, group: &str) -> OperationOutcome {
        self.object_op(
            &["hbacrule-add-user", rule, "--groups", group],
            Tolerate::AlreadyMember,
        )
        .await
    }

    async fn add_hbac_rule_host_group(&self, rule: &str, host_group: &str) -> OperationOutcome {
        self.object_op(
            &["hbacrule-add-host", rule, "--hostgroups", host_group],
            Tolerate::AlreadyMember,
        )
        .await
    }

    async fn add_hbac_rule_service(&self, rule: &str, service: &str) -> OperationOutcome {
        self.object_op(
            &["hbacrule-add-service", rule, "--hbacsvcs", service],
            Tolerate::AlreadyMember,
        )
        .await
    }

    async fn create_sudo_rule(&self, name: &str, description: &str) -> OperationOutcome {
        self.object_op(
            &["sudorule-add", name, "--desc", description],
            Tolerate::AlreadyExists,
        )
        .await
    }

    async fn delete_sudo_rule(&self, name: &str) -> OperationOutcome {
        self.object_op(&["sudorule-del", name], Tolerate::NotFound)
            .await
    }

    async fn add_sudo_rule_group(&self, rule: &str, group: &str) -> OperationOutcome {
        self.object_op(
            &["sudorule-add-user", rule, "--groups", group],
            Tolerate::AlreadyMember,
        )
        .await
    }

    async fn add_sudo_rule_host_group(&self, rule: &str, host_group: &str) -> OperationOutcome {
        self.object_op(
            &["sudorule-add-host", rule, "--hostgroups", host_group],
            Tolerate::AlreadyMember,
        )
        .await
    }

    async fn add_sudo_rule_command(&self, rule: &str, command: &str) -> OperationOutcome {
        // IPA expresses "any command" as a category, not as a sudo command object
        if command == "ALL" {
            return self
                .object_op(
                    &["sudorule-mod", rule, "--cmdcat=all"],
                    Tolerate::AlreadyMember,
                )
                .await;
        }
        self.object_op(
            &["sudorule-add-allow-command", rule, "--sudocmds", command],
            Tolerate::AlreadyMember,
        )
        .await
    }

    async fn list_enrolled_hosts(&self) -> Result<Vec<String>> {
        let output = self.query(&["host-find", "--raw", "--sizelimit=0"]).await?;
        Ok(parse_hosts(&output.stdout))
    }

    async fn list_trust_domains(&self) -> Result<Vec<TrustDomain>> {
        let output = self.query(&["trust-find", "--raw"]).await?;
        Ok(parse_trusts(&output.stdout))
    }

    async fn evaluate_hbac(&self, user: &str, host: &str, service: &str) -> Result<HbacDecision> {
        let output = self
            .run(&["hbactest", "--user", user, "--host", host, "--service", service])
            .await;
        if output.stdout.contains("Access granted:") {
            return Ok(parse_hbactest(&output.stdout));
        }
        Err(AppError::Directory(format!(
            "hbactest failed: {}",
            output.diagnostic()
        )))
    }

    async fn ping(&self) -> bool {
        self.run(&["user-show", "admin"]).await.success
    }
}

/// First value of a raw attribute, e.g. `{"fqdn": ["host.example.com"]}`
fn first_value<'a>(entry: &'a serde_json::Value, key: &str) -> Option<&'a str> {
    match entry.get(key)? {
        serde_json::Value::Array(values) => values.first()?.as_str(),
        serde_json::Value::String(value) => Some(value.as_str()),
        _ => None,
    }
}

fn json_results(stdout: &str) -> Option<Vec<serde_json::Value>> {
    let trimmed = stdout.trim_start();
    if !trimmed.starts_with('{') {
        return None;
    }
    let value: serde_json::Value = serde_json::from_str(trimmed).ok()?;
    value.get("result")?.as_array().cloned()
}

/// `key: value` line, with the key compared case-insensitively
fn attribute<'a>(line: &'a str, keys: &[&str]) -> Option<&'a str> {
    let (key, value) = line.trim().split_once(':')?;
    let key = key.trim();
    keys.iter()
        .any(|k| key.eq_ignore_ascii_case(k))
        .then(|| value.trim())
        .filter(|v| !v.is_empty())
}

pub(crate) fn parse_hosts(stdout: &str) -> Vec<String> {
    if let Some(results) = json_results(stdout) {
        return results
            .iter()
            .filter_map(|entry| first_value(entry, "fqdn"))
            .filter(|fqdn| !fqdn.is_empty())
            .map(str::to_string)
            .collect();
    }

    stdout
        .lines()
        .filter_map(|line| attribute(line, &["fqdn", "Host name"]))
        .map(str::to_string)
        .collect()
}

pub(crate) fn parse_trusts(stdout: &str) -> Vec<TrustDomain> {
    let trust = |name: &str, flat: &str| TrustDomain {
        name: name.to_string(),
        netbios_name: flat.to_string(),
        realm: name.to_uppercase(),
        trust_type: "ad".to_string(),
    };

    if let Some(results) = json_results(stdout) {
        return results
            .iter()
            .filter_map(|entry| {
                let name = first_value(entry, "cn")?;
                let flat = first_value(entry, "ipantflatname").unwrap_or("");
                Some(trust(name, flat))
            })
            .collect();
    }

    let mut domains: Vec<TrustDomain> = Vec::new();
    for line in stdout.lines() {
        if let Some(name) = attribute(line, &["cn", "Realm name"]) {
            domains.push(trust(name, ""));
        } else if let Some(flat) = attribute(line, &["ipantflatname", "Domain NetBIOS name"]) {
            if let Some(current) = domains.last_mut() {
                current.netbios_name = flat.to_string();
            }
        }
    }
    domains
}

pub(crate) fn parse_hbactest(stdout: &str) -> HbacDecision {
    let mut granted = false;
    let mut matched_rules = Vec::new();
    for line in stdout.lines() {
        if let Some(value) = attribute(line, &["Access granted"]) {
            granted = value.eq_ignore_ascii_case("true");
        } else if let Some(rule) = attribute(line, &["Matched rules"]) {
            matched_rules.push(rule.to_string());
        }
    }
    HbacDecision {
        granted,
        matched_rules,
        output: stdout.trim().to_string(),
    }
}
