//! Outcome reports for directory object graph runs
//!
//! A graph run never aborts on a failed step, so every outcome is captured
//! here and the caller decides how to surface failures.

use super::role::Role;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Result of a single directory operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationOutcome {
    pub success: bool,
    /// Diagnostic text from the directory
    pub message: String,
    /// The object was already present (create) or already absent (delete)
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub unchanged: bool,
}

impl OperationOutcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            unchanged: false,
        }
    }

    pub fn unchanged(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            unchanged: true,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            unchanged: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectCategory {
    Hostgroups,
    ExternalGroups,
    PosixGroups,
    HbacRules,
    SudoRules,
}

impl std::fmt::Display for ObjectCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Hostgroups => "hostgroups",
            Self::ExternalGroups => "external_groups",
            Self::PosixGroups => "posix_groups",
            Self::HbacRules => "hbac_rules",
            Self::SudoRules => "sudo_rules",
        };
        f.write_str(s)
    }
}

/// Follow-up operation on an object (membership, attachment)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub action: String,
    pub target: String,
    pub outcome: OperationOutcome,
}

/// Create or delete of one directory object plus its follow-up steps
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectReport {
    pub category: ObjectCategory,
    pub name: String,
    pub outcome: OperationOutcome,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<StepOutcome>,
}

impl ObjectReport {
    pub fn new(category: ObjectCategory, name: &str, outcome: OperationOutcome) -> Self {
        Self {
            category,
            name: name.to_string(),
            outcome,
            steps: Vec::new(),
        }
    }

    pub fn step(&mut self, action: &str, target: &str, outcome: OperationOutcome) {
        self.steps.push(StepOutcome {
            action: action.to_string(),
            target: target.to_string(),
            outcome,
        });
    }

    /// Failed object operation or any failed follow-up step
    pub fn has_failures(&self) -> bool {
        !self.outcome.success || self.steps.iter().any(|s| !s.outcome.success)
    }
}

/// Human-readable pointer to something that failed inside a report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureEntry {
    pub category: ObjectCategory,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    pub message: String,
}

fn collect_failures<'a>(objects: impl Iterator<Item = &'a ObjectReport>) -> Vec<FailureEntry> {
    let mut failures = Vec::new();
    for object in objects {
        if !object.outcome.success {
            failures.push(FailureEntry {
                category: object.category,
                name: object.name.clone(),
                action: None,
                message: object.outcome.message.clone(),
            });
        }
        for step in object.steps.iter().filter(|s| !s.outcome.success) {
            failures.push(FailureEntry {
                category: object.category,
                name: object.name.clone(),
                action: Some(format!("{} {}", step.action, step.target)),
                message: step.outcome.message.clone(),
            });
        }
    }
    failures
}

/// Outcomes of one object graph build or teardown
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphReport {
    pub objects: Vec<ObjectReport>,
}

impl GraphReport {
    pub fn push(&mut self, object: ObjectReport) {
        self.objects.push(object);
    }

    pub fn object(&self, category: ObjectCategory) -> Option<&ObjectReport> {
        self.objects.iter().find(|o| o.category == category)
    }

    pub fn has_failures(&self) -> bool {
        self.objects.iter().any(ObjectReport::has_failures)
    }

    pub fn failures(&self) -> Vec<FailureEntry> {
        collect_failures(self.objects.iter())
    }
}

/// Graph report for one (environment, role, realm) cell
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellReport {
    pub environment: String,
    pub role: Role,
    pub realm: String,
    pub report: GraphReport,
}

/// Aggregated outcomes of provisioning a whole application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionReport {
    pub application: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub host_groups: Vec<ObjectReport>,
    pub cells: Vec<CellReport>,
}

impl ProvisionReport {
    pub fn new(application: &str, started_at: DateTime<Utc>) -> Self {
        Self {
            application: application.to_string(),
            started_at,
            finished_at: started_at,
            host_groups: Vec::new(),
            cells: Vec::new(),
        }
    }

    fn all_objects(&self) -> impl Iterator<Item = &ObjectReport> {
        self.host_groups
            .iter()
            .chain(self.cells.iter().flat_map(|c| c.report.objects.iter()))
    }

    /// Number of object create/delete attempts, host groups included
    pub fn object_count(&self) -> usize {
        self.all_objects().count()
    }

    /// Names of every object of a category, in report order
    pub fn names(&self, category: ObjectCategory) -> Vec<&str> {
        self.all_objects()
            .filter(|o| o.category == category)
            .map(|o| o.name.as_str())
            .collect()
    }

    pub fn has_failures(&self) -> bool {
        self.all_objects().any(ObjectReport::has_failures)
    }

    pub fn failures(&self) -> Vec<FailureEntry> {
        collect_failures(self.all_objects())
    }
}
