//! Types describing what the identity directory reports back

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Trusted Active Directory domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustDomain {
    pub name: String,
    pub netbios_name: String,
    pub realm: String,
    #[serde(rename = "type", default = "default_trust_type")]
    pub trust_type: String,
}

fn default_trust_type() -> String {
    "ad".to_string()
}

/// Host-based-access evaluation for a (user, host, service) triple
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HbacDecision {
    pub granted: bool,
    #[serde(default)]
    pub matched_rules: Vec<String>,
    pub output: String,
}

/// Input for testing a user's access to a host
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AccessTestInput {
    #[validate(length(min = 1, max = 255))]
    pub user: String,
    #[validate(length(min = 1, max = 255))]
    pub domain: String,
    #[validate(length(min = 1, max = 255))]
    pub target_host: String,
    #[serde(default = "default_test_command")]
    pub command: String,
}

fn default_test_command() -> String {
    "sudo -l".to_string()
}

/// Outcome of an access test
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTestResult {
    pub user: String,
    pub host: String,
    pub command: String,
    pub service: String,
    pub hbac: Option<HbacDecision>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hbac_error: Option<String>,
    /// Privilege checks need a session on the target host and are not run
    pub sudo_checked: bool,
    pub sudo_message: String,
}
