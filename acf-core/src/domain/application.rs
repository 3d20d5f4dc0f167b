//! Application domain types

use super::report::ProvisionReport;
use super::role::Role;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Deployment stage of an application with the hosts that belong to it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Environment {
    #[validate(custom(function = "validate_object_name"))]
    pub name: String,
    /// Glob template; `{app}` is replaced by the application name
    #[validate(length(min = 1, max = 255))]
    pub host_pattern: String,
    #[serde(default = "Role::defaults")]
    #[validate(length(min = 1, message = "At least one role is required"))]
    pub roles: Vec<Role>,
}

impl Environment {
    pub fn new(name: &str, host_pattern: &str) -> Self {
        Self {
            name: name.to_string(),
            host_pattern: host_pattern.to_string(),
            roles: Role::defaults(),
        }
    }

    /// Host pattern with the application placeholder filled in
    pub fn resolved_pattern(&self, app_name: &str) -> String {
        self.host_pattern.replace("{app}", app_name)
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

/// DEV, QUA and PRD, each matched by `*{app}*<stage>*`
pub fn default_environments() -> Vec<Environment> {
    vec![
        Environment::new("DEV", "*{app}*dev*"),
        Environment::new("QUA", "*{app}*qua*"),
        Environment::new("PRD", "*{app}*prd*"),
    ]
}

/// Application entity as persisted in the configuration document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Application {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub realms: Vec<String>,
    #[serde(default = "default_environments")]
    pub environments: Vec<Environment>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_applied: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_apply_results: Option<ProvisionReport>,
}

impl Application {
    pub fn new(input: CreateApplicationInput) -> Self {
        let now = Utc::now();
        let mut realms: Vec<String> = Vec::with_capacity(input.realms.len());
        for realm in input.realms {
            if !realms.contains(&realm) {
                realms.push(realm);
            }
        }
        let environments = if input.environments.is_empty() {
            default_environments()
        } else {
            input.environments
        };

        Self {
            name: input.name,
            description: input.description,
            realms,
            environments,
            created_at: now,
            updated_at: now,
            last_applied: None,
            last_apply_results: None,
        }
    }

    /// Case-insensitive environment lookup
    pub fn environment(&self, name: &str) -> Option<&Environment> {
        self.environments
            .iter()
            .find(|env| env.name.eq_ignore_ascii_case(name))
    }

    pub fn has_realm(&self, realm: &str) -> bool {
        self.realms.iter().any(|r| r == realm)
    }
}

/// Input for declaring a new application
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateApplicationInput {
    #[validate(custom(function = "validate_object_name"))]
    pub name: String,
    #[serde(default)]
    #[validate(length(max = 1024))]
    pub description: String,
    #[validate(custom(function = "validate_realms"))]
    pub realms: Vec<String>,
    /// Empty means the DEV/QUA/PRD defaults
    #[serde(default)]
    #[validate(nested, custom(function = "validate_unique_environments"))]
    pub environments: Vec<Environment>,
}

/// Application and environment names end up inside directory object names
pub fn validate_object_name(name: &str) -> Result<(), validator::ValidationError> {
    if OBJECT_NAME_REGEX.is_match(name) {
        Ok(())
    } else {
        Err(validator::ValidationError::new("invalid_object_name"))
    }
}

pub fn validate_realm(realm: &str) -> Result<(), validator::ValidationError> {
    if REALM_REGEX.is_match(realm) {
        Ok(())
    } else {
        Err(validator::ValidationError::new("invalid_realm"))
    }
}

fn validate_realms(realms: &[String]) -> Result<(), validator::ValidationError> {
    realms.iter().try_for_each(|realm| validate_realm(realm))
}

/// `DEV` and `dev` would share one host group and one set of cells
fn validate_unique_environments(
    environments: &[Environment],
) -> Result<(), validator::ValidationError> {
    for (i, env) in environments.iter().enumerate() {
        if environments[..i]
            .iter()
            .any(|earlier| earlier.name.eq_ignore_ascii_case(&env.name))
        {
            let mut error = validator::ValidationError::new("duplicate_environment");
            error.message = Some(format!("Environment {} is declared twice", env.name).into());
            return Err(error);
        }
    }
    Ok(())
}

lazy_static::lazy_static! {
    pub static ref OBJECT_NAME_REGEX: regex::Regex =
        regex::Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]{0,62}$").unwrap();
    pub static ref REALM_REGEX: regex::Regex =
        regex::Regex::new(r"^[A-Za-z0-9][A-Za-z0-9.-]{0,252}$").unwrap();
}
