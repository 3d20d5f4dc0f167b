//! Access roles and their privilege-escalation templates

use serde::{Deserialize, Serialize};

/// Closed set of roles an environment can declare.
///
/// Unknown role names fail deserialization, so a configuration document
/// naming a role without a template is rejected at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Full,
    Devops,
    Readonly,
}

/// Commands granted under privilege escalation for a role
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SudoTemplate {
    pub name: Role,
    pub description: &'static str,
    pub commands: &'static [&'static str],
}

const FULL_COMMANDS: &[&str] = &["ALL"];

const DEVOPS_COMMANDS: &[&str] = &[
    "/usr/bin/systemctl",
    "/usr/bin/journalctl",
    "/bin/systemctl",
    "/bin/journalctl",
];

const READONLY_COMMANDS: &[&str] = &[
    "/usr/bin/cat",
    "/usr/bin/less",
    "/usr/bin/tail",
    "/usr/bin/head",
    "/usr/bin/journalctl -xe",
];

impl Role {
    pub const ALL: [Role; 3] = [Role::Full, Role::Devops, Role::Readonly];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Devops => "devops",
            Self::Readonly => "readonly",
        }
    }

    pub fn sudo_template(&self) -> SudoTemplate {
        match self {
            Self::Full => SudoTemplate {
                name: *self,
                description: "Full sudo access",
                commands: FULL_COMMANDS,
            },
            Self::Devops => SudoTemplate {
                name: *self,
                description: "DevOps operations",
                commands: DEVOPS_COMMANDS,
            },
            Self::Readonly => SudoTemplate {
                name: *self,
                description: "Read-only access",
                commands: READONLY_COMMANDS,
            },
        }
    }

    /// Roles declared by an environment when none are given
    pub fn defaults() -> Vec<Role> {
        Self::ALL.to_vec()
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "full" => Ok(Self::Full),
            "devops" => Ok(Self::Devops),
            "readonly" => Ok(Self::Readonly),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
