//! Deterministic directory object names
//!
//! Every derived directory object is addressed by a name computed from the
//! owning (application, environment, role, realm) tuple, or from a temporary
//! request id. Nothing records which objects exist; callers recompute names.
//! Inputs are interpolated as-is, so they must be validated beforehand.

pub mod pattern;

pub use pattern::HostPattern;

use crate::domain::Role;
use uuid::Uuid;

/// Host group shared by all roles and realms of one environment
pub fn host_group_name(app: &str, env: &str) -> String {
    format!("{}-{}-hosts", app, env.to_lowercase())
}

/// Identity in the trusted realm that backs a permanent bridge group
pub fn bridge_identity(app: &str, env: &str, role: Role) -> String {
    format!("IdM_{}_{}_{}", app, env.to_lowercase(), role)
}

/// `temp-` plus the first eight characters of the request id
pub fn temporary_suffix(request_id: &Uuid) -> String {
    let id = request_id.simple().to_string();
    format!("temp-{}", &id[..8])
}

/// Names of one object graph cell
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectNames {
    pub host_group: String,
    pub bridge_group: String,
    pub posix_group: String,
    pub access_rule: String,
    pub sudo_rule: String,
}

impl ObjectNames {
    /// Names of the permanent graph for an application cell
    pub fn permanent(app: &str, env: &str, role: Role, realm: &str) -> Self {
        let env = env.to_lowercase();
        Self {
            host_group: host_group_name(app, &env),
            bridge_group: format!("{}-{}-{}-{}", app, env, role, realm),
            posix_group: format!("{}-{}-{}", app, env, role),
            access_rule: format!("{}-{}-{}-access", app, env, role),
            sudo_rule: format!("{}-{}-{}-sudo", app, env, role),
        }
    }

    /// Names of the ephemeral graph for a temporary request.
    ///
    /// The host group keeps its permanent name: temporary grants attach to the
    /// host group created by permanent provisioning.
    pub fn temporary(app: &str, env: &str, role: Role, realm: &str, request_id: &Uuid) -> Self {
        let suffix = temporary_suffix(request_id);
        let base = Self::permanent(app, env, role, realm);
        Self {
            host_group: base.host_group,
            bridge_group: format!("{}-{}", base.bridge_group, suffix),
            posix_group: format!("{}-{}", base.posix_group, suffix),
            access_rule: format!("{}-{}", base.access_rule, suffix),
            sudo_rule: format!("{}-{}", base.sudo_rule, suffix),
        }
    }
}
