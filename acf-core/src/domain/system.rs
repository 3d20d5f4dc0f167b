//! Service-wide status

use super::temporary_access::AccessRequestStatus;
use crate::repository::ConfigDocument;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemStatus {
    /// The directory answered a trivial query
    pub directory_connected: bool,
    pub applications_count: usize,
    /// `None` when the directory could not be queried
    pub hosts_count: Option<usize>,
    pub trusts_count: Option<usize>,
    pub config_path: String,
    pub last_updated: Option<DateTime<Utc>>,
    pub temporary_access: BTreeMap<String, usize>,
}

impl SystemStatus {
    /// Zeroed counters for every request status
    pub fn empty_request_counts() -> BTreeMap<String, usize> {
        [
            AccessRequestStatus::Pending,
            AccessRequestStatus::Approved,
            AccessRequestStatus::Denied,
            AccessRequestStatus::Expired,
            AccessRequestStatus::Revoked,
        ]
        .iter()
        .map(|s| (s.to_string(), 0))
        .collect()
    }
}

/// Configuration document as handed out by the export endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigExport {
    pub configuration: ConfigDocument,
    pub exported_at: DateTime<Utc>,
    pub format: String,
}

impl ConfigExport {
    pub fn new(configuration: ConfigDocument, exported_at: DateTime<Utc>) -> Self {
        Self {
            configuration,
            exported_at,
            format: "json".to_string(),
        }
    }
}
