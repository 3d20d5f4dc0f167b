//! Configuration management for ACF Core

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server host
    pub http_host: String,
    /// HTTP server port
    pub http_port: u16,
    /// Allowed CORS origins; empty means any
    pub cors_origins: Vec<String>,
    /// Identity directory configuration
    pub directory: DirectoryConfig,
    /// Configuration store configuration
    pub store: StoreConfig,
    /// Temporary access lifecycle configuration
    pub lifecycle: LifecycleConfig,
    /// Provisioning configuration
    pub provisioning: ProvisioningConfig,
    /// Telemetry configuration
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    /// Path or name of the `ipa` executable
    pub ipa_binary: String,
    /// Upper bound for a single directory command
    pub command_timeout_secs: u64,
    /// Service attached to every host-based-access rule
    pub hbac_service: String,
}

impl DirectoryConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            ipa_binary: "ipa".to_string(),
            command_timeout_secs: 30,
            hbac_service: "sshd".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Main JSON document
    pub config_path: PathBuf,
    /// Directory receiving a snapshot before every save
    pub backup_dir: PathBuf,
    /// File name prefix for snapshots
    pub backup_prefix: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from("/etc/idm_acf.json"),
            backup_dir: PathBuf::from("/var/log"),
            backup_prefix: "idm_acf_backup".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// Period of the background expiration sweep
    pub sweep_interval_secs: u64,
    /// Longest grant a caller may request
    pub max_grant_hours: i64,
}

impl LifecycleConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: 60,
            max_grant_hours: 168,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProvisioningConfig {
    /// Maximum number of role/realm cells built at the same time
    pub max_concurrency: usize,
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        Self { max_concurrency: 4 }
    }
}

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// "json" or "pretty"
    pub log_format: String,
    pub metrics_enabled: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_format: "pretty".to_string(),
            metrics_enabled: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_host: "0.0.0.0".to_string(),
            http_port: 8000,
            cors_origins: Vec::new(),
            directory: DirectoryConfig::default(),
            store: StoreConfig::default(),
            lifecycle: LifecycleConfig::default(),
            provisioning: ProvisioningConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            http_host: env::var("HTTP_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            http_port: env::var("HTTP_PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()
                .context("Invalid HTTP_PORT")?,
            cors_origins: env::var("CORS_ORIGINS")
                .map(|s| {
                    s.split(',')
                        .map(|o| o.trim().to_string())
                        .filter(|o| !o.is_empty())
                        .collect()
                })
                .unwrap_or_else(|_| {
                    vec![
                        "http://localhost:3000".to_string(),
                        "http://localhost:8080".to_string(),
                    ]
                }),
            directory: DirectoryConfig {
                ipa_binary: env::var("IPA_BINARY").unwrap_or_else(|_| "ipa".to_string()),
                command_timeout_secs: env::var("DIRECTORY_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()
                    .context("Invalid DIRECTORY_TIMEOUT_SECS")?,
                hbac_service: env::var("HBAC_SERVICE").unwrap_or_else(|_| "sshd".to_string()),
            },
            store: StoreConfig {
                config_path: env::var("ACF_CONFIG_PATH")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from("/etc/idm_acf.json")),
                backup_dir: env::var("ACF_BACKUP_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from("/var/log")),
                backup_prefix: env::var("ACF_BACKUP_PREFIX")
                    .unwrap_or_else(|_| "idm_acf_backup".to_string()),
            },
            lifecycle: LifecycleConfig {
                sweep_interval_secs: env::var("SWEEP_INTERVAL_SECS")
                    .unwrap_or_else(|_| "60".to_string())
                    .parse()
                    .unwrap_or(60),
                max_grant_hours: env::var("MAX_GRANT_HOURS")
                    .unwrap_or_else(|_| "168".to_string())
                    .parse()
                    .unwrap_or(168),
            },
            provisioning: ProvisioningConfig {
                max_concurrency: env::var("PROVISION_CONCURRENCY")
                    .unwrap_or_else(|_| "4".to_string())
                    .parse()
                    .unwrap_or(4),
            },
            telemetry: TelemetryConfig {
                log_format: env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string()),
                metrics_enabled: env::var("METRICS_ENABLED")
                    .map(|s| s.to_lowercase() == "true")
                    .unwrap_or(false),
            },
        })
    }

    /// Get HTTP server address
    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }
}
