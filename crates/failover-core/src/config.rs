use crate::error::{FailoverError, Result};
use crate::types::Direction;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

/// RDS rejects identifiers longer than this.
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// Length of the `-YYYYMMDD-HHMMSS` suffix appended on rename.
pub const RENAME_SUFFIX_LEN: usize = 16;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// InstanceConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicaConfiguration {
    pub identifier: String,
}

/// One side (active or failover) of a database pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceConfig {
    pub identifier: String,
    pub proxy_name: String,
    pub subnet_group_name: String,
    #[serde(default)]
    pub security_group_ids: Vec<String>,
    #[serde(default)]
    pub kms_key_id: Option<String>,
    #[serde(default)]
    pub replica_configuration: Option<ReplicaConfiguration>,
}

impl InstanceConfig {
    /// The KMS key, treating an empty string as unset.
    pub fn kms_key(&self) -> Option<&str> {
        self.kms_key_id.as_deref().filter(|k| !k.is_empty())
    }
}

// ---------------------------------------------------------------------------
// DatabasePair
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabasePair {
    #[serde(rename = "active_configurations")]
    pub active: InstanceConfig,
    #[serde(rename = "failover_configurations")]
    pub failover: InstanceConfig,
    /// Per-pair override; `RunOptions::force_delete` applies to every pair.
    #[serde(default)]
    pub force_delete: bool,
}

// ---------------------------------------------------------------------------
// FailoverConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailoverConfig {
    pub active_region: String,
    pub failover_region: String,
    #[serde(default)]
    pub rds: Vec<DatabasePair>,
}

impl FailoverConfig {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(FailoverError::ConfigNotFound(path.to_path_buf()));
        }
        let data = std::fs::read_to_string(path)?;
        Self::from_json(&data)
    }

    pub fn from_json(data: &str) -> Result<Self> {
        Ok(serde_json::from_str(data)?)
    }

    /// Check the configuration for mistakes that would fail mid-run.
    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let mut error = |message: String| {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message,
            })
        };

        if self.active_region.trim().is_empty() {
            error("active_region is empty".to_string());
        }
        if self.failover_region.trim().is_empty() {
            error("failover_region is empty".to_string());
        }
        if !self.active_region.is_empty() && self.active_region == self.failover_region {
            error(format!(
                "active_region and failover_region are both '{}'",
                self.active_region
            ));
        }
        if self.rds.is_empty() {
            error("no database pairs configured under 'rds'".to_string());
        }

        for (idx, pair) in self.rds.iter().enumerate() {
            for (side, cfg) in [("active", &pair.active), ("failover", &pair.failover)] {
                let at = format!("rds[{idx}].{side}_configurations");
                if !is_valid_identifier(&cfg.identifier) {
                    error(format!(
                        "{at}.identifier '{}' is not a valid DB instance identifier",
                        cfg.identifier
                    ));
                }
                if cfg.proxy_name.trim().is_empty() {
                    error(format!("{at}.proxy_name is empty"));
                }
                if cfg.subnet_group_name.trim().is_empty() {
                    error(format!("{at}.subnet_group_name is empty"));
                }
                if let Some(replica) = &cfg.replica_configuration {
                    if !is_valid_identifier(&replica.identifier) {
                        error(format!(
                            "{at}.replica_configuration.identifier '{}' is not a valid DB instance identifier",
                            replica.identifier
                        ));
                    }
                }
            }
        }

        for (idx, pair) in self.rds.iter().enumerate() {
            for cfg in [&pair.active, &pair.failover] {
                if cfg.identifier.len() + RENAME_SUFFIX_LEN > MAX_IDENTIFIER_LEN {
                    warnings.push(ConfigWarning {
                        level: WarnLevel::Warning,
                        message: format!(
                            "rds[{idx}] identifier '{}' is too long to be renamed during failback preparation",
                            cfg.identifier
                        ),
                    });
                }
            }
        }

        warnings
    }

    /// Returns an error naming every `Error`-level finding, if any.
    pub fn ensure_valid(&self) -> Result<()> {
        let errors: Vec<String> = self
            .validate()
            .into_iter()
            .filter(|w| w.level == WarnLevel::Error)
            .map(|w| w.message)
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(FailoverError::InvalidConfig(errors.join("; ")))
        }
    }
}

/// RDS instance identifier rules: 1-63 characters, a letter first, letters,
/// digits and hyphens only, no trailing hyphen and no two consecutive hyphens.
pub fn is_valid_identifier(identifier: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z][A-Za-z0-9-]{0,62}$").unwrap()
    });
    re.is_match(identifier) && !identifier.ends_with('-') && !identifier.contains("--")
}

// ---------------------------------------------------------------------------
// RunOptions
// ---------------------------------------------------------------------------

/// Fixed waits used by the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timings {
    /// Sleep between polling attempts.
    pub poll_interval: Duration,
    /// Sleep after issuing a promotion, before the first check.
    pub promotion_settle: Duration,
    /// Sleep after promotion is observed complete.
    pub promotion_grace: Duration,
    /// Sleep after deregistering proxy targets.
    pub deregistration_grace: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
            promotion_settle: Duration::from_secs(60),
            promotion_grace: Duration::from_secs(15),
            deregistration_grace: Duration::from_secs(15),
        }
    }
}

impl Timings {
    pub fn zero() -> Self {
        Self {
            poll_interval: Duration::ZERO,
            promotion_settle: Duration::ZERO,
            promotion_grace: Duration::ZERO,
            deregistration_grace: Duration::ZERO,
        }
    }
}

/// Per-invocation settings, passed explicitly to every component.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOptions {
    pub switching_to: Direction,
    pub force_delete: bool,
    pub process_current_environment: bool,
    pub dry_run: bool,
    pub timings: Timings,
    /// `None` polls until the condition holds.
    pub max_poll_attempts: Option<u32>,
    /// Delay inserted before every cloud API call; zero disables it.
    pub api_delay: Duration,
}

impl RunOptions {
    pub fn new(switching_to: Direction) -> Self {
        Self {
            switching_to,
            force_delete: false,
            process_current_environment: false,
            dry_run: false,
            timings: Timings::default(),
            max_poll_attempts: None,
            api_delay: Duration::ZERO,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
