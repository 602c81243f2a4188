use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::FailoverError;

// ---------------------------------------------------------------------------
// Direction
// ---------------------------------------------------------------------------

/// Which region a run is promoting toward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    TowardActive,
    TowardFailover,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::TowardActive => "ACTIVE",
            Direction::TowardFailover => "FAILOVER",
        }
    }
}

impl FromStr for Direction {
    type Err = FailoverError;

    /// Parses the `SWITCHING_TO` value (`ACTIVE` | `FAILOVER`, any case).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ACTIVE" => Ok(Direction::TowardActive),
            "FAILOVER" => Ok(Direction::TowardFailover),
            _ => Err(FailoverError::InvalidDirection(s.to_string())),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// InstanceStatus
// ---------------------------------------------------------------------------

/// The subset of RDS instance statuses the workflow branches on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    Creating,
    Available,
    Deleting,
    Other(String),
}

impl InstanceStatus {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "creating" => InstanceStatus::Creating,
            "available" => InstanceStatus::Available,
            "deleting" => InstanceStatus::Deleting,
            other => InstanceStatus::Other(other.to_string()),
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, InstanceStatus::Available)
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstanceStatus::Creating => f.write_str("creating"),
            InstanceStatus::Available => f.write_str("available"),
            InstanceStatus::Deleting => f.write_str("deleting"),
            InstanceStatus::Other(s) => f.write_str(s),
        }
    }
}

// ---------------------------------------------------------------------------
// Observation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Primary,
    Replica,
    Absent,
}

/// A point-in-time view of one DB instance, produced by the probe.
///
/// Observations are never mutated or cached across polling iterations;
/// every decision re-probes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub identifier: String,
    pub exists: bool,
    pub status: InstanceStatus,
    pub replica_source: Option<String>,
    pub instance_class: Option<String>,
    pub option_group: Option<String>,
    pub backup_retention: Option<i32>,
}

impl Observation {
    pub fn absent(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            exists: false,
            status: InstanceStatus::Other("not-found".to_string()),
            replica_source: None,
            instance_class: None,
            option_group: None,
            backup_retention: None,
        }
    }

    pub fn role(&self) -> Role {
        match (self.exists, self.replica_source.as_deref()) {
            (false, _) => Role::Absent,
            (true, Some(src)) if !src.is_empty() => Role::Replica,
            (true, _) => Role::Primary,
        }
    }

    /// True if this instance replicates from `expected`.
    ///
    /// Cross-region replicas report their source as an ARN
    /// (`arn:aws:rds:<region>:<account>:db:<id>`), same-region ones as a bare
    /// identifier.
    pub fn replicates_from(&self, expected: &str) -> bool {
        match self.replica_source.as_deref() {
            Some(src) => src == expected || src.ends_with(&format!(":db:{expected}")),
            None => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Proxy types
// ---------------------------------------------------------------------------

/// One entry of a proxy's `Auth` list, carried through unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProxyAuth {
    pub description: Option<String>,
    pub user_name: Option<String>,
    pub auth_scheme: Option<String>,
    pub secret_arn: Option<String>,
    pub iam_auth: Option<String>,
    pub client_password_auth_type: Option<String>,
}

/// The settings `ModifyDBProxy` needs re-applied as a whole.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProxySettings {
    pub proxy_name: String,
    pub auth: Vec<ProxyAuth>,
    pub idle_client_timeout: Option<i32>,
    pub debug_logging: bool,
    pub require_tls: bool,
    pub role_arn: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TargetKind {
    RdsInstance,
    RdsServerlessEndpoint,
    TrackedCluster,
    Other(String),
}

impl TargetKind {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "RDS_INSTANCE" => TargetKind::RdsInstance,
            "RDS_SERVERLESS_ENDPOINT" => TargetKind::RdsServerlessEndpoint,
            "TRACKED_CLUSTER" => TargetKind::TrackedCluster,
            other => TargetKind::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyTarget {
    pub kind: TargetKind,
    pub rds_resource_id: Option<String>,
}
