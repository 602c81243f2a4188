//! Pure decision logic: what a pair needs, given what the probe saw.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{Observation, Role};

// ---------------------------------------------------------------------------
// EntryDecision
// ---------------------------------------------------------------------------

/// How the destination instance gets to the point where it can be promoted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntryDecision {
    /// Already a replica; skip creation. A mismatched source is only warned about.
    PromoteExistingReplica { source_matches: bool },
    /// A primary sits on the identifier and `force_delete` allows removing it.
    DeleteAndRecreate,
    /// A primary sits on the identifier and may not be deleted; promotion is
    /// still issued against it.
    PromoteExistingPrimary,
    /// Nothing there yet.
    CreateReplica,
}

pub fn decide_entry(destination: &Observation, expected_source: &str, force_delete: bool) -> EntryDecision {
    match destination.role() {
        Role::Replica => EntryDecision::PromoteExistingReplica {
            source_matches: destination.replicates_from(expected_source),
        },
        Role::Primary if force_delete => EntryDecision::DeleteAndRecreate,
        Role::Primary => EntryDecision::PromoteExistingPrimary,
        Role::Absent => EntryDecision::CreateReplica,
    }
}

// ---------------------------------------------------------------------------
// FailbackDecision
// ---------------------------------------------------------------------------

/// What failback preparation must do with the demoted side's identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FailbackDecision {
    /// The old primary still holds the identifier: rename it, then create the
    /// standby under the freed name.
    RenameAndCreate,
    /// The identifier is free (region lost, or a previous run renamed it).
    CreateOnly,
    /// A standby already exists under the identifier.
    AlreadyStandby { source_matches: bool },
}

pub fn decide_failback(other_side: &Observation, new_primary: &str) -> FailbackDecision {
    match other_side.role() {
        Role::Primary => FailbackDecision::RenameAndCreate,
        Role::Absent => FailbackDecision::CreateOnly,
        Role::Replica => FailbackDecision::AlreadyStandby {
            source_matches: other_side.replicates_from(new_primary),
        },
    }
}

// ---------------------------------------------------------------------------
// Step / PairPlan
// ---------------------------------------------------------------------------

/// One stage of a pair's workflow; also used to attribute failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Probe,
    DeleteInstance,
    CreateReplica,
    Promote,
    CopyProxySettings,
    RetargetProxy,
    RenameOld,
    CreateBackReplica,
}

impl Step {
    pub fn as_str(self) -> &'static str {
        match self {
            Step::Probe => "probe",
            Step::DeleteInstance => "delete_instance",
            Step::CreateReplica => "create_replica",
            Step::Promote => "promote",
            Step::CopyProxySettings => "copy_proxy_settings",
            Step::RetargetProxy => "retarget_proxy",
            Step::RenameOld => "rename_old",
            Step::CreateBackReplica => "create_back_replica",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The ordered steps a pair would run, computed from read-only probes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairPlan {
    pub destination: String,
    pub destination_region: String,
    pub entry: EntryDecision,
    pub failback: Option<FailbackDecision>,
    pub steps: Vec<Step>,
}

impl PairPlan {
    pub fn new(
        destination: impl Into<String>,
        destination_region: impl Into<String>,
        entry: EntryDecision,
        failback: Option<FailbackDecision>,
    ) -> Self {
        let mut steps = Vec::new();
        match entry {
            EntryDecision::DeleteAndRecreate => {
                steps.push(Step::DeleteInstance);
                steps.push(Step::CreateReplica);
            }
            EntryDecision::CreateReplica => steps.push(Step::CreateReplica),
            EntryDecision::PromoteExistingReplica { .. } | EntryDecision::PromoteExistingPrimary => {}
        }
        steps.extend([Step::Promote, Step::CopyProxySettings, Step::RetargetProxy]);
        match failback {
            Some(FailbackDecision::RenameAndCreate) => {
                steps.push(Step::RenameOld);
                steps.push(Step::CreateBackReplica);
            }
            Some(FailbackDecision::CreateOnly) => steps.push(Step::CreateBackReplica),
            Some(FailbackDecision::AlreadyStandby { .. }) | None => {}
        }
        Self {
            destination: destination.into(),
            destination_region: destination_region.into(),
            entry,
            failback,
            steps,
        }
    }
}
