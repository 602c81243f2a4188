use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::plan::{PairPlan, Step};
use crate::types::Direction;

/// How one configured pair ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PairOutcome {
    Succeeded {
        primary: String,
        primary_region: String,
        /// Standby created (or found) by failback preparation.
        standby: Option<String>,
        /// Identifier the demoted primary was renamed to.
        renamed: Option<String>,
    },
    Planned { plan: PairPlan },
    Failed { step: Step, error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairReport {
    pub index: usize,
    pub destination: String,
    #[serde(flatten)]
    pub outcome: PairOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub switching_to: Direction,
    pub dry_run: bool,
    pub pairs: Vec<PairReport>,
}

impl RunReport {
    pub fn failed(&self) -> impl Iterator<Item = &PairReport> {
        self.pairs
            .iter()
            .filter(|p| matches!(p.outcome, PairOutcome::Failed { .. }))
    }

    pub fn is_success(&self) -> bool {
        self.failed().next().is_none()
    }
}
