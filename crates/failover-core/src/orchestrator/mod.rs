//! Per-pair failover workflow.
//!
//! ```text
//! probe destination ─▶ EntryDecision
//!     ├─ DeleteAndRecreate ─▶ delete ─▶ create replica ─┐
//!     ├─ CreateReplica ──────────────▶ create replica ──┤
//!     └─ PromoteExisting{Replica,Primary} ──────────────┤
//!                                                       ▼
//!                        promote ─▶ copy proxy settings ─▶ retarget proxy
//!                                                       │
//!            (process_current_environment) ─▶ rename old ─▶ create back replica
//! ```
//!
//! Pairs run sequentially. A failure aborts only the pair it happens in; the
//! run continues with the next pair. Every branch starts from a fresh probe,
//! so re-running after a crash picks up where the cloud state actually is.

pub mod plan;
pub mod report;

pub use plan::{decide_entry, decide_failback, EntryDecision, FailbackDecision, PairPlan, Step};
pub use report::{PairOutcome, PairReport, RunReport};

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::cloud::{instance_arn, CreateReplicaRequest, RdsApi};
use crate::config::{DatabasePair, FailoverConfig, InstanceConfig, RunOptions};
use crate::delay::Delayed;
use crate::error::{FailoverError, Result};
use crate::poller::Poller;
use crate::probe;
use crate::promotion::Promoter;
use crate::proxy::{self, ProxyRetargeter};
use crate::replica::ReplicaLifecycle;
use crate::stamp::Stamper;
use crate::types::{Direction, Observation};

// ---------------------------------------------------------------------------
// Side
// ---------------------------------------------------------------------------

/// One region's view of a pair: its client, region name and static config.
#[derive(Clone, Copy)]
struct Side<'a> {
    api: &'a dyn RdsApi,
    region: &'a str,
    config: &'a InstanceConfig,
}

impl Side<'_> {
    fn id(&self) -> &str {
        &self.config.identifier
    }
}

/// A pair-level failure attributed to the step it happened in.
struct StepError {
    step: Step,
    error: FailoverError,
}

fn at(step: Step) -> impl FnOnce(FailoverError) -> StepError {
    move |error| StepError { step, error }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct Orchestrator {
    config: FailoverConfig,
    options: RunOptions,
    active: Arc<dyn RdsApi>,
    failover: Arc<dyn RdsApi>,
    poller: Poller,
    stamper: Stamper,
}

impl Orchestrator {
    /// `active` and `failover` must be clients for the configured regions.
    /// When `options.api_delay` is non-zero both are wrapped in [`Delayed`].
    pub fn new(
        config: FailoverConfig,
        options: RunOptions,
        active: Arc<dyn RdsApi>,
        failover: Arc<dyn RdsApi>,
    ) -> Self {
        let cancel = CancellationToken::new();
        let delayed = |api: Arc<dyn RdsApi>| -> Arc<dyn RdsApi> {
            if options.api_delay.is_zero() {
                api
            } else {
                Arc::new(Delayed::new(api, options.api_delay).with_cancel_token(cancel.clone()))
            }
        };
        let (active, failover) = (delayed(active), delayed(failover));
        let poller = Poller::new(
            options.timings.poll_interval,
            options.max_poll_attempts,
            cancel,
        );
        Self {
            config,
            options,
            active,
            failover,
            poller,
            stamper: Stamper::system(),
        }
    }

    /// Cancelling the returned token (e.g. on Ctrl-C) aborts the current
    /// wait and every pair not yet started.
    pub fn cancel_token(&self) -> CancellationToken {
        self.poller.cancel_token().clone()
    }

    pub fn with_stamper(mut self, stamper: Stamper) -> Self {
        self.stamper = stamper;
        self
    }

    /// Process every configured pair in order.
    pub async fn run(&self) -> RunReport {
        let run_id = Uuid::new_v4();
        let span = info_span!("run", %run_id, switching_to = %self.options.switching_to);
        async {
            info!(
                pairs = self.config.rds.len(),
                dry_run = self.options.dry_run,
                process_current_environment = self.options.process_current_environment,
                force_delete = self.options.force_delete,
                "starting RDS failover"
            );
            let mut pairs = Vec::with_capacity(self.config.rds.len());
            for (index, pair) in self.config.rds.iter().enumerate() {
                let (destination, _) = self.sides(pair);
                let destination_id = destination.id().to_string();
                let span = info_span!("pair", index, destination = %destination_id);

                let outcome = if self.poller.cancel_token().is_cancelled() {
                    warn!(index, "run cancelled; pair not started");
                    PairOutcome::Failed {
                        step: Step::Probe,
                        error: FailoverError::Cancelled {
                            description: format!("pair {destination_id}"),
                        }
                        .to_string(),
                    }
                } else {
                    match self.run_pair(pair).instrument(span.clone()).await {
                        Ok(outcome) => outcome,
                        Err(StepError { step, error }) => {
                            span.in_scope(|| {
                                error!(step = %step, error = %error, "pair failed; continuing with next pair")
                            });
                            PairOutcome::Failed {
                                step,
                                error: error.to_string(),
                            }
                        }
                    }
                };
                pairs.push(PairReport {
                    index,
                    destination: destination_id,
                    outcome,
                });
            }
            let report = RunReport {
                run_id,
                switching_to: self.options.switching_to,
                dry_run: self.options.dry_run,
                pairs,
            };
            info!(failed = report.failed().count(), "RDS failover finished");
            report
        }
        .instrument(span)
        .await
    }

    /// (destination, source) for the configured direction.
    fn sides<'a>(&'a self, pair: &'a DatabasePair) -> (Side<'a>, Side<'a>) {
        let active = Side {
            api: self.active.as_ref(),
            region: &self.config.active_region,
            config: &pair.active,
        };
        let failover = Side {
            api: self.failover.as_ref(),
            region: &self.config.failover_region,
            config: &pair.failover,
        };
        match self.options.switching_to {
            Direction::TowardActive => (active, failover),
            Direction::TowardFailover => (failover, active),
        }
    }

    fn lifecycle(&self) -> ReplicaLifecycle<'_> {
        ReplicaLifecycle::new(&self.poller, &self.stamper)
    }

    fn promoter(&self) -> Promoter<'_> {
        let timings = &self.options.timings;
        Promoter::new(&self.poller, timings.promotion_settle, timings.promotion_grace)
    }

    fn retargeter(&self) -> ProxyRetargeter<'_> {
        ProxyRetargeter::new(
            self.poller.cancel_token(),
            self.options.timings.deregistration_grace,
        )
    }

    async fn run_pair(&self, pair: &DatabasePair) -> std::result::Result<PairOutcome, StepError> {
        let (dest, source) = self.sides(pair);
        let force_delete = pair.force_delete || self.options.force_delete;

        info!(region = dest.region, identifier = dest.id(), "checking destination instance");
        let observed = probe::observe(dest.api, dest.id())
            .await
            .map_err(at(Step::Probe))?;
        let entry = decide_entry(&observed, source.id(), force_delete);

        if self.options.dry_run {
            let failback = if self.options.process_current_environment {
                let other = probe::observe(source.api, source.id())
                    .await
                    .map_err(at(Step::Probe))?;
                Some(decide_failback(&other, dest.id()))
            } else {
                None
            };
            let plan = PairPlan::new(dest.id(), dest.region, entry, failback);
            info!(steps = ?plan.steps, "dry run: no changes made");
            return Ok(PairOutcome::Planned { plan });
        }

        match entry {
            EntryDecision::PromoteExistingReplica { source_matches: true } => {
                info!(
                    identifier = dest.id(),
                    "already a read replica of the expected source; skipping deletion and creation"
                );
            }
            EntryDecision::PromoteExistingReplica { source_matches: false } => {
                warn!(
                    identifier = dest.id(),
                    source = observed.replica_source.as_deref().unwrap_or_default(),
                    expected = source.id(),
                    "read replica is replicating from an unexpected source; promoting anyway"
                );
            }
            EntryDecision::PromoteExistingPrimary => {
                warn!(
                    identifier = dest.id(),
                    "destination already exists as a primary and force delete is off; \
                     skipping deletion and issuing promotion"
                );
            }
            EntryDecision::DeleteAndRecreate => {
                self.lifecycle()
                    .delete_instance(dest.api, dest.id())
                    .await
                    .map_err(at(Step::DeleteInstance))?;
                self.create_forward_replica(&dest, &source)
                    .await
                    .map_err(at(Step::CreateReplica))?;
            }
            EntryDecision::CreateReplica => {
                self.create_forward_replica(&dest, &source)
                    .await
                    .map_err(at(Step::CreateReplica))?;
            }
        }

        self.promoter()
            .promote(dest.api, dest.id())
            .await
            .map_err(at(Step::Promote))?;
        info!(
            region = dest.region,
            identifier = dest.id(),
            "promoted; point application connections at the new primary"
        );

        let proxy_name = dest.config.proxy_name.as_str();
        proxy::copy_proxy_settings(dest.api, proxy_name)
            .await
            .map_err(at(Step::CopyProxySettings))?;
        self.retargeter()
            .retarget(dest.api, proxy_name, dest.id())
            .await
            .map_err(at(Step::RetargetProxy))?;

        let (standby, renamed) = if self.options.process_current_environment {
            self.prepare_failback(&dest, &source).await?
        } else {
            (None, None)
        };

        info!(region = dest.region, identifier = dest.id(), "now the primary");
        if let Some(standby) = &standby {
            info!(region = source.region, identifier = %standby, "now a read replica");
        }
        Ok(PairOutcome::Succeeded {
            primary: dest.id().to_string(),
            primary_region: dest.region.to_string(),
            standby,
            renamed,
        })
    }

    /// Create the destination as a replica of the source's current primary,
    /// using the source's live instance class.
    async fn create_forward_replica(&self, dest: &Side<'_>, source: &Side<'_>) -> Result<()> {
        let template = probe::require(source.api, source.id()).await?;
        self.create_replica(dest, source, &template, None).await
    }

    /// Re-establish the demoted side as a standby of the new primary.
    async fn prepare_failback(
        &self,
        new_primary: &Side<'_>,
        demoted: &Side<'_>,
    ) -> std::result::Result<(Option<String>, Option<String>), StepError> {
        let other = probe::observe(demoted.api, demoted.id())
            .await
            .map_err(at(Step::Probe))?;

        let (template, renamed) = match decide_failback(&other, new_primary.id()) {
            FailbackDecision::AlreadyStandby { source_matches } => {
                if source_matches {
                    info!(
                        identifier = demoted.id(),
                        "already a standby of the new primary; nothing to prepare"
                    );
                } else {
                    warn!(
                        identifier = demoted.id(),
                        source = other.replica_source.as_deref().unwrap_or_default(),
                        expected = new_primary.id(),
                        "existing standby replicates from an unexpected source; leaving it in place"
                    );
                }
                return Ok((Some(demoted.id().to_string()), None));
            }
            FailbackDecision::RenameAndCreate => {
                let renamed = self
                    .lifecycle()
                    .rename_instance(demoted.api, demoted.id())
                    .await
                    .map_err(at(Step::RenameOld))?;
                info!(identifier = %renamed, "renamed former primary");
                let template = probe::require(demoted.api, &renamed)
                    .await
                    .map_err(at(Step::RenameOld))?;
                (template, Some(renamed))
            }
            FailbackDecision::CreateOnly => {
                info!(
                    region = demoted.region,
                    identifier = demoted.id(),
                    "former primary not found; creating standby from the new primary's shape"
                );
                let template = probe::require(new_primary.api, new_primary.id())
                    .await
                    .map_err(at(Step::CreateBackReplica))?;
                (template, None)
            }
        };

        // Option groups are regional: only carry one over from an instance
        // in the standby's own region.
        let option_group = renamed.as_ref().and(template.option_group.clone());
        self.create_replica(demoted, new_primary, &template, option_group)
            .await
            .map_err(at(Step::CreateBackReplica))?;
        Ok((Some(demoted.id().to_string()), renamed))
    }

    /// Create `target.id()` in `target`'s region as a replica of `source`'s
    /// instance, shaped after `template`.
    async fn create_replica(
        &self,
        target: &Side<'_>,
        source: &Side<'_>,
        template: &Observation,
        option_group: Option<String>,
    ) -> Result<()> {
        let instance_class =
            template
                .instance_class
                .clone()
                .ok_or_else(|| FailoverError::MissingField {
                    resource: format!("DB instance {}", template.identifier),
                    field: "DBInstanceClass".to_string(),
                })?;
        let account_id = target.api.account_id().await?;
        let request = CreateReplicaRequest {
            identifier: target.id().to_string(),
            source_arn: instance_arn(source.region, &account_id, source.id()),
            source_region: source.region.to_string(),
            instance_class,
            subnet_group: target.config.subnet_group_name.clone(),
            security_group_ids: target.config.security_group_ids.clone(),
            kms_key_id: target.config.kms_key().map(str::to_string),
            option_group,
        };
        self.lifecycle().create_replica(target.api, &request).await
    }
}
