//! Create, delete and rename DB instances, each waited to completion.

use tracing::{info, warn};

use crate::cloud::{CreateReplicaRequest, RdsApi};
use crate::config::MAX_IDENTIFIER_LEN;
use crate::error::{FailoverError, Result};
use crate::poller::{PollStatus, Poller};
use crate::probe;
use crate::stamp::Stamper;

#[derive(Debug, Clone, Copy)]
pub struct ReplicaLifecycle<'a> {
    poller: &'a Poller,
    stamper: &'a Stamper,
}

impl<'a> ReplicaLifecycle<'a> {
    pub fn new(poller: &'a Poller, stamper: &'a Stamper) -> Self {
        Self { poller, stamper }
    }

    /// Issue `CreateDBInstanceReadReplica` in `api`'s region and wait for
    /// the new instance to report `available`.
    pub async fn create_replica(&self, api: &dyn RdsApi, request: &CreateReplicaRequest) -> Result<()> {
        info!(
            region = api.region(),
            identifier = %request.identifier,
            source = %request.source_arn,
            instance_class = %request.instance_class,
            "creating read replica"
        );
        let created = api.create_replica(request).await?;
        if created.status == "available" {
            return Ok(());
        }

        let identifier = request.identifier.as_str();
        let description = format!("{identifier} to become available");
        self.poller
            .wait_until(&description, || async move {
                match probe::observe(api, identifier).await {
                    Ok(obs) if obs.exists && obs.status.is_available() => PollStatus::Satisfied,
                    Ok(obs) if obs.exists => PollStatus::pending(obs.status),
                    Ok(_) => PollStatus::pending("not yet visible"),
                    Err(err) => PollStatus::Failed(err),
                }
            })
            .await?;
        info!(region = api.region(), identifier, "read replica is available");
        Ok(())
    }

    /// Delete `identifier` keeping a uniquely named final snapshot, and wait
    /// until the instance is gone. Returns the snapshot name.
    pub async fn delete_instance(&self, api: &dyn RdsApi, identifier: &str) -> Result<String> {
        let snapshot = self.stamper.snapshot_name(identifier);
        warn!(
            region = api.region(),
            identifier,
            final_snapshot = %snapshot,
            "deleting DB instance"
        );
        api.delete_instance(identifier, &snapshot).await?;

        let description = format!("{identifier} to be deleted");
        self.poller
            .wait_until(&description, || async move {
                match probe::observe(api, identifier).await {
                    Ok(obs) if !obs.exists => PollStatus::Satisfied,
                    Ok(obs) => PollStatus::pending(obs.status),
                    Err(err) => PollStatus::Failed(err),
                }
            })
            .await?;
        info!(region = api.region(), identifier, "DB instance deleted");
        Ok(snapshot)
    }

    /// Rename `identifier` to `<identifier>-<YYYYMMDD-HHMMSS>` and wait until
    /// the new name reports `available`. Returns the new identifier.
    pub async fn rename_instance(&self, api: &dyn RdsApi, identifier: &str) -> Result<String> {
        let renamed = self.stamper.renamed_identifier(identifier);
        if renamed.len() > MAX_IDENTIFIER_LEN {
            return Err(FailoverError::InvalidConfig(format!(
                "cannot rename {identifier}: '{renamed}' exceeds {MAX_IDENTIFIER_LEN} characters"
            )));
        }
        info!(region = api.region(), from = identifier, to = %renamed, "renaming DB instance");
        api.rename_instance(identifier, &renamed).await?;

        let new_id = renamed.as_str();
        let description = format!("rename of {identifier} to {new_id}");
        self.poller
            .wait_until(&description, || async move {
                match probe::observe(api, new_id).await {
                    Ok(obs) if obs.exists && obs.status.is_available() => {
                        return PollStatus::Satisfied
                    }
                    Ok(obs) if obs.exists => return PollStatus::pending(obs.status),
                    Ok(_) => {}
                    Err(err) => return PollStatus::Failed(err),
                }
                // The new name does not resolve yet; the old one may still.
                match probe::observe(api, identifier).await {
                    Ok(old) if old.exists => {
                        PollStatus::pending(format!("{identifier} still resolves ({})", old.status))
                    }
                    Ok(_) => PollStatus::pending(format!("{new_id} not yet visible")),
                    Err(err) => PollStatus::Failed(err),
                }
            })
            .await?;
        info!(region = api.region(), identifier = new_id, "rename complete");
        Ok(renamed)
    }
}
