use std::time::Duration;
use tracing::info;

use crate::cloud::RdsApi;
use crate::error::Result;
use crate::poller::{self, PollStatus, Poller};
use crate::probe;
use crate::types::Observation;

/// Promotes a read replica and waits for its side effects to settle.
#[derive(Debug, Clone, Copy)]
pub struct Promoter<'a> {
    poller: &'a Poller,
    settle: Duration,
    grace: Duration,
}

impl<'a> Promoter<'a> {
    pub fn new(poller: &'a Poller, settle: Duration, grace: Duration) -> Self {
        Self {
            poller,
            settle,
            grace,
        }
    }

    /// Issue `PromoteReadReplica` for `identifier`.
    ///
    /// Not retried: any API error aborts the pair. After the call, sleeps
    /// `settle`, polls until [`promotion_complete`] holds, then sleeps
    /// `grace` so DNS and proxy health catch up.
    pub async fn promote(&self, api: &dyn RdsApi, identifier: &str) -> Result<()> {
        info!(region = api.region(), identifier, "promoting read replica to primary");
        api.promote_replica(identifier).await?;

        let description = format!("promotion of {identifier}");
        poller::sleep(self.poller.cancel_token(), self.settle, &description).await?;
        self.poller
            .wait_until(&description, || async move {
                match probe::require(api, identifier).await {
                    Ok(obs) => promotion_status(&obs),
                    Err(err) => PollStatus::Failed(err),
                }
            })
            .await?;

        info!(identifier, "giving promotion side effects time to settle");
        poller::sleep(self.poller.cancel_token(), self.grace, &description).await?;
        info!(region = api.region(), identifier, "promotion complete");
        Ok(())
    }
}

/// A promoted instance is done once it is `available`, no longer names a
/// replication source, and reports a backup retention period.
pub fn promotion_complete(obs: &Observation) -> bool {
    obs.exists
        && obs.status.is_available()
        && obs.replica_source.is_none()
        && obs.backup_retention.is_some_and(|days| days >= 0)
}

fn promotion_status(obs: &Observation) -> PollStatus {
    if promotion_complete(obs) {
        PollStatus::Satisfied
    } else if !obs.status.is_available() {
        PollStatus::pending(&obs.status)
    } else if obs.replica_source.is_some() {
        PollStatus::pending("available, still linked to replication source")
    } else {
        PollStatus::pending("available, applying backup configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailoverError;
    use crate::fake::FakeRds;
    use crate::types::InstanceStatus;
    use tokio::time::Instant;
    use tokio_util::sync::CancellationToken;

    fn observation(status: InstanceStatus, source: Option<&str>, backup: Option<i32>) -> Observation {
        Observation {
            identifier: "db-b".to_string(),
            exists: true,
            status,
            replica_source: source.map(str::to_string),
            instance_class: Some("db.r5.large".to_string()),
            option_group: None,
            backup_retention: backup,
        }
    }

    #[test]
    fn not_complete_while_replica_source_is_set() {
        let obs = observation(InstanceStatus::Available, Some("db-a"), Some(7));
        assert!(!promotion_complete(&obs));
        assert!(matches!(promotion_status(&obs), PollStatus::Pending(_)));
    }

    #[test]
    fn not_complete_without_backup_retention() {
        let obs = observation(InstanceStatus::Available, None, None);
        assert!(!promotion_complete(&obs));
        let obs = observation(InstanceStatus::Available, None, Some(-1));
        assert!(!promotion_complete(&obs));
    }

    #[test]
    fn complete_when_available_unlinked_and_backed_up() {
        assert!(promotion_complete(&observation(
            InstanceStatus::Available,
            None,
            Some(0)
        )));
        assert!(!promotion_complete(&observation(
            InstanceStatus::Other("modifying".into()),
            None,
            Some(1)
        )));
    }

    #[tokio::test(start_paused = true)]
    async fn promote_waits_through_linked_available_state() {
        let fake = FakeRds::new("us-west-2");
        fake.add_replica("db-b", "db.r5.large", "arn:aws:rds:us-east-1:1:db:db-a");
        let p = Poller::new(Duration::from_secs(10), Some(10), CancellationToken::new());
        let promoter = Promoter::new(&p, Duration::from_secs(60), Duration::from_secs(15));

        let start = Instant::now();
        promoter.promote(&fake, "db-b").await.unwrap();

        let desc = fake.instance("db-b").unwrap();
        assert_eq!(desc.replica_source, None);
        assert_eq!(desc.status, "available");
        // settle + 4 checks (modifying, available-linked, ..., unlinked) + grace
        assert_eq!(fake.calls("describe_instance"), 4);
        assert_eq!(start.elapsed(), Duration::from_secs(60 + 4 * 10 + 15));
    }

    #[tokio::test]
    async fn promote_error_is_not_retried() {
        let fake = FakeRds::new("us-west-2");
        fake.add_primary("db-b", "db.r5.large");
        let p = Poller::new(Duration::ZERO, Some(5), CancellationToken::new());
        let err = Promoter::new(&p, Duration::ZERO, Duration::ZERO)
            .promote(&fake, "db-b")
            .await
            .unwrap_err();
        assert!(matches!(err, FailoverError::Cloud { .. }));
        assert_eq!(fake.calls("promote_replica"), 1);
        assert_eq!(fake.calls("describe_instance"), 0);
    }
}
