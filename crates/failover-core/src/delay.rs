use async_trait::async_trait;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::cloud::{CloudError, CloudResult, CreateReplicaRequest, DbInstance, RdsApi};
use crate::poller;
use crate::types::{ProxySettings, ProxyTarget};

/// Wraps an [`RdsApi`] and sleeps for a fixed interval before every call.
///
/// Spaces out control-plane requests during long runs so consecutive
/// describe/modify calls stay under the service's request rate. A zero delay
/// makes the wrapper transparent.
#[derive(Debug, Clone)]
pub struct Delayed<C> {
    inner: C,
    delay: Duration,
    cancel: CancellationToken,
}

impl<C> Delayed<C> {
    pub fn new(inner: C, delay: Duration) -> Self {
        Self {
            inner,
            delay,
            cancel: CancellationToken::new(),
        }
    }

    /// Cancelling `token` cuts a pending delay short; the call is not made.
    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn into_inner(self) -> C {
        self.inner
    }

    async fn pause(&self, operation: &str) -> CloudResult<()> {
        if self.delay.is_zero() {
            return Ok(());
        }
        trace!(operation, delay_ms = self.delay.as_millis() as u64, "delaying API call");
        poller::sleep(&self.cancel, self.delay, operation)
            .await
            .map_err(|_| CloudError::Cancelled(operation.to_string()))
    }
}

#[async_trait]
impl<C: RdsApi> RdsApi for Delayed<C> {
    fn region(&self) -> &str {
        self.inner.region()
    }

    async fn describe_instance(&self, identifier: &str) -> CloudResult<DbInstance> {
        self.pause("DescribeDBInstances").await?;
        self.inner.describe_instance(identifier).await
    }

    async fn create_replica(&self, request: &CreateReplicaRequest) -> CloudResult<DbInstance> {
        self.pause("CreateDBInstanceReadReplica").await?;
        self.inner.create_replica(request).await
    }

    async fn promote_replica(&self, identifier: &str) -> CloudResult<()> {
        self.pause("PromoteReadReplica").await?;
        self.inner.promote_replica(identifier).await
    }

    async fn delete_instance(&self, identifier: &str, final_snapshot: &str) -> CloudResult<()> {
        self.pause("DeleteDBInstance").await?;
        self.inner.delete_instance(identifier, final_snapshot).await
    }

    async fn rename_instance(&self, identifier: &str, new_identifier: &str) -> CloudResult<()> {
        self.pause("ModifyDBInstance").await?;
        self.inner.rename_instance(identifier, new_identifier).await
    }

    async fn describe_proxy(&self, proxy_name: &str) -> CloudResult<ProxySettings> {
        self.pause("DescribeDBProxies").await?;
        self.inner.describe_proxy(proxy_name).await
    }

    async fn describe_proxy_target_groups(&self, proxy_name: &str) -> CloudResult<Vec<String>> {
        self.pause("DescribeDBProxyTargetGroups").await?;
        self.inner.describe_proxy_target_groups(proxy_name).await
    }

    async fn describe_proxy_targets(
        &self,
        proxy_name: &str,
        target_group: &str,
    ) -> CloudResult<Vec<ProxyTarget>> {
        self.pause("DescribeDBProxyTargets").await?;
        self.inner
            .describe_proxy_targets(proxy_name, target_group)
            .await
    }

    async fn register_proxy_targets(
        &self,
        proxy_name: &str,
        target_group: &str,
        identifiers: &[String],
    ) -> CloudResult<()> {
        self.pause("RegisterDBProxyTargets").await?;
        self.inner
            .register_proxy_targets(proxy_name, target_group, identifiers)
            .await
    }

    async fn deregister_proxy_targets(
        &self,
        proxy_name: &str,
        target_group: &str,
        identifiers: &[String],
    ) -> CloudResult<()> {
        self.pause("DeregisterDBProxyTargets").await?;
        self.inner
            .deregister_proxy_targets(proxy_name, target_group, identifiers)
            .await
    }

    async fn update_proxy(&self, settings: &ProxySettings) -> CloudResult<()> {
        self.pause("ModifyDBProxy").await?;
        self.inner.update_proxy(settings).await
    }

    async fn account_id(&self) -> CloudResult<String> {
        self.pause("GetCallerIdentity").await?;
        self.inner.account_id().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeRds;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn every_call_waits_for_the_delay() {
        let fake = FakeRds::new("us-east-1");
        fake.add_primary("db-a", "db.r5.large");
        let delayed = Delayed::new(fake, Duration::from_secs(2));

        let start = Instant::now();
        delayed.describe_instance("db-a").await.unwrap();
        delayed.account_id().await.unwrap();
        assert_eq!(start.elapsed(), Duration::from_secs(4));
        assert_eq!(delayed.into_inner().calls("describe_instance"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_cuts_the_delay_short() {
        let fake = FakeRds::new("us-east-1");
        fake.add_primary("db-a", "db.r5.large");
        let token = CancellationToken::new();
        let delayed = Delayed::new(fake, Duration::from_secs(3600)).with_cancel_token(token.clone());

        let start = Instant::now();
        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            token.cancel();
        });
        let err = delayed.describe_instance("db-a").await.unwrap_err();
        canceller.await.unwrap();

        assert_eq!(err, CloudError::Cancelled("DescribeDBInstances".to_string()));
        assert_eq!(start.elapsed(), Duration::from_secs(5));
        assert_eq!(delayed.into_inner().calls("describe_instance"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_delay_is_transparent() {
        let fake = FakeRds::new("us-east-1");
        let delayed = Delayed::new(fake, Duration::ZERO);

        let start = Instant::now();
        let err = delayed.describe_instance("missing").await.unwrap_err();
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert!(matches!(err, crate::cloud::CloudError::NotFound(_)));
    }
}
