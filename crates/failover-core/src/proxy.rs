use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cloud::RdsApi;
use crate::error::{FailoverError, Result};
use crate::poller;
use crate::types::{ProxySettings, TargetKind};

/// Repoints an RDS Proxy's target group at a new primary.
#[derive(Debug, Clone)]
pub struct ProxyRetargeter<'a> {
    cancel: &'a CancellationToken,
    deregistration_grace: Duration,
}

impl<'a> ProxyRetargeter<'a> {
    pub fn new(cancel: &'a CancellationToken, deregistration_grace: Duration) -> Self {
        Self {
            cancel,
            deregistration_grace,
        }
    }

    /// Replace every RDS instance target of `proxy_name`'s first target group
    /// with `new_primary`.
    ///
    /// Deregistration exposes no completion signal, so a fixed grace period
    /// follows it before registering.
    pub async fn retarget(&self, api: &dyn RdsApi, proxy_name: &str, new_primary: &str) -> Result<()> {
        let groups = api.describe_proxy_target_groups(proxy_name).await?;
        let group = groups
            .into_iter()
            .next()
            .ok_or_else(|| FailoverError::NoTargetGroup {
                proxy: proxy_name.to_string(),
            })?;

        let stale: Vec<String> = api
            .describe_proxy_targets(proxy_name, &group)
            .await?
            .into_iter()
            .filter(|t| t.kind == TargetKind::RdsInstance)
            .filter_map(|t| t.rds_resource_id)
            .collect();

        if !stale.is_empty() {
            info!(
                proxy = proxy_name,
                target_group = %group,
                targets = %stale.join(", "),
                "deregistering existing targets"
            );
            api.deregister_proxy_targets(proxy_name, &group, &stale)
                .await?;
            poller::sleep(
                self.cancel,
                self.deregistration_grace,
                &format!("deregistration from {proxy_name}"),
            )
            .await?;
        }

        info!(proxy = proxy_name, target = new_primary, "registering new target");
        api.register_proxy_targets(proxy_name, &group, &[new_primary.to_string()])
            .await?;
        info!(proxy = proxy_name, region = api.region(), "proxy targets updated");
        Ok(())
    }
}

/// Describe `proxy_name` and re-apply its auth, idle timeout, debug logging,
/// TLS and role settings unchanged.
pub async fn copy_proxy_settings(api: &dyn RdsApi, proxy_name: &str) -> Result<ProxySettings> {
    let settings = api.describe_proxy(proxy_name).await?;
    if settings.auth.is_empty() {
        warn!(proxy = proxy_name, "proxy reports no auth configuration");
    }
    apply_proxy_settings(api, &settings).await?;
    Ok(settings)
}

/// Re-apply previously described settings to the same proxy.
pub async fn apply_proxy_settings(api: &dyn RdsApi, settings: &ProxySettings) -> Result<()> {
    if settings.role_arn.is_none() {
        return Err(FailoverError::MissingField {
            resource: format!("proxy {}", settings.proxy_name),
            field: "RoleArn".to_string(),
        });
    }
    info!(proxy = %settings.proxy_name, region = api.region(), "updating proxy settings");
    api.update_proxy(settings).await?;
    Ok(())
}
