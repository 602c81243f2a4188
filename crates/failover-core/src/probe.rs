use tracing::debug;

use crate::cloud::{CloudError, DbInstance, RdsApi};
use crate::error::{FailoverError, Result};
use crate::types::{InstanceStatus, Observation};

/// Describe `identifier` and classify it.
///
/// A missing instance is not an error: it comes back as an observation with
/// `exists == false`. Every other service error propagates.
pub async fn observe(api: &dyn RdsApi, identifier: &str) -> Result<Observation> {
    match api.describe_instance(identifier).await {
        Ok(desc) => {
            let obs = from_description(identifier, desc);
            debug!(
                region = api.region(),
                identifier,
                status = %obs.status,
                role = ?obs.role(),
                "observed DB instance"
            );
            Ok(obs)
        }
        Err(CloudError::NotFound(_)) => {
            debug!(region = api.region(), identifier, "DB instance not found");
            Ok(Observation::absent(identifier))
        }
        Err(err) => Err(err.into()),
    }
}

/// Like [`observe`], but absence is an error.
pub async fn require(api: &dyn RdsApi, identifier: &str) -> Result<Observation> {
    let obs = observe(api, identifier).await?;
    if !obs.exists {
        return Err(FailoverError::NotFound(format!(
            "{identifier} in {}",
            api.region()
        )));
    }
    Ok(obs)
}

fn from_description(identifier: &str, desc: DbInstance) -> Observation {
    let identifier = if desc.identifier.is_empty() {
        identifier.to_string()
    } else {
        desc.identifier
    };
    Observation {
        identifier,
        exists: true,
        status: InstanceStatus::parse(&desc.status),
        replica_source: desc.replica_source.filter(|s| !s.is_empty()),
        instance_class: desc.instance_class,
        option_group: desc.option_groups.into_iter().next(),
        backup_retention: desc.backup_retention,
    }
}
