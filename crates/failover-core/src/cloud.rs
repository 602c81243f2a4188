//! The cloud capability the failover core is written against.
//!
//! `RdsApi` is the seam between the workflow and the managed-database
//! service. `failover-aws` implements it on the AWS SDK; tests use the
//! in-memory simulation in `fake.rs`. Decorators such as
//! [`Delayed`](crate::delay::Delayed) wrap any implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::types::{ProxySettings, ProxyTarget};

// ---------------------------------------------------------------------------
// CloudError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CloudError {
    /// The named DB instance does not exist (`DBInstanceNotFound`).
    #[error("DB instance not found: {0}")]
    NotFound(String),

    /// The run was cancelled before the named operation was sent.
    #[error("cancelled before {0}")]
    Cancelled(String),

    /// Any other service error, after the client's own retries.
    #[error("{operation}: {message}")]
    Service { operation: String, message: String },
}

impl CloudError {
    pub fn service(operation: impl Into<String>, message: impl Into<String>) -> Self {
        CloudError::Service {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

pub type CloudResult<T> = std::result::Result<T, CloudError>;

// ---------------------------------------------------------------------------
// Request / response shapes
// ---------------------------------------------------------------------------

/// The fields of `DescribeDBInstances` the workflow reads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DbInstance {
    pub identifier: String,
    pub status: String,
    pub replica_source: Option<String>,
    pub instance_class: Option<String>,
    pub option_groups: Vec<String>,
    pub backup_retention: Option<i32>,
}

/// Parameters for a cross-region `CreateDBInstanceReadReplica`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateReplicaRequest {
    pub identifier: String,
    /// Full ARN of the source primary.
    pub source_arn: String,
    pub source_region: String,
    pub instance_class: String,
    pub subnet_group: String,
    pub security_group_ids: Vec<String>,
    pub kms_key_id: Option<String>,
    pub option_group: Option<String>,
}

// ---------------------------------------------------------------------------
// RdsApi
// ---------------------------------------------------------------------------

/// A region-scoped managed-database client.
#[async_trait]
pub trait RdsApi: Send + Sync {
    /// Region this client talks to.
    fn region(&self) -> &str;

    async fn describe_instance(&self, identifier: &str) -> CloudResult<DbInstance>;

    async fn create_replica(&self, request: &CreateReplicaRequest) -> CloudResult<DbInstance>;

    async fn promote_replica(&self, identifier: &str) -> CloudResult<()>;

    /// Deletes with `SkipFinalSnapshot=false`.
    async fn delete_instance(&self, identifier: &str, final_snapshot: &str) -> CloudResult<()>;

    /// Renames with `ApplyImmediately=true`.
    async fn rename_instance(&self, identifier: &str, new_identifier: &str) -> CloudResult<()>;

    async fn describe_proxy(&self, proxy_name: &str) -> CloudResult<ProxySettings>;

    /// Returns target group names for the proxy.
    async fn describe_proxy_target_groups(&self, proxy_name: &str) -> CloudResult<Vec<String>>;

    async fn describe_proxy_targets(
        &self,
        proxy_name: &str,
        target_group: &str,
    ) -> CloudResult<Vec<ProxyTarget>>;

    async fn register_proxy_targets(
        &self,
        proxy_name: &str,
        target_group: &str,
        identifiers: &[String],
    ) -> CloudResult<()>;

    async fn deregister_proxy_targets(
        &self,
        proxy_name: &str,
        target_group: &str,
        identifiers: &[String],
    ) -> CloudResult<()>;

    async fn update_proxy(&self, settings: &ProxySettings) -> CloudResult<()>;

    /// Account id of the caller, used to build source ARNs.
    async fn account_id(&self) -> CloudResult<String>;
}

#[async_trait]
impl<T: RdsApi + ?Sized> RdsApi for Arc<T> {
    fn region(&self) -> &str {
        (**self).region()
    }

    async fn describe_instance(&self, identifier: &str) -> CloudResult<DbInstance> {
        (**self).describe_instance(identifier).await
    }

    async fn create_replica(&self, request: &CreateReplicaRequest) -> CloudResult<DbInstance> {
        (**self).create_replica(request).await
    }

    async fn promote_replica(&self, identifier: &str) -> CloudResult<()> {
        (**self).promote_replica(identifier).await
    }

    async fn delete_instance(&self, identifier: &str, final_snapshot: &str) -> CloudResult<()> {
        (**self).delete_instance(identifier, final_snapshot).await
    }

    async fn rename_instance(&self, identifier: &str, new_identifier: &str) -> CloudResult<()> {
        (**self).rename_instance(identifier, new_identifier).await
    }

    async fn describe_proxy(&self, proxy_name: &str) -> CloudResult<ProxySettings> {
        (**self).describe_proxy(proxy_name).await
    }

    async fn describe_proxy_target_groups(&self, proxy_name: &str) -> CloudResult<Vec<String>> {
        (**self).describe_proxy_target_groups(proxy_name).await
    }

    async fn describe_proxy_targets(
        &self,
        proxy_name: &str,
        target_group: &str,
    ) -> CloudResult<Vec<ProxyTarget>> {
        (**self).describe_proxy_targets(proxy_name, target_group).await
    }

    async fn register_proxy_targets(
        &self,
        proxy_name: &str,
        target_group: &str,
        identifiers: &[String],
    ) -> CloudResult<()> {
        (**self)
            .register_proxy_targets(proxy_name, target_group, identifiers)
            .await
    }

    async fn deregister_proxy_targets(
        &self,
        proxy_name: &str,
        target_group: &str,
        identifiers: &[String],
    ) -> CloudResult<()> {
        (**self)
            .deregister_proxy_targets(proxy_name, target_group, identifiers)
            .await
    }

    async fn update_proxy(&self, settings: &ProxySettings) -> CloudResult<()> {
        (**self).update_proxy(settings).await
    }

    async fn account_id(&self) -> CloudResult<String> {
        (**self).account_id().await
    }
}

/// Builds the ARN used as `SourceDBInstanceIdentifier` for cross-region replicas.
pub fn instance_arn(region: &str, account_id: &str, identifier: &str) -> String {
    format!("arn:aws:rds:{region}:{account_id}:db:{identifier}")
}
