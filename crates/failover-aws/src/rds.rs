//! [`RdsApi`] over `aws-sdk-rds`, with STS for the caller's account id.

use std::error::Error;
use std::fmt::Debug;
use std::sync::OnceLock;

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_rds::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_rds::types::{
    self as rds_types, AuthScheme, ClientPasswordAuthType, IamAuthMode, UserAuthConfig,
    UserAuthConfigInfo,
};
use tracing::debug;

use failover_core::cloud::{CloudError, CloudResult, CreateReplicaRequest, DbInstance, RdsApi};
use failover_core::types::{ProxyAuth, ProxySettings, ProxyTarget, TargetKind};

const INSTANCE_NOT_FOUND: &str = "DBInstanceNotFound";

pub struct AwsRds {
    rds: aws_sdk_rds::Client,
    sts: aws_sdk_sts::Client,
    region: String,
    account_id: OnceLock<String>,
}

impl AwsRds {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            rds: aws_sdk_rds::Client::new(config),
            sts: aws_sdk_sts::Client::new(config),
            region: config.region().map(|r| r.to_string()).unwrap_or_default(),
            account_id: OnceLock::new(),
        }
    }

    /// Loads the default AWS configuration for `region` and builds a client.
    pub async fn connect(region: &str) -> Self {
        Self::new(&crate::config::load(region).await)
    }
}

impl Debug for AwsRds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsRds")
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

fn service_error<E, R>(operation: &str, err: SdkError<E, R>) -> CloudError
where
    E: Error + 'static,
    R: Debug,
{
    CloudError::service(operation, DisplayErrorContext(&err).to_string())
}

/// Like [`service_error`], but `DBInstanceNotFound` becomes [`CloudError::NotFound`].
fn instance_error<E, R>(operation: &str, identifier: &str, err: SdkError<E, R>) -> CloudError
where
    E: ProvideErrorMetadata + Error + 'static,
    R: Debug,
{
    if err.code() == Some(INSTANCE_NOT_FOUND) {
        return CloudError::NotFound(identifier.to_string());
    }
    service_error(operation, err)
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

fn to_instance(db: &rds_types::DbInstance) -> DbInstance {
    DbInstance {
        identifier: db.db_instance_identifier().unwrap_or_default().to_string(),
        status: db.db_instance_status().unwrap_or_default().to_string(),
        replica_source: db
            .read_replica_source_db_instance_identifier()
            .map(str::to_string),
        instance_class: db.db_instance_class().map(str::to_string),
        option_groups: db
            .option_group_memberships()
            .iter()
            .filter_map(|m| m.option_group_name())
            .map(str::to_string)
            .collect(),
        backup_retention: db.backup_retention_period(),
    }
}

fn to_auth(info: &UserAuthConfigInfo) -> ProxyAuth {
    ProxyAuth {
        description: info.description().map(str::to_string),
        user_name: info.user_name().map(str::to_string),
        auth_scheme: info.auth_scheme().map(|s| s.as_str().to_string()),
        secret_arn: info.secret_arn().map(str::to_string),
        iam_auth: info.iam_auth().map(|m| m.as_str().to_string()),
        client_password_auth_type: info
            .client_password_auth_type()
            .map(|t| t.as_str().to_string()),
    }
}

fn from_auth(auth: &ProxyAuth) -> UserAuthConfig {
    UserAuthConfig::builder()
        .set_description(auth.description.clone())
        .set_user_name(auth.user_name.clone())
        .set_auth_scheme(auth.auth_scheme.as_deref().map(AuthScheme::from))
        .set_secret_arn(auth.secret_arn.clone())
        .set_iam_auth(auth.iam_auth.as_deref().map(IamAuthMode::from))
        .set_client_password_auth_type(
            auth.client_password_auth_type
                .as_deref()
                .map(ClientPasswordAuthType::from),
        )
        .build()
}

fn to_settings(proxy_name: &str, proxy: &rds_types::DbProxy) -> ProxySettings {
    ProxySettings {
        proxy_name: proxy.db_proxy_name().unwrap_or(proxy_name).to_string(),
        auth: proxy.auth().iter().map(to_auth).collect(),
        idle_client_timeout: proxy.idle_client_timeout(),
        debug_logging: proxy.debug_logging().unwrap_or(false),
        require_tls: proxy.require_tls().unwrap_or(false),
        role_arn: proxy.role_arn().map(str::to_string),
    }
}

fn to_target(target: &rds_types::DbProxyTarget) -> ProxyTarget {
    ProxyTarget {
        kind: target
            .r#type()
            .map(|t| TargetKind::parse(t.as_str()))
            .unwrap_or_else(|| TargetKind::Other(String::new())),
        rds_resource_id: target.rds_resource_id().map(str::to_string),
    }
}

// ---------------------------------------------------------------------------
// RdsApi
// ---------------------------------------------------------------------------

#[async_trait]
impl RdsApi for AwsRds {
    fn region(&self) -> &str {
        &self.region
    }

    async fn describe_instance(&self, identifier: &str) -> CloudResult<DbInstance> {
        let out = self
            .rds
            .describe_db_instances()
            .db_instance_identifier(identifier)
            .send()
            .await
            .map_err(|e| instance_error("DescribeDBInstances", identifier, e))?;
        out.db_instances()
            .first()
            .map(to_instance)
            .ok_or_else(|| CloudError::NotFound(identifier.to_string()))
    }

    async fn create_replica(&self, request: &CreateReplicaRequest) -> CloudResult<DbInstance> {
        let security_groups =
            (!request.security_group_ids.is_empty()).then(|| request.security_group_ids.clone());
        let out = self
            .rds
            .create_db_instance_read_replica()
            .db_instance_identifier(&request.identifier)
            .source_db_instance_identifier(&request.source_arn)
            .source_region(&request.source_region)
            .db_instance_class(&request.instance_class)
            .db_subnet_group_name(&request.subnet_group)
            .set_vpc_security_group_ids(security_groups)
            .set_kms_key_id(request.kms_key_id.clone())
            .set_option_group_name(request.option_group.clone())
            .send()
            .await
            .map_err(|e| service_error("CreateDBInstanceReadReplica", e))?;
        debug!(identifier = %request.identifier, "CreateDBInstanceReadReplica accepted");
        Ok(out.db_instance().map(to_instance).unwrap_or_else(|| DbInstance {
            identifier: request.identifier.clone(),
            status: "creating".to_string(),
            ..Default::default()
        }))
    }

    async fn promote_replica(&self, identifier: &str) -> CloudResult<()> {
        self.rds
            .promote_read_replica()
            .db_instance_identifier(identifier)
            .send()
            .await
            .map_err(|e| instance_error("PromoteReadReplica", identifier, e))?;
        Ok(())
    }

    async fn delete_instance(&self, identifier: &str, final_snapshot: &str) -> CloudResult<()> {
        self.rds
            .delete_db_instance()
            .db_instance_identifier(identifier)
            .skip_final_snapshot(false)
            .final_db_snapshot_identifier(final_snapshot)
            .send()
            .await
            .map_err(|e| instance_error("DeleteDBInstance", identifier, e))?;
        Ok(())
    }

    async fn rename_instance(&self, identifier: &str, new_identifier: &str) -> CloudResult<()> {
        self.rds
            .modify_db_instance()
            .db_instance_identifier(identifier)
            .new_db_instance_identifier(new_identifier)
            .apply_immediately(true)
            .send()
            .await
            .map_err(|e| instance_error("ModifyDBInstance", identifier, e))?;
        Ok(())
    }

    async fn describe_proxy(&self, proxy_name: &str) -> CloudResult<ProxySettings> {
        let out = self
            .rds
            .describe_db_proxies()
            .db_proxy_name(proxy_name)
            .send()
            .await
            .map_err(|e| service_error("DescribeDBProxies", e))?;
        out.db_proxies()
            .first()
            .map(|p| to_settings(proxy_name, p))
            .ok_or_else(|| {
                CloudError::service("DescribeDBProxies", format!("proxy {proxy_name} not returned"))
            })
    }

    async fn describe_proxy_target_groups(&self, proxy_name: &str) -> CloudResult<Vec<String>> {
        let out = self
            .rds
            .describe_db_proxy_target_groups()
            .db_proxy_name(proxy_name)
            .send()
            .await
            .map_err(|e| service_error("DescribeDBProxyTargetGroups", e))?;
        Ok(out
            .target_groups()
            .iter()
            .filter_map(|g| g.target_group_name())
            .map(str::to_string)
            .collect())
    }

    async fn describe_proxy_targets(
        &self,
        proxy_name: &str,
        target_group: &str,
    ) -> CloudResult<Vec<ProxyTarget>> {
        let out = self
            .rds
            .describe_db_proxy_targets()
            .db_proxy_name(proxy_name)
            .target_group_name(target_group)
            .send()
            .await
            .map_err(|e| service_error("DescribeDBProxyTargets", e))?;
        Ok(out.targets().iter().map(to_target).collect())
    }

    async fn register_proxy_targets(
        &self,
        proxy_name: &str,
        target_group: &str,
        identifiers: &[String],
    ) -> CloudResult<()> {
        self.rds
            .register_db_proxy_targets()
            .db_proxy_name(proxy_name)
            .target_group_name(target_group)
            .set_db_instance_identifiers(Some(identifiers.to_vec()))
            .send()
            .await
            .map_err(|e| service_error("RegisterDBProxyTargets", e))?;
        Ok(())
    }

    async fn deregister_proxy_targets(
        &self,
        proxy_name: &str,
        target_group: &str,
        identifiers: &[String],
    ) -> CloudResult<()> {
        self.rds
            .deregister_db_proxy_targets()
            .db_proxy_name(proxy_name)
            .target_group_name(target_group)
            .set_db_instance_identifiers(Some(identifiers.to_vec()))
            .send()
            .await
            .map_err(|e| service_error("DeregisterDBProxyTargets", e))?;
        Ok(())
    }

    async fn update_proxy(&self, settings: &ProxySettings) -> CloudResult<()> {
        self.rds
            .modify_db_proxy()
            .db_proxy_name(&settings.proxy_name)
            .set_auth(Some(settings.auth.iter().map(from_auth).collect()))
            .set_idle_client_timeout(settings.idle_client_timeout)
            .debug_logging(settings.debug_logging)
            .require_tls(settings.require_tls)
            .set_role_arn(settings.role_arn.clone())
            .send()
            .await
            .map_err(|e| service_error("ModifyDBProxy", e))?;
        Ok(())
    }

    async fn account_id(&self) -> CloudResult<String> {
        if let Some(id) = self.account_id.get() {
            return Ok(id.clone());
        }
        let out = self
            .sts
            .get_caller_identity()
            .send()
            .await
            .map_err(|e| service_error("GetCallerIdentity", e))?;
        let id = out
            .account()
            .ok_or_else(|| CloudError::service("GetCallerIdentity", "response has no account id"))?
            .to_string();
        Ok(self.account_id.get_or_init(|| id).clone())
    }
}
