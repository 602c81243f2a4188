//! In-memory RDS simulation for tests.
//!
//! Asynchronous operations (create, delete, promote, rename) schedule a
//! transition that lands after `ticks` describe calls against the affected
//! instance, so pollers observe the intermediate states a real control plane
//! reports.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use crate::cloud::{CloudError, CloudResult, CreateReplicaRequest, DbInstance, RdsApi};
use crate::types::{ProxySettings, ProxyTarget, TargetKind};

pub const ACCOUNT_ID: &str = "123456789012";
const TARGET_GROUP: &str = "default";

#[derive(Debug, Clone)]
enum Transition {
    BecomeAvailable,
    Delete,
    /// Promotion lands in two steps: available while still linked, then unlinked.
    PromoteAvailable,
    PromoteUnlink,
    Rename(String),
}

#[derive(Debug, Clone)]
struct Instance {
    desc: DbInstance,
    pending: Option<(u32, Transition)>,
}

#[derive(Debug, Clone)]
struct Proxy {
    settings: ProxySettings,
    groups: Vec<String>,
    targets: Vec<ProxyTarget>,
}

/// One recorded API call.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub op: &'static str,
    pub target: String,
}

#[derive(Debug, Default)]
struct State {
    instances: BTreeMap<String, Instance>,
    proxies: HashMap<String, Proxy>,
    calls: Vec<Call>,
    failures: HashMap<&'static str, String>,
    created: Vec<CreateReplicaRequest>,
    snapshots: Vec<String>,
    proxy_updates: Vec<ProxySettings>,
}

#[derive(Debug)]
pub struct FakeRds {
    region: String,
    ticks: u32,
    state: Mutex<State>,
}

impl FakeRds {
    pub fn new(region: &str) -> Self {
        Self {
            region: region.to_string(),
            ticks: 2,
            state: Mutex::new(State::default()),
        }
    }

    /// Number of describe calls before a scheduled transition lands.
    pub fn with_ticks(mut self, ticks: u32) -> Self {
        self.ticks = ticks.max(1);
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn add_primary(&self, identifier: &str, class: &str) {
        self.insert(identifier, class, None);
    }

    pub fn add_replica(&self, identifier: &str, class: &str, source: &str) {
        self.insert(identifier, class, Some(source.to_string()));
    }

    fn insert(&self, identifier: &str, class: &str, source: Option<String>) {
        let desc = DbInstance {
            identifier: identifier.to_string(),
            status: "available".to_string(),
            backup_retention: Some(if source.is_some() { 0 } else { 7 }),
            replica_source: source,
            instance_class: Some(class.to_string()),
            option_groups: vec!["default:postgres-15".to_string()],
        };
        self.lock().instances.insert(
            identifier.to_string(),
            Instance {
                desc,
                pending: None,
            },
        );
    }

    pub fn add_proxy(&self, name: &str, targets: &[&str]) {
        let settings = ProxySettings {
            proxy_name: name.to_string(),
            auth: vec![crate::types::ProxyAuth {
                auth_scheme: Some("SECRETS".to_string()),
                secret_arn: Some(format!("arn:aws:secretsmanager:{}:{ACCOUNT_ID}:secret:db", self.region)),
                iam_auth: Some("DISABLED".to_string()),
                ..Default::default()
            }],
            idle_client_timeout: Some(1800),
            debug_logging: false,
            require_tls: true,
            role_arn: Some(format!("arn:aws:iam::{ACCOUNT_ID}:role/proxy")),
        };
        let targets = targets
            .iter()
            .map(|id| ProxyTarget {
                kind: TargetKind::RdsInstance,
                rds_resource_id: Some(id.to_string()),
            })
            .collect();
        self.lock().proxies.insert(
            name.to_string(),
            Proxy {
                settings,
                groups: vec![TARGET_GROUP.to_string()],
                targets,
            },
        );
    }

    /// Adds a proxy that reports no target groups.
    pub fn add_proxy_without_groups(&self, name: &str) {
        self.add_proxy(name, &[]);
        if let Some(proxy) = self.lock().proxies.get_mut(name) {
            proxy.groups.clear();
        }
    }

    pub fn add_proxy_target(&self, name: &str, target: ProxyTarget) {
        if let Some(proxy) = self.lock().proxies.get_mut(name) {
            proxy.targets.push(target);
        }
    }

    /// Makes every subsequent call of `op` fail with a service error.
    pub fn fail_on(&self, op: &'static str, message: &str) {
        self.lock().failures.insert(op, message.to_string());
    }

    pub fn calls(&self, op: &str) -> usize {
        self.lock().calls.iter().filter(|c| c.op == op).count()
    }

    pub fn call_log(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn instance(&self, identifier: &str) -> Option<DbInstance> {
        self.lock()
            .instances
            .get(identifier)
            .map(|inst| inst.desc.clone())
    }

    pub fn created(&self) -> Vec<CreateReplicaRequest> {
        self.lock().created.clone()
    }

    pub fn snapshots(&self) -> Vec<String> {
        self.lock().snapshots.clone()
    }

    pub fn proxy_updates(&self) -> Vec<ProxySettings> {
        self.lock().proxy_updates.clone()
    }

    pub fn proxy_targets(&self, name: &str) -> Vec<String> {
        self.lock()
            .proxies
            .get(name)
            .map(|p| {
                p.targets
                    .iter()
                    .filter_map(|t| t.rds_resource_id.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn record(&self, op: &'static str, target: &str) -> CloudResult<()> {
        let mut state = self.lock();
        state.calls.push(Call {
            op,
            target: target.to_string(),
        });
        match state.failures.get(op) {
            Some(message) => Err(CloudError::service(op, message.clone())),
            None => Ok(()),
        }
    }

    fn schedule(&self, identifier: &str, transition: Transition) -> CloudResult<()> {
        let ticks = self.ticks;
        let mut state = self.lock();
        let inst = state
            .instances
            .get_mut(identifier)
            .ok_or_else(|| CloudError::NotFound(identifier.to_string()))?;
        inst.pending = Some((ticks, transition));
        Ok(())
    }

    /// Advances the instance by one describe tick and returns its description.
    fn tick(&self, identifier: &str) -> CloudResult<DbInstance> {
        let ticks = self.ticks;
        let mut state = self.lock();
        let inst = state
            .instances
            .get_mut(identifier)
            .ok_or_else(|| CloudError::NotFound(identifier.to_string()))?;

        let landed = match inst.pending.as_mut() {
            Some((remaining, _)) if *remaining > 1 => {
                *remaining -= 1;
                None
            }
            Some(_) => inst.pending.take().map(|(_, t)| t),
            None => None,
        };

        match landed {
            None => Ok(inst.desc.clone()),
            Some(Transition::BecomeAvailable) => {
                inst.desc.status = "available".to_string();
                Ok(inst.desc.clone())
            }
            Some(Transition::Delete) => {
                state.instances.remove(identifier);
                Err(CloudError::NotFound(identifier.to_string()))
            }
            Some(Transition::PromoteAvailable) => {
                inst.desc.status = "available".to_string();
                inst.pending = Some((ticks, Transition::PromoteUnlink));
                Ok(inst.desc.clone())
            }
            Some(Transition::PromoteUnlink) => {
                inst.desc.replica_source = None;
                inst.desc.backup_retention = Some(1);
                Ok(inst.desc.clone())
            }
            Some(Transition::Rename(new_identifier)) => {
                let mut moved = inst.clone();
                state.instances.remove(identifier);
                moved.desc.identifier = new_identifier.clone();
                moved.desc.status = "renaming".to_string();
                moved.pending = Some((ticks, Transition::BecomeAvailable));
                state.instances.insert(new_identifier, moved);
                Err(CloudError::NotFound(identifier.to_string()))
            }
        }
    }
}

#[async_trait]
impl RdsApi for FakeRds {
    fn region(&self) -> &str {
        &self.region
    }

    async fn describe_instance(&self, identifier: &str) -> CloudResult<DbInstance> {
        self.record("describe_instance", identifier)?;
        self.tick(identifier)
    }

    async fn create_replica(&self, request: &CreateReplicaRequest) -> CloudResult<DbInstance> {
        self.record("create_replica", &request.identifier)?;
        if request.subnet_group.is_empty() {
            return Err(CloudError::service(
                "create_replica",
                "DBSubnetGroupNotFoundFault: subnet group must be provided",
            ));
        }
        let desc = DbInstance {
            identifier: request.identifier.clone(),
            status: "creating".to_string(),
            replica_source: Some(request.source_arn.clone()),
            instance_class: Some(request.instance_class.clone()),
            option_groups: request.option_group.iter().cloned().collect(),
            backup_retention: None,
        };
        {
            let mut state = self.lock();
            if state.instances.contains_key(&request.identifier) {
                return Err(CloudError::service(
                    "create_replica",
                    format!("DBInstanceAlreadyExists: {}", request.identifier),
                ));
            }
            state.created.push(request.clone());
            state.instances.insert(
                request.identifier.clone(),
                Instance {
                    desc: desc.clone(),
                    pending: None,
                },
            );
        }
        self.schedule(&request.identifier, Transition::BecomeAvailable)?;
        Ok(desc)
    }

    async fn promote_replica(&self, identifier: &str) -> CloudResult<()> {
        self.record("promote_replica", identifier)?;
        {
            let mut state = self.lock();
            let inst = state
                .instances
                .get_mut(identifier)
                .ok_or_else(|| CloudError::NotFound(identifier.to_string()))?;
            if inst.desc.replica_source.is_none() {
                return Err(CloudError::service(
                    "promote_replica",
                    format!("InvalidDBInstanceState: {identifier} is not a read replica"),
                ));
            }
            inst.desc.status = "modifying".to_string();
        }
        self.schedule(identifier, Transition::PromoteAvailable)
    }

    async fn delete_instance(&self, identifier: &str, final_snapshot: &str) -> CloudResult<()> {
        self.record("delete_instance", identifier)?;
        {
            let mut state = self.lock();
            let inst = state
                .instances
                .get_mut(identifier)
                .ok_or_else(|| CloudError::NotFound(identifier.to_string()))?;
            inst.desc.status = "deleting".to_string();
            state.snapshots.push(final_snapshot.to_string());
        }
        self.schedule(identifier, Transition::Delete)
    }

    async fn rename_instance(&self, identifier: &str, new_identifier: &str) -> CloudResult<()> {
        self.record("rename_instance", identifier)?;
        {
            let mut state = self.lock();
            if state.instances.contains_key(new_identifier) {
                return Err(CloudError::service(
                    "rename_instance",
                    format!("DBInstanceAlreadyExists: {new_identifier}"),
                ));
            }
            let inst = state
                .instances
                .get_mut(identifier)
                .ok_or_else(|| CloudError::NotFound(identifier.to_string()))?;
            inst.desc.status = "modifying".to_string();
        }
        self.schedule(identifier, Transition::Rename(new_identifier.to_string()))
    }

    async fn describe_proxy(&self, proxy_name: &str) -> CloudResult<ProxySettings> {
        self.record("describe_proxy", proxy_name)?;
        self.lock()
            .proxies
            .get(proxy_name)
            .map(|p| p.settings.clone())
            .ok_or_else(|| CloudError::service("describe_proxy", format!("DBProxyNotFoundFault: {proxy_name}")))
    }

    async fn describe_proxy_target_groups(&self, proxy_name: &str) -> CloudResult<Vec<String>> {
        self.record("describe_proxy_target_groups", proxy_name)?;
        self.lock()
            .proxies
            .get(proxy_name)
            .map(|p| p.groups.clone())
            .ok_or_else(|| {
                CloudError::service(
                    "describe_proxy_target_groups",
                    format!("DBProxyNotFoundFault: {proxy_name}"),
                )
            })
    }

    async fn describe_proxy_targets(
        &self,
        proxy_name: &str,
        _target_group: &str,
    ) -> CloudResult<Vec<ProxyTarget>> {
        self.record("describe_proxy_targets", proxy_name)?;
        Ok(self
            .lock()
            .proxies
            .get(proxy_name)
            .map(|p| p.targets.clone())
            .unwrap_or_default())
    }

    async fn register_proxy_targets(
        &self,
        proxy_name: &str,
        _target_group: &str,
        identifiers: &[String],
    ) -> CloudResult<()> {
        self.record("register_proxy_targets", proxy_name)?;
        let mut state = self.lock();
        let proxy = state.proxies.get_mut(proxy_name).ok_or_else(|| {
            CloudError::service("register_proxy_targets", format!("DBProxyNotFoundFault: {proxy_name}"))
        })?;
        for id in identifiers {
            if proxy
                .targets
                .iter()
                .any(|t| t.rds_resource_id.as_deref() == Some(id.as_str()))
            {
                return Err(CloudError::service(
                    "register_proxy_targets",
                    format!("DBProxyTargetAlreadyRegisteredFault: {id}"),
                ));
            }
            proxy.targets.push(ProxyTarget {
                kind: TargetKind::RdsInstance,
                rds_resource_id: Some(id.clone()),
            });
        }
        Ok(())
    }

    async fn deregister_proxy_targets(
        &self,
        proxy_name: &str,
        _target_group: &str,
        identifiers: &[String],
    ) -> CloudResult<()> {
        self.record("deregister_proxy_targets", proxy_name)?;
        let mut state = self.lock();
        if let Some(proxy) = state.proxies.get_mut(proxy_name) {
            proxy.targets.retain(|t| {
                t.kind != TargetKind::RdsInstance
                    || !t
                        .rds_resource_id
                        .as_ref()
                        .is_some_and(|id| identifiers.contains(id))
            });
        }
        Ok(())
    }

    async fn update_proxy(&self, settings: &ProxySettings) -> CloudResult<()> {
        self.record("update_proxy", &settings.proxy_name)?;
        let mut state = self.lock();
        state.proxy_updates.push(settings.clone());
        if let Some(proxy) = state.proxies.get_mut(&settings.proxy_name) {
            proxy.settings = settings.clone();
        }
        Ok(())
    }

    async fn account_id(&self) -> CloudResult<String> {
        self.record("account_id", "")?;
        Ok(ACCOUNT_ID.to_string())
    }
}
