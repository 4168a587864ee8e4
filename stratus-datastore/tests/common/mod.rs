//! Shared test utilities for stratus-datastore integration tests.
#![allow(dead_code)] // not every test binary uses every helper

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::{Method, StatusCode};
use stratus_client::{ApiError, ApiResult};
use stratus_datastore::api::{ContentCatalog, ProvisioningApi};
use stratus_datastore::types::{
    CreateDatastoreRequest, DatastorePatch, DbVendor, HostSpec, InstanceSize, ResizeRequest,
    VolumeType,
};
use stratus_datastore::{Datastore, FirewallRule, Host, Job, JobStatus, JobType, MaintenanceSettings, Notifications};

pub fn base_time() -> DateTime<Utc> {
    "2024-01-01T00:00:00Z".parse().unwrap()
}

/// A public single-vendor datastore with no zones pinned.
pub fn sample_datastore(name: &str, size: u32) -> Datastore {
    Datastore {
        id: String::new(),
        name: name.to_string(),
        size,
        cloud_provider: "aws".to_string(),
        cloud_region: "eu-north-1".to_string(),
        availability_zones: Vec::new(),
        vpc_uuid: String::new(),
        db_vendor: "postgres".to_string(),
        db_version: "16".to_string(),
        kind: "replication".to_string(),
        instance_size: "m.large".to_string(),
        volume_type: "gp2".to_string(),
        volume_size: 100,
        volume_iops: None,
        notifications: Notifications::default(),
        maintenance_settings: None,
        parameter_group_id: None,
        hosts: Vec::new(),
        firewall_rules: Vec::new(),
    }
}

pub fn make_host(id: &str, zone: &str, age_hours: i64, role: &str) -> Host {
    Host {
        id: id.to_string(),
        created_at: base_time() + Duration::hours(age_hours),
        availability_zone: zone.to_string(),
        instance_type: "m.large".to_string(),
        role: role.to_string(),
        port: Some(5432),
    }
}

pub fn rule(source: &str, description: &str) -> FirewallRule {
    FirewallRule {
        source: source.to_string(),
        description: description.to_string(),
    }
}

// ===== Fake control plane =====

#[derive(Default)]
struct State {
    datastores: HashMap<String, Datastore>,
    hosts: HashMap<String, Vec<Host>>,
    rules: HashMap<String, Vec<FirewallRule>>,
    jobs: HashMap<String, Vec<Job>>,
    calls: HashMap<&'static str, usize>,
    zones: Vec<String>,
    deploy_status: Option<JobStatus>,
    fail_rule_sources: HashSet<String>,
    fail_parameter_group: bool,
    drop_job_feed_on_delete: bool,
    seq: usize,
}

/// In-memory control plane double.
///
/// Mutations apply instantly and the background jobs they spawn are born
/// finished, so lifecycle flows run without real waiting. Failure knobs
/// let individual tests break specific calls, and per-method call counts
/// back the zero-remote-call assertions.
#[derive(Default)]
pub struct FakeControlPlane {
    state: Mutex<State>,
}

impl FakeControlPlane {
    pub fn new(zones: &[&str]) -> Self {
        let fake = Self::default();
        fake.state.lock().unwrap().zones = zones.iter().map(|z| z.to_string()).collect();
        fake
    }

    /// Insert a datastore as pre-existing remote state. Hosts and rules
    /// move into their own stores, mirroring the remote's shape.
    pub fn seed(&self, datastore: &Datastore) {
        let mut state = self.state.lock().unwrap();
        let id = datastore.id.clone();
        assert!(!id.is_empty(), "seeded datastore needs an id");

        let mut stored = datastore.clone();
        state.hosts.insert(id.clone(), std::mem::take(&mut stored.hosts));
        state.rules.insert(id.clone(), std::mem::take(&mut stored.firewall_rules));
        state.jobs.entry(id.clone()).or_default();
        state.datastores.insert(id, stored);
    }

    // ----- failure knobs -----

    /// Fail creates and deletes of the rule with this source.
    pub fn fail_rule(&self, source: &str) {
        self.state.lock().unwrap().fail_rule_sources.insert(source.to_string());
    }

    pub fn fail_parameter_group(&self) {
        self.state.lock().unwrap().fail_parameter_group = true;
    }

    /// Make deletes take the whole job feed with them, so status polls
    /// 404 afterwards.
    pub fn drop_job_feed_on_delete(&self) {
        self.state.lock().unwrap().drop_job_feed_on_delete = true;
    }

    /// Status newly spawned deploy jobs report. Defaults to finished.
    pub fn set_deploy_status(&self, status: JobStatus) {
        self.state.lock().unwrap().deploy_status = Some(status);
    }

    // ----- inspection -----

    pub fn calls(&self, method: &str) -> usize {
        self.state.lock().unwrap().calls.get(method).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.state.lock().unwrap().calls.values().sum()
    }

    pub fn exists(&self, id: &str) -> bool {
        self.state.lock().unwrap().datastores.contains_key(id)
    }

    pub fn stored(&self, id: &str) -> Option<Datastore> {
        self.state.lock().unwrap().datastores.get(id).cloned()
    }

    pub fn stored_hosts(&self, id: &str) -> Vec<Host> {
        self.state.lock().unwrap().hosts.get(id).cloned().unwrap_or_default()
    }

    pub fn stored_rules(&self, id: &str) -> Vec<FirewallRule> {
        self.state.lock().unwrap().rules.get(id).cloned().unwrap_or_default()
    }
}

fn bump(state: &mut State, method: &'static str) {
    *state.calls.entry(method).or_insert(0) += 1;
}

fn push_job(state: &mut State, id: &str, job_type: JobType, status: JobStatus) {
    state.seq += 1;
    let job = Job {
        id: format!("job-{}", state.seq),
        job_type,
        status,
    };
    // Newest first, like the remote feed.
    state.jobs.entry(id.to_string()).or_default().insert(0, job);
}

fn remote_error(method: Method, status: StatusCode, message: &str) -> ApiError {
    ApiError::Status {
        method,
        path: "/api/v1/datastores".to_string(),
        status,
        message: message.to_string(),
    }
}

fn not_found(method: Method) -> ApiError {
    remote_error(method, StatusCode::NOT_FOUND, "datastore not found")
}

#[async_trait]
impl ProvisioningApi for FakeControlPlane {
    async fn create_datastore(&self, req: &CreateDatastoreRequest) -> ApiResult<Datastore> {
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        bump(state, "create_datastore");

        state.seq += 1;
        let id = format!("ds-{}", state.seq);

        let mut hosts = Vec::new();
        for (i, zone) in req.availability_zones.iter().enumerate() {
            state.seq += 1;
            hosts.push(Host {
                id: format!("host-{}", state.seq),
                created_at: base_time() + Duration::minutes(i as i64),
                availability_zone: zone.clone(),
                instance_type: req.instance_size.clone(),
                role: if i == 0 { "primary" } else { "replica" }.to_string(),
                port: Some(5432),
            });
        }

        let datastore = Datastore {
            id: id.clone(),
            name: req.name.clone(),
            size: req.size,
            cloud_provider: req.cloud_provider.clone(),
            cloud_region: req.cloud_region.clone(),
            availability_zones: req.availability_zones.clone(),
            vpc_uuid: req.vpc_uuid.clone(),
            db_vendor: req.db_vendor.clone(),
            db_version: req.db_version.clone(),
            kind: req.kind.clone(),
            instance_size: req.instance_size.clone(),
            volume_type: req.volume_type.clone(),
            volume_size: req.volume_size,
            volume_iops: req.volume_iops,
            notifications: req.notifications.clone(),
            maintenance_settings: req.maintenance_settings.clone(),
            parameter_group_id: None,
            hosts: Vec::new(),
            firewall_rules: Vec::new(),
        };

        state.datastores.insert(id.clone(), datastore.clone());
        state.hosts.insert(id.clone(), hosts);
        state.rules.insert(id.clone(), Vec::new());
        let status = state.deploy_status.unwrap_or(JobStatus::Finished);
        push_job(state, &id, JobType::Deploy, status);
        Ok(datastore)
    }

    async fn get_datastore(&self, id: &str) -> ApiResult<Datastore> {
        let mut state = self.state.lock().unwrap();
        bump(&mut state, "get_datastore");
        state.datastores.get(id).cloned().ok_or_else(|| not_found(Method::GET))
    }

    async fn patch_datastore(&self, id: &str, patch: &DatastorePatch) -> ApiResult<()> {
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        bump(state, "patch_datastore");

        let Some(ds) = state.datastores.get_mut(id) else {
            return Err(not_found(Method::PATCH));
        };
        if let Some(name) = &patch.name {
            ds.name = name.clone();
        }
        if let Some(volume_size) = patch.volume_size {
            ds.volume_size = volume_size;
        }
        if let Some(notifications) = &patch.notifications {
            ds.notifications = notifications.clone();
        }
        if let Some(window) = &patch.maintenance_settings {
            ds.maintenance_settings = Some(window.clone());
        }
        push_job(state, id, JobType::ModifyConfig, JobStatus::Finished);
        Ok(())
    }

    async fn resize_datastore(&self, id: &str, req: &ResizeRequest) -> ApiResult<()> {
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        bump(state, "resize_datastore");

        if !state.datastores.contains_key(id) {
            return Err(not_found(Method::POST));
        }
        let job_type = if req.remove.is_empty() {
            JobType::AddNode
        } else {
            JobType::RemoveNode
        };

        let mut added = Vec::new();
        for HostSpec {
            availability_zone,
            instance_type,
        } in &req.add
        {
            state.seq += 1;
            added.push(Host {
                id: format!("host-{}", state.seq),
                created_at: base_time() + Duration::hours(1) + Duration::minutes(state.seq as i64),
                availability_zone: availability_zone.clone(),
                instance_type: instance_type.clone(),
                role: "replica".to_string(),
                port: Some(5432),
            });
        }

        let hosts = state.hosts.entry(id.to_string()).or_default();
        hosts.retain(|h| !req.remove.contains(&h.id));
        hosts.extend(added);
        let zones: Vec<String> = hosts.iter().map(|h| h.availability_zone.clone()).collect();
        let size = hosts.len() as u32;

        let ds = state.datastores.get_mut(id).unwrap();
        ds.size = size;
        ds.availability_zones = zones;
        push_job(state, id, job_type, JobStatus::Finished);
        Ok(())
    }

    async fn delete_datastore(&self, id: &str) -> ApiResult<()> {
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        bump(state, "delete_datastore");

        if state.datastores.remove(id).is_none() {
            return Err(not_found(Method::DELETE));
        }
        state.hosts.remove(id);
        state.rules.remove(id);
        if state.drop_job_feed_on_delete {
            state.jobs.remove(id);
        } else {
            push_job(state, id, JobType::Destroy, JobStatus::Finished);
        }
        Ok(())
    }

    async fn list_hosts(&self, id: &str) -> ApiResult<Vec<Host>> {
        let mut state = self.state.lock().unwrap();
        bump(&mut state, "list_hosts");
        state.hosts.get(id).cloned().ok_or_else(|| not_found(Method::GET))
    }

    async fn list_firewall_rules(&self, id: &str) -> ApiResult<Vec<FirewallRule>> {
        let mut state = self.state.lock().unwrap();
        bump(&mut state, "list_firewall_rules");
        state.rules.get(id).cloned().ok_or_else(|| not_found(Method::GET))
    }

    async fn create_firewall_rule(&self, id: &str, rule: &FirewallRule) -> ApiResult<()> {
        let mut state = self.state.lock().unwrap();
        bump(&mut state, "create_firewall_rule");
        if state.fail_rule_sources.contains(&rule.source) {
            return Err(remote_error(
                Method::POST,
                StatusCode::INTERNAL_SERVER_ERROR,
                "rule rejected",
            ));
        }
        let Some(rules) = state.rules.get_mut(id) else {
            return Err(not_found(Method::POST));
        };
        rules.push(rule.clone());
        Ok(())
    }

    async fn delete_firewall_rule(&self, id: &str, rule: &FirewallRule) -> ApiResult<()> {
        let mut state = self.state.lock().unwrap();
        bump(&mut state, "delete_firewall_rule");
        if state.fail_rule_sources.contains(&rule.source) {
            return Err(remote_error(
                Method::DELETE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "rule rejected",
            ));
        }
        let Some(rules) = state.rules.get_mut(id) else {
            return Err(not_found(Method::DELETE));
        };
        rules.retain(|r| r.source != rule.source);
        Ok(())
    }

    async fn set_maintenance_settings(
        &self,
        id: &str,
        settings: &MaintenanceSettings,
    ) -> ApiResult<()> {
        let mut state = self.state.lock().unwrap();
        bump(&mut state, "set_maintenance_settings");
        let Some(ds) = state.datastores.get_mut(id) else {
            return Err(not_found(Method::PUT));
        };
        ds.maintenance_settings = Some(settings.clone());
        Ok(())
    }

    async fn apply_parameter_group(&self, id: &str, group_id: &str) -> ApiResult<()> {
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        bump(state, "apply_parameter_group");
        if state.fail_parameter_group {
            return Err(remote_error(
                Method::PUT,
                StatusCode::INTERNAL_SERVER_ERROR,
                "parameter group rejected",
            ));
        }
        let Some(ds) = state.datastores.get_mut(id) else {
            return Err(not_found(Method::PUT));
        };
        ds.parameter_group_id = Some(group_id.to_string());
        push_job(state, id, JobType::ModifyConfig, JobStatus::Finished);
        Ok(())
    }

    async fn list_jobs(&self, id: &str) -> ApiResult<Vec<Job>> {
        let mut state = self.state.lock().unwrap();
        bump(&mut state, "list_jobs");
        state.jobs.get(id).cloned().ok_or_else(|| not_found(Method::GET))
    }
}

#[async_trait]
impl ContentCatalog for FakeControlPlane {
    async fn availability_zones(&self, _provider: &str, _region: &str) -> ApiResult<Vec<String>> {
        let mut state = self.state.lock().unwrap();
        bump(&mut state, "availability_zones");
        Ok(state.zones.clone())
    }

    async fn instance_sizes(&self) -> ApiResult<Vec<InstanceSize>> {
        let mut state = self.state.lock().unwrap();
        bump(&mut state, "instance_sizes");
        Ok(vec![
            InstanceSize {
                code: "m.large".to_string(),
                cpu_cores: 2,
                ram_gb: 8,
            },
            InstanceSize {
                code: "m.2xlarge".to_string(),
                cpu_cores: 8,
                ram_gb: 32,
            },
        ])
    }

    async fn db_vendors(&self) -> ApiResult<Vec<DbVendor>> {
        let mut state = self.state.lock().unwrap();
        bump(&mut state, "db_vendors");
        Ok(vec![DbVendor {
            code: "postgres".to_string(),
            name: "PostgreSQL".to_string(),
            versions: vec!["15".to_string(), "16".to_string()],
        }])
    }

    async fn volume_types(&self) -> ApiResult<Vec<VolumeType>> {
        let mut state = self.state.lock().unwrap();
        bump(&mut state, "volume_types");
        Ok(vec![
            VolumeType {
                code: "gp2".to_string(),
                cloud_provider: "aws".to_string(),
            },
            VolumeType {
                code: "gp3".to_string(),
                cloud_provider: "aws".to_string(),
            },
        ])
    }
}

// ===== HTTP stub server =====

/// Test server wrapper serving a control plane stub router.
pub struct TestServer {
    pub addr: SocketAddr,
    shutdown_tx: tokio::sync::oneshot::Sender<()>,
}

impl TestServer {
    /// Spawn the given router on an OS-assigned port.
    pub async fn spawn(router: axum::Router) -> Self {
        // Bind to port 0 to let the OS choose an available port
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let listener = tokio::net::TcpListener::bind(&addr).await.expect("Failed to bind");
        let actual_addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .expect("Server error");
        });

        // Small delay to ensure server is ready
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        Self {
            addr: actual_addr,
            shutdown_tx,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn client(&self, token: &str) -> stratus_client::ApiClient {
        stratus_client::ApiClient::new(stratus_client::ClientConfig::new(self.base_url(), token))
            .expect("valid client config")
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
    }
}
