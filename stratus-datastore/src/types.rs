//! Datastore data model and wire types.
//!
//! A datastore is a clustered database managed by the Stratus control
//! plane. Values here mirror the control plane's JSON representation;
//! nothing in this crate mutates remote state except through the
//! [`crate::api`] traits.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Datastore
// =============================================================================

/// A managed database cluster as reported by the control plane.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Datastore {
    /// Control plane assigned id. Empty on a not-yet-created datastore.
    #[serde(default)]
    pub id: String,
    pub name: String,
    /// Desired number of hosts.
    pub size: u32,
    pub cloud_provider: String,
    pub cloud_region: String,
    /// One entry per host. For public datastores the engine keeps this at
    /// exactly `size` entries; repeats are allowed.
    #[serde(default)]
    pub availability_zones: Vec<String>,
    /// Empty for public datastores; otherwise the owning VPC.
    #[serde(default)]
    pub vpc_uuid: String,
    pub db_vendor: String,
    #[serde(default)]
    pub db_version: String,
    /// Cluster topology, e.g. `replication`.
    #[serde(rename = "type")]
    pub kind: String,
    pub instance_size: String,
    pub volume_type: String,
    /// Volume size in GiB.
    pub volume_size: u64,
    #[serde(default)]
    pub volume_iops: Option<u64>,
    #[serde(default)]
    pub notifications: Notifications,
    #[serde(default)]
    pub maintenance_settings: Option<MaintenanceSettings>,
    #[serde(default)]
    pub parameter_group_id: Option<String>,
    /// Observed hosts. Never sent on create; refreshed by reads.
    #[serde(default)]
    pub hosts: Vec<Host>,
    /// Observed firewall rules. Never sent on create; refreshed by reads.
    #[serde(default)]
    pub firewall_rules: Vec<FirewallRule>,
}

impl Datastore {
    /// True when the datastore is publicly reachable (not bound to a VPC).
    pub fn is_public(&self) -> bool {
        self.vpc_uuid.is_empty()
    }
}

/// Alerting configuration for a datastore.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notifications {
    pub enabled: bool,
    /// Recipients; order carries no meaning.
    #[serde(default)]
    pub emails: Vec<String>,
}

/// Maintenance window. Always replaced as a whole, never patched per field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceSettings {
    /// Weekday name, e.g. `saturday`.
    pub day_of_week: String,
    /// Window start in 24h `HH:MM`, cluster-local time.
    pub start_time: String,
}

// =============================================================================
// Hosts
// =============================================================================

/// A single database host inside a datastore. Reported by the control
/// plane and never mutated locally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Host {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub availability_zone: String,
    pub instance_type: String,
    /// Replication role as spelled by the control plane.
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub port: Option<u16>,
}

impl Host {
    /// True for the cluster primary, however the control plane spells it.
    pub fn is_primary(&self) -> bool {
        self.role.eq_ignore_ascii_case("primary") || self.role.eq_ignore_ascii_case("master")
    }
}

/// Spec for one host to be added during a scale-up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostSpec {
    pub availability_zone: String,
    pub instance_type: String,
}

// =============================================================================
// Firewall
// =============================================================================

/// An allow rule on a datastore's firewall.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FirewallRule {
    /// CIDR allowed to connect. Natural key when diffing rule sets.
    pub source: String,
    #[serde(default)]
    pub description: String,
}

// =============================================================================
// Jobs
// =============================================================================

/// Background job kinds spawned by the control plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobType {
    /// Initial provisioning of a datastore.
    Deploy,
    /// Teardown of a datastore.
    Destroy,
    /// Applying configuration changes (patch, parameter group).
    ModifyConfig,
    AddNode,
    RemoveNode,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::Deploy => "deploy",
            JobType::Destroy => "destroy",
            JobType::ModifyConfig => "modify-config",
            JobType::AddNode => "add-node",
            JobType::RemoveNode => "remove-node",
        }
    }
}

impl std::fmt::Display for JobType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Job lifecycle: `Unknown` -> `Running` -> `Finished` or `Errored`.
///
/// `Unknown` also covers the window right after a request is accepted but
/// before the job shows up in the feed, so pollers keep waiting on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum JobStatus {
    #[serde(rename = "JOB_STATUS_RUNNING")]
    Running,
    #[serde(rename = "JOB_STATUS_FINISHED")]
    Finished,
    #[serde(rename = "JOB_STATUS_ERRORED")]
    Errored,
    // serde requires the catch-all variant to come last.
    #[default]
    #[serde(rename = "JOB_STATUS_UNKNOWN")]
    #[serde(other)]
    Unknown,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Unknown => "JOB_STATUS_UNKNOWN",
            JobStatus::Running => "JOB_STATUS_RUNNING",
            JobStatus::Finished => "JOB_STATUS_FINISHED",
            JobStatus::Errored => "JOB_STATUS_ERRORED",
        }
    }

    /// Finished or errored.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Finished | JobStatus::Errored)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A background job attached to a datastore.
///
/// Feed entries arrive as `{job_id, type, status}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    #[serde(rename = "job_id")]
    pub id: String,
    #[serde(rename = "type")]
    pub job_type: JobType,
    pub status: JobStatus,
}

// =============================================================================
// Allocation
// =============================================================================

/// Per-zone host count used as input to the availability zone allocator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneLoad {
    pub zone: String,
    pub count: usize,
}

impl ZoneLoad {
    pub fn new(zone: impl Into<String>, count: usize) -> Self {
        Self {
            zone: zone.into(),
            count,
        }
    }
}

// =============================================================================
// Request DTOs
// =============================================================================

/// Body of `POST /api/v1/datastores`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDatastoreRequest {
    pub name: String,
    pub size: u32,
    pub cloud_provider: String,
    pub cloud_region: String,
    pub availability_zones: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub vpc_uuid: String,
    pub db_vendor: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub db_version: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub instance_size: String,
    pub volume_type: String,
    pub volume_size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_iops: Option<u64>,
    pub notifications: Notifications,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maintenance_settings: Option<MaintenanceSettings>,
}

impl From<&Datastore> for CreateDatastoreRequest {
    fn from(ds: &Datastore) -> Self {
        Self {
            name: ds.name.clone(),
            size: ds.size,
            cloud_provider: ds.cloud_provider.clone(),
            cloud_region: ds.cloud_region.clone(),
            availability_zones: ds.availability_zones.clone(),
            vpc_uuid: ds.vpc_uuid.clone(),
            db_vendor: ds.db_vendor.clone(),
            db_version: ds.db_version.clone(),
            kind: ds.kind.clone(),
            instance_size: ds.instance_size.clone(),
            volume_type: ds.volume_type.clone(),
            volume_size: ds.volume_size,
            volume_iops: ds.volume_iops,
            notifications: ds.notifications.clone(),
            maintenance_settings: ds.maintenance_settings.clone(),
        }
    }
}

/// Body of `PATCH /api/v1/datastores/{id}`. Absent fields stay untouched;
/// maintenance settings always replace the whole window.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatastorePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notifications: Option<Notifications>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maintenance_settings: Option<MaintenanceSettings>,
}

impl DatastorePatch {
    /// True when the patch would change nothing.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.volume_size.is_none()
            && self.notifications.is_none()
            && self.maintenance_settings.is_none()
    }
}

/// Body of `POST /api/v1/datastores/{id}/resize`. Exactly one of the two
/// lists is populated per request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResizeRequest {
    /// Hosts to add, one spec per new node.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub add: Vec<HostSpec>,
    /// Ids of hosts to remove.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remove: Vec<String>,
}

// =============================================================================
// Catalog
// =============================================================================

/// An orderable instance size from the content catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceSize {
    pub code: String,
    pub cpu_cores: u32,
    pub ram_gb: u32,
}

/// A supported database vendor and its orderable versions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbVendor {
    pub code: String,
    pub name: String,
    pub versions: Vec<String>,
}

/// An orderable volume type for a given provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeType {
    pub code: String,
    pub cloud_provider: String,
}
