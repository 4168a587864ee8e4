//! Control plane interface definitions.
//!
//! These traits abstract the remote provisioning API so the engine can be
//! exercised against in-memory fakes. The HTTP implementation lives in
//! [`crate::remote`]; errors are the transport-level
//! [`stratus_client::ApiError`] so callers keep the remote's status and
//! message.

use async_trait::async_trait;
use stratus_client::ApiResult;

use crate::types::{
    CreateDatastoreRequest, Datastore, DatastorePatch, DbVendor, FirewallRule, Host, InstanceSize,
    Job, MaintenanceSettings, ResizeRequest, VolumeType,
};

/// Provisioning surface of the control plane, scoped to datastores.
///
/// Every mutation is accepted asynchronously; the control plane applies it
/// through a background job observable via [`ProvisioningApi::list_jobs`].
/// The exceptions are firewall rules and maintenance settings, which apply
/// synchronously.
#[async_trait]
pub trait ProvisioningApi: Send + Sync {
    /// Create a datastore. Provisioning continues in a `deploy` job.
    async fn create_datastore(&self, req: &CreateDatastoreRequest) -> ApiResult<Datastore>;

    /// Fetch a datastore by id. A missing datastore surfaces as a 404
    /// status error; callers map it to their own not-found handling.
    async fn get_datastore(&self, id: &str) -> ApiResult<Datastore>;

    /// Patch simple fields. Applied by a `modify-config` job.
    async fn patch_datastore(&self, id: &str, patch: &DatastorePatch) -> ApiResult<()>;

    /// Add or remove hosts. Applied by an `add-node` or `remove-node` job.
    async fn resize_datastore(&self, id: &str, req: &ResizeRequest) -> ApiResult<()>;

    /// Delete a datastore. Teardown continues in a `destroy` job.
    async fn delete_datastore(&self, id: &str) -> ApiResult<()>;

    /// List the hosts of a datastore.
    async fn list_hosts(&self, id: &str) -> ApiResult<Vec<Host>>;

    /// List the current firewall rules of a datastore.
    async fn list_firewall_rules(&self, id: &str) -> ApiResult<Vec<FirewallRule>>;

    /// Add one firewall rule.
    async fn create_firewall_rule(&self, id: &str, rule: &FirewallRule) -> ApiResult<()>;

    /// Remove one firewall rule.
    async fn delete_firewall_rule(&self, id: &str, rule: &FirewallRule) -> ApiResult<()>;

    /// Replace the maintenance window as a whole.
    async fn set_maintenance_settings(
        &self,
        id: &str,
        settings: &MaintenanceSettings,
    ) -> ApiResult<()>;

    /// Attach a parameter group. Applied by a `modify-config` job.
    async fn apply_parameter_group(&self, id: &str, group_id: &str) -> ApiResult<()>;

    /// List a datastore's jobs, newest first.
    async fn list_jobs(&self, id: &str) -> ApiResult<Vec<Job>>;
}

/// Read-only catalog of orderable configurations.
#[async_trait]
pub trait ContentCatalog: Send + Sync {
    /// Availability zones offered for a provider and region.
    async fn availability_zones(&self, provider: &str, region: &str) -> ApiResult<Vec<String>>;

    /// Orderable instance sizes.
    async fn instance_sizes(&self) -> ApiResult<Vec<InstanceSize>>;

    /// Supported database vendors and their versions.
    async fn db_vendors(&self) -> ApiResult<Vec<DbVendor>>;

    /// Orderable volume types.
    async fn volume_types(&self) -> ApiResult<Vec<VolumeType>>;
}
