//! HTTP implementation of the control plane traits.
//!
//! Thin mapping from [`ProvisioningApi`] and [`ContentCatalog`] onto the
//! control plane's REST surface via [`stratus_client::ApiClient`]. No
//! retries or caching here; policy lives in the callers.

use async_trait::async_trait;
use serde::Serialize;
use stratus_client::{ApiClient, ApiResult};

use crate::api::{ContentCatalog, ProvisioningApi};
use crate::types::{
    CreateDatastoreRequest, Datastore, DatastorePatch, DbVendor, FirewallRule, Host, InstanceSize,
    Job, MaintenanceSettings, ResizeRequest, VolumeType,
};

const BASE: &str = "/api/v1";

/// Parameter group assignment body; the id travels in the payload, not
/// the path.
#[derive(Serialize)]
struct ParameterGroupBody<'a> {
    parameter_group_id: &'a str,
}

/// Control plane reached over HTTP.
pub struct RemoteControlPlane {
    client: ApiClient,
}

impl RemoteControlPlane {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    fn datastore_path(id: &str, suffix: &str) -> String {
        format!("{BASE}/datastores/{id}{suffix}")
    }
}

#[async_trait]
impl ProvisioningApi for RemoteControlPlane {
    async fn create_datastore(&self, req: &CreateDatastoreRequest) -> ApiResult<Datastore> {
        self.client.post_json(&format!("{BASE}/datastores"), req).await
    }

    async fn get_datastore(&self, id: &str) -> ApiResult<Datastore> {
        self.client.get_json(&Self::datastore_path(id, "")).await
    }

    async fn patch_datastore(&self, id: &str, patch: &DatastorePatch) -> ApiResult<()> {
        self.client.patch(&Self::datastore_path(id, ""), patch).await
    }

    async fn resize_datastore(&self, id: &str, req: &ResizeRequest) -> ApiResult<()> {
        self.client.post(&Self::datastore_path(id, "/resize"), req).await
    }

    async fn delete_datastore(&self, id: &str) -> ApiResult<()> {
        self.client.delete(&Self::datastore_path(id, "")).await
    }

    async fn list_hosts(&self, id: &str) -> ApiResult<Vec<Host>> {
        self.client.get_json(&Self::datastore_path(id, "/hosts")).await
    }

    async fn list_firewall_rules(&self, id: &str) -> ApiResult<Vec<FirewallRule>> {
        self.client.get_json(&Self::datastore_path(id, "/firewall-rules")).await
    }

    async fn create_firewall_rule(&self, id: &str, rule: &FirewallRule) -> ApiResult<()> {
        self.client.post(&Self::datastore_path(id, "/firewall-rules"), rule).await
    }

    // Rule sources are CIDRs, which do not survive path encoding, so the
    // rule to remove travels in the body.
    async fn delete_firewall_rule(&self, id: &str, rule: &FirewallRule) -> ApiResult<()> {
        self.client
            .delete_with_body(&Self::datastore_path(id, "/firewall-rules"), rule)
            .await
    }

    async fn set_maintenance_settings(
        &self,
        id: &str,
        settings: &MaintenanceSettings,
    ) -> ApiResult<()> {
        self.client.put(&Self::datastore_path(id, "/maintenance"), settings).await
    }

    async fn apply_parameter_group(&self, id: &str, group_id: &str) -> ApiResult<()> {
        let body = ParameterGroupBody {
            parameter_group_id: group_id,
        };
        self.client
            .put(&Self::datastore_path(id, "/parameter-group"), &body)
            .await
    }

    async fn list_jobs(&self, id: &str) -> ApiResult<Vec<Job>> {
        self.client.get_json(&Self::datastore_path(id, "/jobs")).await
    }
}

#[async_trait]
impl ContentCatalog for RemoteControlPlane {
    async fn availability_zones(&self, provider: &str, region: &str) -> ApiResult<Vec<String>> {
        self.client
            .get_json_query(
                &format!("{BASE}/catalog/availability-zones"),
                &[("provider", provider), ("region", region)],
            )
            .await
    }

    async fn instance_sizes(&self) -> ApiResult<Vec<InstanceSize>> {
        self.client.get_json(&format!("{BASE}/catalog/instance-sizes")).await
    }

    async fn db_vendors(&self) -> ApiResult<Vec<DbVendor>> {
        self.client.get_json(&format!("{BASE}/catalog/db-vendors")).await
    }

    async fn volume_types(&self) -> ApiResult<Vec<VolumeType>> {
        self.client.get_json(&format!("{BASE}/catalog/volume-types")).await
    }
}
