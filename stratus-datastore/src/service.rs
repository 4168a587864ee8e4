//! Datastore lifecycle orchestration.
//!
//! [`DatastoreService`] is the high-level surface: create, read, update and
//! delete datastores, plus targeted operations for firewall rules,
//! maintenance windows and parameter groups. Every mutation drives the
//! control plane request, waits out the background job it spawns, and
//! re-reads the result so callers always get settled state back.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::api::{ContentCatalog, ProvisioningApi};
use crate::azalloc;
use crate::error::{Error, JobError, Result};
use crate::firewall::{self, FirewallReconciler};
use crate::jobs::{self, JobOutcome};
use crate::remote::RemoteControlPlane;
use crate::types::{
    CreateDatastoreRequest, Datastore, FirewallRule, JobStatus, JobType, MaintenanceSettings,
    ZoneLoad,
};
use crate::update;

// ===== Configuration =====

/// Poll cadence and per-job deadlines.
///
/// The defaults are sized for managed database clusters, where a deploy
/// regularly takes tens of minutes.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Fixed interval between job status polls.
    pub poll_interval: Duration,
    pub deploy_timeout: Duration,
    pub destroy_timeout: Duration,
    pub modify_timeout: Duration,
    /// Shared by add-node and remove-node jobs.
    pub resize_timeout: Duration,
    /// Cap on concurrent firewall rule calls.
    pub rule_concurrency: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            deploy_timeout: Duration::from_secs(60 * 60),
            destroy_timeout: Duration::from_secs(30 * 60),
            modify_timeout: Duration::from_secs(20 * 60),
            resize_timeout: Duration::from_secs(40 * 60),
            rule_concurrency: firewall::DEFAULT_RULE_CONCURRENCY,
        }
    }
}

// ===== Service =====

/// Drives datastore lifecycles against the provisioning control plane.
///
/// The service keeps no state of its own: every operation works from the
/// caller's last observed state and fresh remote reads. All operations
/// take a [`CancellationToken`] and abort promptly, including any
/// in-flight request or job wait, once it fires.
pub struct DatastoreService {
    api: Arc<dyn ProvisioningApi>,
    catalog: Arc<dyn ContentCatalog>,
    firewall: FirewallReconciler,
    config: ServiceConfig,
}

impl DatastoreService {
    pub fn new(api: Arc<dyn ProvisioningApi>, catalog: Arc<dyn ContentCatalog>) -> Self {
        Self::with_config(api, catalog, ServiceConfig::default())
    }

    pub fn with_config(
        api: Arc<dyn ProvisioningApi>,
        catalog: Arc<dyn ContentCatalog>,
        config: ServiceConfig,
    ) -> Self {
        let firewall =
            FirewallReconciler::new(Arc::clone(&api)).with_concurrency(config.rule_concurrency);
        Self {
            api,
            catalog,
            firewall,
            config,
        }
    }

    /// Service backed by the HTTP control plane.
    pub fn from_client(client: stratus_client::ApiClient) -> Self {
        let remote = Arc::new(RemoteControlPlane::new(client));
        Self::new(remote.clone(), remote)
    }

    // ===== Lifecycle operations =====

    /// Create a datastore and drive it to a fully configured state.
    ///
    /// For a public datastore the zone list is completed to exactly `size`
    /// entries through the allocator before the request goes out; zones
    /// the caller supplied are kept and count toward the spread. After the
    /// deploy job finishes, the parameter group (when set) is applied and
    /// the desired firewall rules are installed, then the settled state
    /// is read back.
    ///
    /// Failures before the create request surface as plain errors. Any
    /// failure after the datastore exists comes back as
    /// [`Error::CreateIncomplete`] carrying the partially configured
    /// datastore, so callers can repair instead of re-creating. That
    /// covers cancellation too: a token fired after the create call went
    /// out yields `CreateIncomplete` with [`Error::Cancelled`] as its
    /// source, still naming the created id.
    pub async fn create(&self, cancel: &CancellationToken, desired: &Datastore) -> Result<Datastore> {
        let mut request = CreateDatastoreRequest::from(desired);
        if desired.is_public() {
            request.availability_zones = self.complete_zones(cancel, desired).await?;
        }

        info!(name = %desired.name, size = desired.size, "Creating datastore");
        let created = self.checked(cancel, self.api.create_datastore(&request)).await?;

        match self.configure_created(cancel, &created, desired).await {
            Ok(settled) => Ok(settled),
            // Cancelled after the create call: keep the id and return
            // without another remote call.
            Err(cause @ Error::Cancelled) => Err(Error::CreateIncomplete {
                datastore: Box::new(created),
                source: Box::new(cause),
            }),
            Err(cause) => {
                // Hand back the freshest state we can still get.
                let partial = match self.read(cancel, &created.id).await {
                    Ok(Some(observed)) => observed,
                    _ => created,
                };
                Err(Error::CreateIncomplete {
                    datastore: Box::new(partial),
                    source: Box::new(cause),
                })
            }
        }
    }

    async fn configure_created(
        &self,
        cancel: &CancellationToken,
        created: &Datastore,
        desired: &Datastore,
    ) -> Result<Datastore> {
        self.await_job(cancel, &created.id, JobType::Deploy).await?;

        if let Some(group_id) = &desired.parameter_group_id {
            self.apply_parameter_group(cancel, &created.id, group_id).await?;
        }
        if !desired.firewall_rules.is_empty() {
            self.firewall.reconcile(cancel, &created.id, &desired.firewall_rules).await?;
        }

        self.read_existing(cancel, &created.id).await
    }

    /// Fetch the current state of a datastore, or `None` when it does not
    /// exist.
    ///
    /// Hosts and firewall rules come from their dedicated endpoints. When
    /// the remote omits the zone list, it is reconstructed from the hosts'
    /// observed zones.
    pub async fn read(&self, cancel: &CancellationToken, id: &str) -> Result<Option<Datastore>> {
        let mut datastore = match self.checked(cancel, self.api.get_datastore(id)).await {
            Ok(datastore) => datastore,
            Err(Error::Api(e)) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e),
        };

        datastore.hosts = self.checked(cancel, self.api.list_hosts(id)).await?;
        datastore.firewall_rules = self.checked(cancel, self.api.list_firewall_rules(id)).await?;
        if datastore.availability_zones.is_empty() {
            datastore.availability_zones = datastore
                .hosts
                .iter()
                .map(|h| h.availability_zone.clone())
                .collect();
        }
        Ok(Some(datastore))
    }

    /// Apply the difference between `old`, the last observed state, and
    /// `next`, the desired state.
    ///
    /// Changes to fields the control plane cannot update in place are
    /// rejected up front, naming every offending field, before any remote
    /// call. The rest applies in a fixed order: settings patch, then
    /// resize, then firewall reconciliation, each waiting out its job. A
    /// no-op update makes no remote calls at all and returns `old` as is.
    pub async fn update(
        &self,
        cancel: &CancellationToken,
        old: &Datastore,
        next: &Datastore,
    ) -> Result<Datastore> {
        let unsupported = update::unsupported_changes(old, next);
        if !unsupported.is_empty() {
            return Err(Error::UpdateNotSupported {
                fields: unsupported,
            });
        }

        // The catalog is consulted only when a public scale-up actually
        // needs zones allocated.
        let inventory = if update::resize_needs_inventory(old, next) {
            let zones = self
                .checked(
                    cancel,
                    self.catalog.availability_zones(&old.cloud_provider, &old.cloud_region),
                )
                .await?;
            if zones.is_empty() {
                return Err(Error::NoZonesAvailable {
                    provider: old.cloud_provider.clone(),
                    region: old.cloud_region.clone(),
                });
            }
            zones
        } else {
            Vec::new()
        };

        let plan = update::plan_update(old, next, &inventory)?;
        let firewall_drift = !firewall::rules_equivalent(&old.firewall_rules, &next.firewall_rules);

        if !plan.changed() && !firewall_drift {
            debug!(datastore = %old.id, "Update is a no-op");
            return Ok(old.clone());
        }

        if let Some(patch) = &plan.patch {
            info!(datastore = %old.id, "Patching datastore settings");
            self.checked(cancel, self.api.patch_datastore(&old.id, patch)).await?;
            self.await_job(cancel, &old.id, JobType::ModifyConfig).await?;
        }

        if let Some(resize) = plan.resize {
            let job = resize.job_type();
            info!(datastore = %old.id, job = %job, "Resizing datastore");
            let request = resize.into_request();
            self.checked(cancel, self.api.resize_datastore(&old.id, &request)).await?;
            self.await_job(cancel, &old.id, job).await?;
        }

        if firewall_drift {
            self.firewall.reconcile(cancel, &old.id, &next.firewall_rules).await?;
        }

        self.read_existing(cancel, &old.id).await
    }

    /// Delete a datastore and wait for teardown to finish.
    ///
    /// A 404 on the delete means it is already gone and counts as success.
    /// So does the datastore, and its job feed, vanishing while the
    /// destroy job is awaited.
    pub async fn delete(&self, cancel: &CancellationToken, id: &str) -> Result<()> {
        info!(datastore = id, "Deleting datastore");
        match self.checked(cancel, self.api.delete_datastore(id)).await {
            Ok(()) => {}
            Err(Error::Api(e)) if e.is_not_found() => {
                debug!(datastore = id, "Datastore already gone");
                return Ok(());
            }
            Err(e) => return Err(e),
        }

        let outcome = jobs::await_job_or_gone(
            self.api.as_ref(),
            cancel,
            id,
            JobType::Destroy,
            self.config.destroy_timeout,
            self.config.poll_interval,
        )
        .await
        .map_err(|source| job_error(JobType::Destroy, id, source))?;

        match outcome {
            JobOutcome::Status(JobStatus::Finished) | JobOutcome::Gone => Ok(()),
            JobOutcome::Status(status) => Err(Error::Job {
                job: JobType::Destroy,
                datastore: id.to_string(),
                source: JobError::Failed(status),
            }),
        }
    }

    // ===== Targeted operations =====

    /// Reconcile the datastore's firewall toward exactly `rules`.
    pub async fn set_firewall_rules(
        &self,
        cancel: &CancellationToken,
        id: &str,
        rules: &[FirewallRule],
    ) -> Result<()> {
        self.firewall.reconcile(cancel, id, rules).await
    }

    /// Replace the maintenance window. The control plane applies this
    /// synchronously; no job is spawned.
    pub async fn set_maintenance_settings(
        &self,
        cancel: &CancellationToken,
        id: &str,
        settings: &MaintenanceSettings,
    ) -> Result<()> {
        info!(datastore = id, "Setting maintenance window");
        self.checked(cancel, self.api.set_maintenance_settings(id, settings)).await
    }

    /// Attach a parameter group and wait for the config change to land.
    pub async fn apply_parameter_group(
        &self,
        cancel: &CancellationToken,
        id: &str,
        group_id: &str,
    ) -> Result<()> {
        info!(datastore = id, group = group_id, "Applying parameter group");
        self.checked(cancel, self.api.apply_parameter_group(id, group_id)).await?;
        self.await_job(cancel, id, JobType::ModifyConfig).await
    }

    // ===== Internals =====

    /// Complete a public datastore's zone list to exactly `size` entries.
    async fn complete_zones(
        &self,
        cancel: &CancellationToken,
        desired: &Datastore,
    ) -> Result<Vec<String>> {
        let mut zones = desired.availability_zones.clone();
        let size = desired.size as usize;
        if zones.len() > size {
            return Err(Error::AzCountMismatch {
                zones: zones.len(),
                nodes: size,
            });
        }
        if zones.len() == size {
            return Ok(zones);
        }

        let inventory = self
            .checked(
                cancel,
                self.catalog
                    .availability_zones(&desired.cloud_provider, &desired.cloud_region),
            )
            .await?;
        if inventory.is_empty() {
            return Err(Error::NoZonesAvailable {
                provider: desired.cloud_provider.clone(),
                region: desired.cloud_region.clone(),
            });
        }

        // Zones the caller pinned count as load, so the allocator spreads
        // the remainder around them.
        let loads: Vec<ZoneLoad> = inventory
            .iter()
            .map(|zone| ZoneLoad::new(zone.clone(), zones.iter().filter(|z| *z == zone).count()))
            .collect();
        let need = size - zones.len();
        zones.extend(azalloc::spread(&loads, need));

        if zones.len() != size {
            return Err(Error::AzCountMismatch {
                zones: zones.len(),
                nodes: size,
            });
        }
        Ok(zones)
    }

    /// Wait for a job and require it to finish cleanly.
    async fn await_job(&self, cancel: &CancellationToken, id: &str, job: JobType) -> Result<()> {
        let status = jobs::await_job(
            self.api.as_ref(),
            cancel,
            id,
            job,
            self.timeout_for(job),
            self.config.poll_interval,
        )
        .await
        .map_err(|source| job_error(job, id, source))?;

        if status != JobStatus::Finished {
            return Err(Error::Job {
                job,
                datastore: id.to_string(),
                source: JobError::Failed(status),
            });
        }
        Ok(())
    }

    fn timeout_for(&self, job: JobType) -> Duration {
        match job {
            JobType::Deploy => self.config.deploy_timeout,
            JobType::Destroy => self.config.destroy_timeout,
            JobType::ModifyConfig => self.config.modify_timeout,
            JobType::AddNode | JobType::RemoveNode => self.config.resize_timeout,
        }
    }

    /// Read back a datastore that is expected to exist.
    async fn read_existing(&self, cancel: &CancellationToken, id: &str) -> Result<Datastore> {
        self.read(cancel, id)
            .await?
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    /// Run a remote call, aborting it the moment `cancel` fires.
    async fn checked<T>(
        &self,
        cancel: &CancellationToken,
        call: impl Future<Output = stratus_client::ApiResult<T>>,
    ) -> Result<T> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            res = call => Ok(res?),
        }
    }
}

fn job_error(job: JobType, datastore_id: &str, source: JobError) -> Error {
    match source {
        JobError::Cancelled => Error::Cancelled,
        source => Error::Job {
            job,
            datastore: datastore_id.to_string(),
            source,
        },
    }
}
