//! stratus-datastore - lifecycle engine for managed datastore clusters
//!
//! Drives the Stratus provisioning control plane: creating, inspecting,
//! updating and deleting datastore clusters, reconciling their firewall
//! rules, and waiting out the background jobs the control plane spawns
//! for every mutation.
//!
//! The entry point is [`DatastoreService`]. Pure decisions, zone spreading
//! in [`azalloc`] and change planning in [`update`], are separate from the
//! driving so they stay testable without a control plane.
//!
//! ```ignore
//! use stratus_client::{ApiClient, ClientConfig};
//! use stratus_datastore::DatastoreService;
//! use tokio_util::sync::CancellationToken;
//!
//! let client = ApiClient::new(ClientConfig::from_env()?)?;
//! let service = DatastoreService::from_client(client);
//!
//! let cancel = CancellationToken::new();
//! let datastore = service.create(&cancel, &desired).await?;
//! println!("{} is up with {} hosts", datastore.name, datastore.hosts.len());
//! ```

pub mod api;
pub mod azalloc;
mod error;
pub mod firewall;
pub mod jobs;
pub mod remote;
pub mod service;
pub mod types;
pub mod update;

pub use error::{Error, JobError, Result};
pub use remote::RemoteControlPlane;
pub use service::{DatastoreService, ServiceConfig};
pub use types::{
    CreateDatastoreRequest, Datastore, DatastorePatch, FirewallRule, Host, Job, JobStatus,
    JobType, MaintenanceSettings, Notifications,
};
