//! Engine error types.

use std::time::Duration;

use stratus_client::ApiError;
use thiserror::Error;

use crate::types::{Datastore, JobStatus, JobType};

/// Errors while waiting on a control plane job.
#[derive(Debug, Error)]
pub enum JobError {
    /// The job reached a terminal state other than finished.
    #[error("job failed: {0}")]
    Failed(JobStatus),

    /// No terminal state was observed within the allowed window.
    #[error("job did not finish within {waited:?}")]
    TimedOut { waited: Duration },

    /// The wait was cancelled by the caller. Distinct from a timeout.
    #[error("cancelled while waiting for job")]
    Cancelled,

    /// Polling kept failing; this is the last error seen at the deadline.
    #[error("polling job status: {0}")]
    Api(#[source] ApiError),
}

/// Errors returned by the datastore engine.
#[derive(Debug, Error)]
pub enum Error {
    /// Transport failure or remote rejection from the control plane.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The datastore does not exist on the control plane.
    #[error("datastore {0} not found")]
    NotFound(String),

    /// Fields changed that the control plane cannot apply in place. All
    /// offending fields are listed, not just the first.
    #[error("update not supported for fields: {}", fields.join(", "))]
    UpdateNotSupported { fields: Vec<&'static str> },

    /// Scale-down needs more victims than there are non-primary hosts.
    #[error("not enough removable hosts: need to remove {needed}, only {available} non-primary")]
    NotEnoughRemovableHosts { needed: usize, available: usize },

    /// The catalog reports no availability zones for the target region.
    #[error("no availability zones for provider {provider} in region {region}")]
    NoZonesAvailable { provider: String, region: String },

    /// The availability zone list does not line up with the node count.
    #[error("availability zone list has {zones} entries, expected {nodes}")]
    AzCountMismatch { zones: usize, nodes: usize },

    /// A background job failed, timed out, or could not be observed.
    #[error("awaiting {job} job for datastore {datastore}: {source}")]
    Job {
        job: JobType,
        datastore: String,
        #[source]
        source: JobError,
    },

    /// A firewall rule operation failed and the batch was aborted.
    #[error("{op} firewall rule {rule_source} ({description}): {cause}")]
    FirewallRule {
        op: &'static str,
        rule_source: String,
        description: String,
        #[source]
        cause: ApiError,
    },

    /// The datastore was created but a follow-up step failed. The partial
    /// result is carried so callers can repair instead of re-creating.
    #[error("datastore {} created but not fully configured: {source}", datastore.id)]
    CreateIncomplete {
        datastore: Box<Datastore>,
        #[source]
        source: Box<Error>,
    },

    /// The operation was cancelled by the caller.
    #[error("operation cancelled")]
    Cancelled,
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
