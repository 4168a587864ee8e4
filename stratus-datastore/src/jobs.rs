//! Background job polling.
//!
//! Mutations on the control plane are accepted immediately and applied by
//! background jobs; the engine watches a datastore's job feed until the
//! relevant job settles.

use std::time::Duration;

use stratus_client::ApiError;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::api::ProvisioningApi;
use crate::error::JobError;
use crate::types::{JobStatus, JobType};

/// Outcome of a wait that tolerates the resource disappearing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    /// The job reached this terminal status.
    Status(JobStatus),
    /// The datastore, and with it the job feed, no longer exists.
    Gone,
}

/// How a 404 while polling is interpreted.
#[derive(Clone, Copy)]
enum NotFoundRule {
    /// A remote hiccup like any other poll failure.
    Transient,
    /// The resource is gone for good, as during teardown.
    Terminal,
}

/// Wait until the `job_type` job of a datastore reaches a terminal state.
///
/// The deadline is fixed once on entry. Each tick fetches the job feed and
/// inspects the first job of the requested type; a feed without one counts
/// as [`JobStatus::Unknown`] and the wait continues, since a job may not
/// have surfaced yet right after its request was accepted. Terminal states
/// come back as `Ok`, including [`JobStatus::Errored`]; treating an
/// errored job as a failure is the caller's call.
///
/// Poll failures are transient: the loop keeps going and remembers the
/// error. If the deadline passes while the latest poll had failed, that
/// error is returned instead of a bare timeout. Cancellation aborts the
/// wait, and any in-flight poll, promptly with [`JobError::Cancelled`].
/// Worst case the wait returns after `timeout` plus one `interval`.
pub async fn await_job(
    api: &dyn ProvisioningApi,
    cancel: &CancellationToken,
    datastore_id: &str,
    job_type: JobType,
    timeout: Duration,
    interval: Duration,
) -> Result<JobStatus, JobError> {
    let outcome = poll_until_settled(
        api,
        cancel,
        datastore_id,
        job_type,
        timeout,
        interval,
        NotFoundRule::Transient,
    )
    .await?;
    match outcome {
        JobOutcome::Status(status) => Ok(status),
        JobOutcome::Gone => unreachable!("not-found is transient in this wait"),
    }
}

/// Like [`await_job`], but a not-found poll ends the wait with
/// [`JobOutcome::Gone`]: during teardown the datastore vanishing is the
/// success signal, not an error worth waiting out.
pub async fn await_job_or_gone(
    api: &dyn ProvisioningApi,
    cancel: &CancellationToken,
    datastore_id: &str,
    job_type: JobType,
    timeout: Duration,
    interval: Duration,
) -> Result<JobOutcome, JobError> {
    poll_until_settled(
        api,
        cancel,
        datastore_id,
        job_type,
        timeout,
        interval,
        NotFoundRule::Terminal,
    )
    .await
}

async fn poll_until_settled(
    api: &dyn ProvisioningApi,
    cancel: &CancellationToken,
    datastore_id: &str,
    job_type: JobType,
    timeout: Duration,
    interval: Duration,
    not_found: NotFoundRule,
) -> Result<JobOutcome, JobError> {
    let deadline = Instant::now() + timeout;
    let mut last_error: Option<ApiError>;

    loop {
        let polled = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(JobError::Cancelled),
            polled = poll_status(api, datastore_id, job_type) => polled,
        };

        last_error = match polled {
            Ok(status) if status.is_terminal() => {
                debug!(datastore = datastore_id, job = %job_type, %status, "Job reached terminal state");
                return Ok(JobOutcome::Status(status));
            }
            Ok(status) => {
                debug!(datastore = datastore_id, job = %job_type, %status, "Job still pending");
                None
            }
            Err(e) if matches!(not_found, NotFoundRule::Terminal) && e.is_not_found() => {
                debug!(datastore = datastore_id, job = %job_type, "Job feed gone");
                return Ok(JobOutcome::Gone);
            }
            Err(e) => {
                warn!(datastore = datastore_id, job = %job_type, error = %e, "Job status poll failed");
                Some(e)
            }
        };

        if Instant::now() >= deadline {
            return Err(match last_error {
                Some(e) => JobError::Api(e),
                None => JobError::TimedOut { waited: timeout },
            });
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(JobError::Cancelled),
            _ = sleep(interval) => {}
        }
    }
}

async fn poll_status(
    api: &dyn ProvisioningApi,
    datastore_id: &str,
    job_type: JobType,
) -> Result<JobStatus, ApiError> {
    let jobs = api.list_jobs(datastore_id).await?;
    Ok(jobs
        .iter()
        .find(|j| j.job_type == job_type)
        .map(|j| j.status)
        .unwrap_or_default())
}
