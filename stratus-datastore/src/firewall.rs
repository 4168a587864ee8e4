//! Firewall rule reconciliation.
//!
//! The control plane exposes only per-rule create and delete calls, so
//! converging on a desired rule list means diffing against what is
//! currently applied and issuing the difference. Deletes run before
//! creates so a replaced source is never active twice.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::api::ProvisioningApi;
use crate::error::{Error, Result};
use crate::types::FirewallRule;

/// Default cap on in-flight rule calls per batch.
pub const DEFAULT_RULE_CONCURRENCY: usize = 4;

/// Rule operations needed to make the current set match the desired one.
#[derive(Debug, Default, PartialEq)]
pub struct RuleDiff {
    pub create: Vec<FirewallRule>,
    pub delete: Vec<FirewallRule>,
}

impl RuleDiff {
    pub fn is_empty(&self) -> bool {
        self.create.is_empty() && self.delete.is_empty()
    }
}

/// Diff two rule lists by source CIDR.
///
/// The source is the natural key: a rule whose description changed but
/// whose source did not produces no operations, because the control plane
/// has no rule-update call. Duplicate sources in `desired` are created
/// once.
pub fn diff_rules(current: &[FirewallRule], desired: &[FirewallRule]) -> RuleDiff {
    let current_sources: HashSet<&str> = current.iter().map(|r| r.source.as_str()).collect();
    let desired_sources: HashSet<&str> = desired.iter().map(|r| r.source.as_str()).collect();

    let mut seen: HashSet<&str> = HashSet::new();
    let create = desired
        .iter()
        .filter(|r| !current_sources.contains(r.source.as_str()))
        .filter(|r| seen.insert(r.source.as_str()))
        .cloned()
        .collect();
    let delete = current
        .iter()
        .filter(|r| !desired_sources.contains(r.source.as_str()))
        .cloned()
        .collect();

    RuleDiff { create, delete }
}

/// True when both lists carry the same `(source, description)` pairs,
/// order ignored.
pub fn rules_equivalent(a: &[FirewallRule], b: &[FirewallRule]) -> bool {
    rule_keys(a) == rule_keys(b)
}

fn rule_keys<'a>(rules: &'a [FirewallRule]) -> BTreeSet<(&'a str, &'a str)> {
    rules
        .iter()
        .map(|r| (r.source.as_str(), r.description.as_str()))
        .collect()
}

#[derive(Clone, Copy)]
enum RuleOp {
    Create,
    Delete,
}

impl RuleOp {
    fn verb(self) -> &'static str {
        match self {
            RuleOp::Create => "creating",
            RuleOp::Delete => "deleting",
        }
    }
}

/// Reconciles a datastore's firewall toward a desired rule list.
pub struct FirewallReconciler {
    api: Arc<dyn ProvisioningApi>,
    concurrency: usize,
}

impl FirewallReconciler {
    pub fn new(api: Arc<dyn ProvisioningApi>) -> Self {
        Self {
            api,
            concurrency: DEFAULT_RULE_CONCURRENCY,
        }
    }

    /// Cap the number of in-flight rule calls per batch.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Make the remote rule set match `desired`.
    ///
    /// Reads the applied rules once, deletes obsolete ones, then creates
    /// missing ones. Each batch fans out up to the concurrency cap; the
    /// first failed rule aborts the rest of its batch and the error names
    /// that rule. An already-converged set issues no calls beyond the
    /// read.
    pub async fn reconcile(
        &self,
        cancel: &CancellationToken,
        datastore_id: &str,
        desired: &[FirewallRule],
    ) -> Result<()> {
        let current = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            res = self.api.list_firewall_rules(datastore_id) => res?,
        };

        let diff = diff_rules(&current, desired);
        if diff.is_empty() {
            debug!(datastore = datastore_id, "Firewall rules already converged");
            return Ok(());
        }
        info!(
            datastore = datastore_id,
            delete = diff.delete.len(),
            create = diff.create.len(),
            "Reconciling firewall rules"
        );

        self.run_batch(cancel, datastore_id, diff.delete, RuleOp::Delete)
            .await?;
        self.run_batch(cancel, datastore_id, diff.create, RuleOp::Create)
            .await
    }

    async fn run_batch(
        &self,
        cancel: &CancellationToken,
        datastore_id: &str,
        rules: Vec<FirewallRule>,
        op: RuleOp,
    ) -> Result<()> {
        if rules.is_empty() {
            return Ok(());
        }

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks: JoinSet<Result<()>> = JoinSet::new();

        for rule in rules {
            let api = Arc::clone(&self.api);
            let semaphore = Arc::clone(&semaphore);
            let cancel = cancel.clone();
            let datastore_id = datastore_id.to_string();

            tasks.spawn(async move {
                let _permit = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(Error::Cancelled),
                    permit = semaphore.acquire_owned() => permit.map_err(|_| Error::Cancelled)?,
                };

                let call = async {
                    match op {
                        RuleOp::Delete => api.delete_firewall_rule(&datastore_id, &rule).await,
                        RuleOp::Create => api.create_firewall_rule(&datastore_id, &rule).await,
                    }
                };
                let outcome = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(Error::Cancelled),
                    res = call => res,
                };

                outcome.map_err(|cause| Error::FirewallRule {
                    op: op.verb(),
                    rule_source: rule.source.clone(),
                    description: rule.description.clone(),
                    cause,
                })
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    // One rule failed; stop the rest of the batch.
                    tasks.abort_all();
                    return Err(e);
                }
                Err(join_err) if join_err.is_cancelled() => return Err(Error::Cancelled),
                Err(join_err) => panic!("firewall rule task panicked: {join_err}"),
            }
        }

        Ok(())
    }
}
