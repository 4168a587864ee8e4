//! Update planning.
//!
//! Turns a desired [`Datastore`] and the last observed one into the
//! minimal sequence of control plane requests: one optional patch of
//! simple fields and one optional resize. The two are never combined into
//! a single request. Planning is pure; execution lives in
//! [`crate::service`].

use std::collections::HashMap;

use tracing::debug;

use crate::azalloc;
use crate::error::{Error, Result};
use crate::types::{
    Datastore, DatastorePatch, Host, HostSpec, JobType, Notifications, ResizeRequest, ZoneLoad,
};

/// One resize operation, in either direction.
#[derive(Debug, Clone, PartialEq)]
pub enum ResizePlan {
    /// Hosts to add, one spec each.
    Add(Vec<HostSpec>),
    /// Ids of hosts to remove, oldest first.
    Remove(Vec<String>),
}

impl ResizePlan {
    /// Job the control plane spawns for this operation.
    pub fn job_type(&self) -> JobType {
        match self {
            ResizePlan::Add(_) => JobType::AddNode,
            ResizePlan::Remove(_) => JobType::RemoveNode,
        }
    }

    pub fn into_request(self) -> ResizeRequest {
        match self {
            ResizePlan::Add(add) => ResizeRequest {
                add,
                ..Default::default()
            },
            ResizePlan::Remove(remove) => ResizeRequest {
                remove,
                ..Default::default()
            },
        }
    }
}

/// Everything one update invocation will send.
#[derive(Debug, Default)]
pub struct UpdatePlan {
    pub patch: Option<DatastorePatch>,
    pub resize: Option<ResizePlan>,
}

impl UpdatePlan {
    /// False when the update is a no-op and nothing should be sent.
    pub fn changed(&self) -> bool {
        self.patch.is_some() || self.resize.is_some()
    }
}

/// Plan an update from `old` (last observed state) to `next` (desired).
///
/// Fails with [`Error::UpdateNotSupported`] before anything else when
/// fields changed that the control plane cannot apply in place. `inventory`
/// is the zone catalog for the datastore's region; it is only consulted
/// when [`resize_needs_inventory`] says so, and may be empty otherwise.
pub fn plan_update(old: &Datastore, next: &Datastore, inventory: &[String]) -> Result<UpdatePlan> {
    let unsupported = unsupported_changes(old, next);
    if !unsupported.is_empty() {
        return Err(Error::UpdateNotSupported {
            fields: unsupported,
        });
    }

    Ok(UpdatePlan {
        patch: settings_patch(old, next),
        resize: plan_resize(old, next, inventory)?,
    })
}

/// Changed fields the control plane cannot apply in place. All offenders
/// are collected so the caller learns about every one at once.
pub fn unsupported_changes(old: &Datastore, next: &Datastore) -> Vec<&'static str> {
    let mut fields = Vec::new();
    if old.cloud_provider != next.cloud_provider {
        fields.push("cloud_provider");
    }
    if old.cloud_region != next.cloud_region {
        fields.push("cloud_region");
    }
    if old.db_vendor != next.db_vendor {
        fields.push("db_vendor");
    }
    if old.db_version != next.db_version {
        fields.push("db_version");
    }
    if old.kind != next.kind {
        fields.push("type");
    }
    if old.instance_size != next.instance_size {
        fields.push("instance_size");
    }
    if old.volume_type != next.volume_type {
        fields.push("volume_type");
    }
    if old.volume_iops != next.volume_iops {
        fields.push("volume_iops");
    }
    if old.vpc_uuid != next.vpc_uuid {
        fields.push("vpc_uuid");
    }
    if old.parameter_group_id != next.parameter_group_id {
        fields.push("parameter_group_id");
    }
    fields
}

/// Patch of simple fields, or `None` when none of them changed.
///
/// Notifications compare by flag plus unordered recipient set. A changed
/// maintenance window always goes out as the full window, never as a
/// partial edit; dropping the window entirely is not expressible and is
/// treated as no change.
pub fn settings_patch(old: &Datastore, next: &Datastore) -> Option<DatastorePatch> {
    let mut patch = DatastorePatch::default();

    if old.name != next.name {
        patch.name = Some(next.name.clone());
    }
    if old.volume_size != next.volume_size {
        patch.volume_size = Some(next.volume_size);
    }
    if !same_notifications(&old.notifications, &next.notifications) {
        patch.notifications = Some(next.notifications.clone());
    }
    if let Some(window) = &next.maintenance_settings
        && old.maintenance_settings.as_ref() != Some(window)
    {
        patch.maintenance_settings = Some(window.clone());
    }

    if patch.is_empty() { None } else { Some(patch) }
}

/// True when planning this resize requires the zone catalog.
///
/// That is the case only for a public datastore scaling up with fewer new
/// availability zones supplied than hosts being added.
pub fn resize_needs_inventory(old: &Datastore, next: &Datastore) -> bool {
    if next.size <= old.size || !old.is_public() {
        return false;
    }
    let need = (next.size - old.size) as usize;
    supplied_new_zones(old, next).len() < need
}

/// Plan the host-count change between `old` and `next`, if any.
///
/// Scale-down removes the oldest non-primary hosts; a primary is never a
/// candidate, whatever its age. Scale-up pairs one availability zone per
/// new host with the newest existing host's instance type; for a public
/// datastore, zones missing from the desired list are allocated from the
/// catalog inventory weighted by current per-zone host counts. A desired
/// zone list that still does not line up with the node delta fails the
/// plan. A changed zone list with an unchanged size plans nothing, since
/// no control plane operation moves hosts between zones.
pub fn plan_resize(
    old: &Datastore,
    next: &Datastore,
    inventory: &[String],
) -> Result<Option<ResizePlan>> {
    if next.size == old.size {
        return Ok(None);
    }

    if next.size < old.size {
        let needed = (old.size - next.size) as usize;
        let mut removable: Vec<&Host> = old.hosts.iter().filter(|h| !h.is_primary()).collect();
        if removable.len() < needed {
            return Err(Error::NotEnoughRemovableHosts {
                needed,
                available: removable.len(),
            });
        }
        removable.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        let remove: Vec<String> = removable
            .into_iter()
            .take(needed)
            .map(|h| h.id.clone())
            .collect();
        debug!(datastore = %old.id, hosts = ?remove, "Planned scale-down");
        return Ok(Some(ResizePlan::Remove(remove)));
    }

    let need = (next.size - old.size) as usize;
    let mut new_zones = supplied_new_zones(old, next);

    if new_zones.len() < need && old.is_public() {
        if inventory.is_empty() {
            return Err(Error::NoZonesAvailable {
                provider: old.cloud_provider.clone(),
                region: old.cloud_region.clone(),
            });
        }
        let loads = zone_usage(&old.hosts, inventory);
        new_zones.extend(azalloc::spread(&loads, need - new_zones.len()));
    }

    if new_zones.len() != need {
        return Err(Error::AzCountMismatch {
            zones: new_zones.len(),
            nodes: need,
        });
    }

    // New hosts follow the newest existing host; a datastore observed
    // without hosts falls back to its own instance size.
    let instance_type = old
        .hosts
        .iter()
        .max_by_key(|h| h.created_at)
        .map(|h| h.instance_type.clone())
        .unwrap_or_else(|| old.instance_size.clone());

    let add: Vec<HostSpec> = new_zones
        .into_iter()
        .map(|availability_zone| HostSpec {
            availability_zone,
            instance_type: instance_type.clone(),
        })
        .collect();
    debug!(datastore = %old.id, specs = add.len(), "Planned scale-up");
    Ok(Some(ResizePlan::Add(add)))
}

fn same_notifications(a: &Notifications, b: &Notifications) -> bool {
    if a.enabled != b.enabled {
        return false;
    }
    let mut x: Vec<&str> = a.emails.iter().map(String::as_str).collect();
    let mut y: Vec<&str> = b.emails.iter().map(String::as_str).collect();
    x.sort_unstable();
    y.sort_unstable();
    x == y
}

/// Zones in the desired list not covered by an existing host, as a
/// multiset difference.
fn supplied_new_zones(old: &Datastore, next: &Datastore) -> Vec<String> {
    let mut used: HashMap<&str, usize> = HashMap::new();
    for host in &old.hosts {
        *used.entry(host.availability_zone.as_str()).or_default() += 1;
    }

    let mut extra = Vec::new();
    for zone in &next.availability_zones {
        match used.get_mut(zone.as_str()) {
            Some(n) if *n > 0 => *n -= 1,
            _ => extra.push(zone.clone()),
        }
    }
    extra
}

/// Per-zone host counts over the full catalog inventory.
fn zone_usage(hosts: &[Host], inventory: &[String]) -> Vec<ZoneLoad> {
    inventory
        .iter()
        .map(|zone| {
            let count = hosts
                .iter()
                .filter(|h| &h.availability_zone == zone)
                .count();
            ZoneLoad::new(zone.clone(), count)
        })
        .collect()
}
