//! Availability zone allocator.
//!
//! Spreads new hosts over availability zones so that, counting the hosts
//! already placed, no zone ends up further above the post-placement
//! average than it has to. Least-loaded zones fill up first; ties break
//! on the zone name so placement is deterministic.

use crate::types::ZoneLoad;

/// Pick availability zones for `need` new hosts.
///
/// Returns exactly `need` zone names (repeats allowed) drawn from `zones`,
/// or an empty vector when `need` is zero or no zones were offered.
/// Callers treat the empty-inventory case as an allocation failure.
pub fn spread(zones: &[ZoneLoad], need: usize) -> Vec<String> {
    if need == 0 || zones.is_empty() {
        return Vec::new();
    }

    let total: usize = zones.iter().map(|z| z.count).sum();
    // Per-zone fair share once the new hosts are placed, rounded up.
    let average = (need + total).div_ceil(zones.len());

    let mut ordered: Vec<&ZoneLoad> = zones.iter().collect();
    ordered.sort_by(|a, b| (a.count, a.zone.as_str()).cmp(&(b.count, b.zone.as_str())));

    let mut assigned = Vec::with_capacity(need);
    let mut remaining = need;
    for zone in ordered {
        if remaining == 0 {
            break;
        }
        // Zones at or over the average take no new hosts.
        if zone.count >= average {
            continue;
        }
        let take = (average - zone.count).min(remaining);
        for _ in 0..take {
            assigned.push(zone.zone.clone());
        }
        remaining -= take;
    }

    assigned
}
