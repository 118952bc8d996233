//! Window Aggregator
//!
//! Buckets grant records into fixed 1-second windows per user and direction.
//! A window's members are exactly the grants whose timestamp truncates to
//! the same second, so a single forward sweep over the time-sorted list
//! produces every window in chronological order in linear time. Windows with
//! zero grants are never materialized; callers needing a dense series must
//! fill the gaps themselves.
//!
//! The cross-user `share` metric is only definable once every user's
//! per-window sum exists, so it is computed in a strictly sequential second
//! pass over the per-user results.

use chrono::NaiveDateTime;
use common::types::{Direction, UeIndex};
use common::utils::time::truncate_to_second;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use crate::capacity::CapacityModel;
use crate::identity::UserGrants;
use crate::parser::GrantRecord;
use crate::spectral::SpectralEfficiency;

/// MIMO layer count assumed by the throughput estimate; the log does not
/// carry the actual layer configuration
pub const MIMO_LAYERS: f64 = 1.0;

/// One (user, direction, 1-second window) summary
#[derive(Debug, Clone, PartialEq)]
pub struct WindowAggregate {
    /// Window key: timestamp truncated to whole seconds
    pub window_start: NaiveDateTime,
    /// Total resource-area (PRB x symbol) consumed within the window
    pub sum_resource_area: u64,
    /// Number of grants folded into the window
    pub grant_count: usize,
    /// Time-averaged concurrent PRB count, not a peak
    pub average_occupied_prb: f64,
    /// Fraction of total cell capacity consumed. Raw value: > 1.0 signals an
    /// over-subscribed or misconfigured capacity model and is never clamped
    pub utilization: f64,
    /// Time-averaged occupied bandwidth in MHz
    pub occupied_bandwidth_mhz: f64,
    /// Spectral efficiency of the window's dominant modulation, bits/s/Hz
    pub spectral_efficiency: f64,
    /// Throughput estimate: bandwidth x efficiency x MIMO layers
    pub estimated_throughput_mbps: f64,
    /// This user's fraction of all users' resource-area in the same window
    /// and direction; 0 when the cell saw no activity there
    pub share: f64,
}

/// Per-user window series, one list per direction, chronological
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserWindows {
    /// Downlink (PDSCH) windows
    pub downlink: Vec<WindowAggregate>,
    /// Uplink (PUSCH) windows
    pub uplink: Vec<WindowAggregate>,
}

impl UserWindows {
    /// Windows for one direction
    pub fn direction(&self, direction: Direction) -> &[WindowAggregate] {
        match direction {
            Direction::Downlink => &self.downlink,
            Direction::Uplink => &self.uplink,
        }
    }

    /// Whether neither direction produced any window
    pub fn is_empty(&self) -> bool {
        self.downlink.is_empty() && self.uplink.is_empty()
    }
}

/// Aggregate one user's grants for a single direction.
///
/// `grants` must be sorted by timestamp with untimed records last, which is
/// how the parser and the identity resolver hand them over. Untimed records
/// are excluded from every windowed computation. `share` is left at 0 for
/// the cross-user pass.
pub fn aggregate_direction(
    grants: &[GrantRecord],
    model: &CapacityModel,
    spectral: &dyn SpectralEfficiency,
) -> Vec<WindowAggregate> {
    let symbols_per_second = model.symbols_per_second();
    let capacity_per_second = model.capacity_per_second();

    let timed: Vec<&GrantRecord> = grants.iter().filter(|g| g.timestamp.is_some()).collect();
    let mut windows = Vec::new();

    // Two-pointer sweep: i marks the window opener, j walks its members
    let mut i = 0;
    while i < timed.len() {
        let Some(first_ts) = timed[i].timestamp else {
            i += 1;
            continue;
        };
        let window_start = truncate_to_second(first_ts);

        let mut sum_resource_area = 0u64;
        let mut grant_count = 0usize;
        // Label counts in encounter order so ties resolve to the first seen
        let mut modulation_counts: Vec<(&str, usize)> = Vec::new();

        let mut j = i;
        while j < timed.len() {
            match timed[j].timestamp {
                Some(ts) if truncate_to_second(ts) == window_start => {}
                _ => break,
            }
            sum_resource_area += timed[j].resource_area();
            grant_count += 1;
            if let Some(label) = timed[j].modulation.as_deref() {
                match modulation_counts.iter_mut().find(|(l, _)| *l == label) {
                    Some((_, count)) => *count += 1,
                    None => modulation_counts.push((label, 1)),
                }
            }
            j += 1;
        }

        let dominant_modulation = dominant(&modulation_counts);
        let spectral_efficiency = spectral.efficiency(dominant_modulation);

        let average_occupied_prb = if symbols_per_second > 0 {
            sum_resource_area as f64 / symbols_per_second as f64
        } else {
            0.0
        };
        let utilization = if capacity_per_second > 0 {
            sum_resource_area as f64 / capacity_per_second as f64
        } else {
            0.0
        };
        let occupied_bandwidth_mhz = average_occupied_prb * model.prb_bandwidth_mhz();
        let estimated_throughput_mbps =
            occupied_bandwidth_mhz * spectral_efficiency * MIMO_LAYERS;

        windows.push(WindowAggregate {
            window_start,
            sum_resource_area,
            grant_count,
            average_occupied_prb,
            utilization,
            occupied_bandwidth_mhz,
            spectral_efficiency,
            estimated_throughput_mbps,
            share: 0.0,
        });

        i = j;
    }

    windows
}

/// Most frequent modulation label; ties break toward the first encountered
fn dominant<'a>(counts: &[(&'a str, usize)]) -> Option<&'a str> {
    let mut best: Option<(&str, usize)> = None;
    for &(label, count) in counts {
        match best {
            Some((_, best_count)) if count <= best_count => {}
            _ => best = Some((label, count)),
        }
    }
    best.map(|(label, _)| label)
}

/// Aggregate every user's grants and fill in cross-user shares.
///
/// Pass 1 builds each user's per-direction window series. Pass 2 sums
/// resource-area per (window, direction) across all users. Pass 3 divides
/// each user's window sum by the cell-wide total; a zero total yields a
/// share of 0 rather than a division error.
pub fn aggregate(
    users: &BTreeMap<UeIndex, UserGrants>,
    model: &CapacityModel,
    spectral: &dyn SpectralEfficiency,
) -> BTreeMap<UeIndex, UserWindows> {
    let mut results: BTreeMap<UeIndex, UserWindows> = BTreeMap::new();
    for (ue, grants) in users {
        let windows = UserWindows {
            downlink: aggregate_direction(&grants.downlink, model, spectral),
            uplink: aggregate_direction(&grants.uplink, model, spectral),
        };
        results.insert(*ue, windows);
    }

    let mut cell_totals: HashMap<(NaiveDateTime, Direction), u64> = HashMap::new();
    for windows in results.values() {
        for direction in [Direction::Downlink, Direction::Uplink] {
            for window in windows.direction(direction) {
                *cell_totals
                    .entry((window.window_start, direction))
                    .or_insert(0) += window.sum_resource_area;
            }
        }
    }

    for windows in results.values_mut() {
        for (direction, list) in [
            (Direction::Downlink, &mut windows.downlink),
            (Direction::Uplink, &mut windows.uplink),
        ] {
            for window in list {
                let total = cell_totals
                    .get(&(window.window_start, direction))
                    .copied()
                    .unwrap_or(0);
                window.share = if total > 0 {
                    window.sum_resource_area as f64 / total as f64
                } else {
                    0.0
                };
            }
        }
    }

    debug!(users = results.len(), windows = cell_totals.len(), "window aggregation complete");
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::types::{Rnti, SubcarrierSpacing};
    use crate::spectral::ModulationTable;

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").unwrap()
    }

    fn grant(timestamp: Option<&str>, prb_end: u16, modulation: Option<&str>) -> GrantRecord {
        GrantRecord {
            timestamp: timestamp.map(ts),
            rnti: Rnti(0x4601),
            direction: Direction::Downlink,
            prb_start: 0,
            prb_end,
            symb_start: 0,
            symb_end: 14,
            harq_id: None,
            modulation: modulation.map(str::to_string),
        }
    }

    fn model() -> CapacityModel {
        CapacityModel::new(SubcarrierSpacing::Scs15, 52)
    }

    #[test]
    fn test_single_grant_scenario() {
        let grants = vec![grant(Some("2025-01-01T00:00:00.100000"), 10, Some("qpsk"))];
        let windows = aggregate_direction(&grants, &model(), &ModulationTable::default());

        assert_eq!(windows.len(), 1);
        let w = &windows[0];
        assert_eq!(w.window_start, ts("2025-01-01T00:00:00.000000"));
        assert_eq!(w.sum_resource_area, 140);
        assert_eq!(w.grant_count, 1);
        assert_eq!(w.average_occupied_prb, 140.0 / 14_000.0);
        assert_eq!(w.utilization, 140.0 / 728_000.0);
        assert_eq!(w.occupied_bandwidth_mhz, (140.0 / 14_000.0) * 0.180);
        assert_eq!(w.spectral_efficiency, 1.5);
        assert_eq!(
            w.estimated_throughput_mbps,
            w.occupied_bandwidth_mhz * 1.5
        );
    }

    #[test]
    fn test_grants_group_by_truncated_second() {
        let grants = vec![
            grant(Some("2025-01-01T00:00:00.100000"), 10, None),
            grant(Some("2025-01-01T00:00:00.900000"), 10, None),
            grant(Some("2025-01-01T00:00:01.050000"), 10, None),
            grant(Some("2025-01-01T00:00:05.000000"), 10, None),
        ];
        let windows = aggregate_direction(&grants, &model(), &ModulationTable::default());

        // Sparse: three windows, not six
        assert_eq!(windows.len(), 3);
        assert_eq!(windows[0].sum_resource_area, 280);
        assert_eq!(windows[0].grant_count, 2);
        assert_eq!(windows[1].window_start, ts("2025-01-01T00:00:01.000000"));
        assert_eq!(windows[1].sum_resource_area, 140);
        assert_eq!(windows[2].window_start, ts("2025-01-01T00:00:05.000000"));
    }

    #[test]
    fn test_untimed_grants_excluded() {
        let grants = vec![
            grant(Some("2025-01-01T00:00:00.100000"), 10, None),
            grant(None, 10, None),
        ];
        let windows = aggregate_direction(&grants, &model(), &ModulationTable::default());
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].grant_count, 1);
        assert_eq!(windows[0].sum_resource_area, 140);
    }

    #[test]
    fn test_dominant_modulation_ties_break_by_encounter_order() {
        let grants = vec![
            grant(Some("2025-01-01T00:00:00.100000"), 10, Some("qam64")),
            grant(Some("2025-01-01T00:00:00.200000"), 10, Some("qpsk")),
            grant(Some("2025-01-01T00:00:00.300000"), 10, Some("qpsk")),
            grant(Some("2025-01-01T00:00:00.400000"), 10, Some("qam64")),
        ];
        let windows = aggregate_direction(&grants, &model(), &ModulationTable::default());
        // qam64 and qpsk tie at 2; qam64 was seen first
        assert_eq!(windows[0].spectral_efficiency, 4.5);
    }

    #[test]
    fn test_missing_modulation_uses_default_efficiency() {
        let grants = vec![grant(Some("2025-01-01T00:00:00.100000"), 10, None)];
        let windows = aggregate_direction(&grants, &model(), &ModulationTable::default());
        assert_eq!(windows[0].spectral_efficiency, 2.0);
        assert!(windows[0].estimated_throughput_mbps > 0.0);
    }

    #[test]
    fn test_utilization_above_one_is_not_clamped() {
        // 10 grants x 200 PRB x 14 symbols = 28000 against a 1-PRB BWP
        // capacity of 14000 per second
        let tight = CapacityModel::new(SubcarrierSpacing::Scs15, 1);
        let grants: Vec<_> = (0..10)
            .map(|i| {
                let stamp = format!("2025-01-01T00:00:00.{:06}", i * 1000);
                grant(Some(stamp.as_str()), 200, None)
            })
            .collect();
        let windows = aggregate_direction(&grants, &tight, &ModulationTable::default());
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].utilization, 2.0);
    }

    #[test]
    fn test_aggregation_is_idempotent() {
        let mut users: BTreeMap<UeIndex, UserGrants> = BTreeMap::new();
        users.insert(
            UeIndex(0),
            UserGrants {
                downlink: vec![
                    grant(Some("2025-01-01T00:00:00.100000"), 10, Some("qpsk")),
                    grant(Some("2025-01-01T00:00:00.500000"), 20, Some("qam16")),
                    grant(Some("2025-01-01T00:00:02.000000"), 5, None),
                ],
                uplink: vec![grant(Some("2025-01-01T00:00:01.000000"), 8, None)],
            },
        );

        let table = ModulationTable::default();
        let first = aggregate(&users, &model(), &table);
        let second = aggregate(&users, &model(), &table);
        assert_eq!(first, second);
    }

    #[test]
    fn test_equal_areas_split_share_evenly() {
        let mut users: BTreeMap<UeIndex, UserGrants> = BTreeMap::new();
        for idx in 0..2u16 {
            users.insert(
                UeIndex(idx),
                UserGrants {
                    downlink: vec![grant(Some("2025-01-01T00:00:00.100000"), 10, None)],
                    uplink: Vec::new(),
                },
            );
        }

        let results = aggregate(&users, &model(), &ModulationTable::default());
        assert_eq!(results[&UeIndex(0)].downlink[0].share, 0.5);
        assert_eq!(results[&UeIndex(1)].downlink[0].share, 0.5);
    }

    #[test]
    fn test_share_sums_to_one_per_window_and_direction() {
        let mut users: BTreeMap<UeIndex, UserGrants> = BTreeMap::new();
        users.insert(
            UeIndex(0),
            UserGrants {
                downlink: vec![grant(Some("2025-01-01T00:00:00.100000"), 30, None)],
                uplink: vec![grant(Some("2025-01-01T00:00:00.300000"), 4, None)],
            },
        );
        users.insert(
            UeIndex(1),
            UserGrants {
                downlink: vec![
                    grant(Some("2025-01-01T00:00:00.200000"), 10, None),
                    grant(Some("2025-01-01T00:00:00.700000"), 12, None),
                ],
                uplink: Vec::new(),
            },
        );

        let results = aggregate(&users, &model(), &ModulationTable::default());
        let dl_sum: f64 = results
            .values()
            .flat_map(|w| w.downlink.iter())
            .map(|w| w.share)
            .sum();
        assert!((dl_sum - 1.0).abs() < 1e-12);

        // UE0 is alone in uplink: its share is exactly 1
        assert_eq!(results[&UeIndex(0)].uplink[0].share, 1.0);
    }

    #[test]
    fn test_share_isolated_per_window() {
        let mut users: BTreeMap<UeIndex, UserGrants> = BTreeMap::new();
        users.insert(
            UeIndex(0),
            UserGrants {
                downlink: vec![grant(Some("2025-01-01T00:00:00.100000"), 10, None)],
                uplink: Vec::new(),
            },
        );
        users.insert(
            UeIndex(1),
            UserGrants {
                downlink: vec![grant(Some("2025-01-01T00:00:03.100000"), 10, None)],
                uplink: Vec::new(),
            },
        );

        let results = aggregate(&users, &model(), &ModulationTable::default());
        // Different windows: each user owns its own second entirely
        assert_eq!(results[&UeIndex(0)].downlink[0].share, 1.0);
        assert_eq!(results[&UeIndex(1)].downlink[0].share, 1.0);
    }
}
