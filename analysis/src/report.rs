//! Reporter
//!
//! Renders per-UE summary statistics and the full chronological window table
//! to any writer. Directions with no data get an explicit notice instead of
//! an empty table.

use std::collections::BTreeMap;
use std::io::{self, Write};

use chrono::NaiveDateTime;
use common::types::{Direction, UeIndex};
use common::utils::time::format_min_sec;

use crate::capacity::CapacityModel;
use crate::window::{UserWindows, WindowAggregate};

const RULE_HEAVY: &str =
    "====================================================================================================";
const RULE_LIGHT: &str =
    "----------------------------------------------------------------------------------------------------";

/// min/max/mean over a non-empty sequence
struct Stats {
    min: f64,
    max: f64,
    mean: f64,
}

fn stats(values: impl Iterator<Item = f64>) -> Option<Stats> {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut sum = 0.0;
    let mut count = 0usize;
    for v in values {
        min = min.min(v);
        max = max.max(v);
        sum += v;
        count += 1;
    }
    if count == 0 {
        return None;
    }
    Some(Stats {
        min,
        max,
        mean: sum / count as f64,
    })
}

/// Print the per-UE, per-direction min/max/mean summary
pub fn print_summary<W: Write>(
    out: &mut W,
    results: &BTreeMap<UeIndex, UserWindows>,
    model: &CapacityModel,
) -> io::Result<()> {
    writeln!(out, "{RULE_HEAVY}")?;
    writeln!(out, "Per-UE resource usage summary")?;
    writeln!(
        out,
        "  SCS: {}, BWP: {} PRB ({:.3} MHz), cell capacity: {} PRB-symbols/s",
        model.scs,
        model.bwp_prb,
        model.total_bandwidth_mhz(),
        model.capacity_per_second()
    )?;
    writeln!(out, "{RULE_HEAVY}")?;

    for (ue, windows) in results {
        writeln!(out)?;
        writeln!(out, "[{ue}]")?;
        writeln!(out, "{RULE_LIGHT}")?;
        for direction in [Direction::Downlink, Direction::Uplink] {
            print_direction_summary(out, direction, windows.direction(direction))?;
        }
    }
    Ok(())
}

fn print_direction_summary(
    out: &mut impl Write,
    direction: Direction,
    windows: &[WindowAggregate],
) -> io::Result<()> {
    if windows.is_empty() {
        writeln!(out, "  {} ({}): no data", direction, direction.channel_name())?;
        return Ok(());
    }

    writeln!(out, "  {} ({}):", direction, direction.channel_name())?;

    if let Some(s) = stats(windows.iter().map(|w| w.sum_resource_area as f64)) {
        writeln!(
            out,
            "    resource area (PRB x symb): min {:.0}, max {:.0}, mean {:.1}",
            s.min, s.max, s.mean
        )?;
    }
    if let Some(s) = stats(windows.iter().map(|w| w.average_occupied_prb)) {
        writeln!(out, "    avg occupied PRB:           mean {:.2}", s.mean)?;
    }
    if let Some(s) = stats(windows.iter().map(|w| w.utilization)) {
        writeln!(
            out,
            "    utilization:                min {:.1}%, max {:.1}%, mean {:.1}%",
            s.min * 100.0,
            s.max * 100.0,
            s.mean * 100.0
        )?;
    }
    if let Some(s) = stats(windows.iter().map(|w| w.occupied_bandwidth_mhz)) {
        writeln!(
            out,
            "    occupied bandwidth:         min {:.3} MHz, max {:.3} MHz, mean {:.3} MHz",
            s.min, s.max, s.mean
        )?;
    }
    if let Some(s) = stats(windows.iter().map(|w| w.estimated_throughput_mbps)) {
        writeln!(
            out,
            "    est. throughput:            min {:.2} Mbps, max {:.2} Mbps, mean {:.2} Mbps",
            s.min, s.max, s.mean
        )?;
    }
    if let Some(s) = stats(windows.iter().map(|w| w.share)) {
        writeln!(
            out,
            "    share of cell usage:        min {:.1}%, max {:.1}%, mean {:.1}%",
            s.min * 100.0,
            s.max * 100.0,
            s.mean * 100.0
        )?;
    }
    writeln!(out, "    windows with data:          {}", windows.len())?;
    Ok(())
}

/// Print the chronological per-window detail table, merging the DL and UL
/// series of each UE on one row per window
pub fn print_detail<W: Write>(
    out: &mut W,
    results: &BTreeMap<UeIndex, UserWindows>,
    ue_filter: Option<UeIndex>,
) -> io::Result<()> {
    for (ue, windows) in results {
        if let Some(filter) = ue_filter {
            if *ue != filter {
                continue;
            }
        }
        print_user_detail(out, *ue, windows)?;
    }

    if let Some(filter) = ue_filter {
        if !results.contains_key(&filter) {
            writeln!(out, "\n{filter}: no windows to report")?;
        }
    }
    Ok(())
}

fn print_user_detail(
    out: &mut impl Write,
    ue: UeIndex,
    windows: &UserWindows,
) -> io::Result<()> {
    if windows.is_empty() {
        writeln!(out, "\n{ue}: no windows to report")?;
        return Ok(());
    }

    // One row per window key, DL and UL side by side
    let mut rows: BTreeMap<NaiveDateTime, (Option<&WindowAggregate>, Option<&WindowAggregate>)> =
        BTreeMap::new();
    for w in &windows.downlink {
        rows.entry(w.window_start).or_default().0 = Some(w);
    }
    for w in &windows.uplink {
        rows.entry(w.window_start).or_default().1 = Some(w);
    }

    let reference = rows
        .keys()
        .next()
        .copied()
        .unwrap_or(NaiveDateTime::default());

    writeln!(out, "\n{RULE_HEAVY}")?;
    writeln!(out, "{ue} detail ({} windows, chronological)", rows.len())?;
    writeln!(out, "reference time: {reference}")?;
    writeln!(out, "{RULE_HEAVY}")?;
    writeln!(
        out,
        "{:<10} {:>10} {:>10} {:>9} {:>9} {:>9} | {:>10} {:>10} {:>9} {:>9} {:>9}",
        "time",
        "DL area",
        "DL avgPRB",
        "DL util%",
        "DL MHz",
        "DL share",
        "UL area",
        "UL avgPRB",
        "UL util%",
        "UL MHz",
        "UL share"
    )?;
    writeln!(out, "{RULE_LIGHT}")?;

    for (window_start, (dl, ul)) in &rows {
        write!(out, "{:<10} ", format_min_sec(*window_start))?;
        write_direction_cells(out, *dl)?;
        write!(out, " | ")?;
        write_direction_cells(out, *ul)?;
        writeln!(out)?;
    }
    Ok(())
}

fn write_direction_cells(
    out: &mut impl Write,
    window: Option<&WindowAggregate>,
) -> io::Result<()> {
    match window {
        Some(w) => write!(
            out,
            "{:>10} {:>10.2} {:>9.1} {:>9.3} {:>9.1}",
            w.sum_resource_area,
            w.average_occupied_prb,
            w.utilization * 100.0,
            w.occupied_bandwidth_mhz,
            w.share * 100.0
        ),
        None => write!(out, "{:>10} {:>10} {:>9} {:>9} {:>9}", "-", "-", "-", "-", "-"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::types::SubcarrierSpacing;

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").unwrap()
    }

    fn window(start: &str, area: u64) -> WindowAggregate {
        WindowAggregate {
            window_start: ts(start),
            sum_resource_area: area,
            grant_count: 1,
            average_occupied_prb: area as f64 / 14_000.0,
            utilization: area as f64 / 728_000.0,
            occupied_bandwidth_mhz: 0.0018,
            spectral_efficiency: 2.0,
            estimated_throughput_mbps: 0.0036,
            share: 1.0,
        }
    }

    fn results_with_one_dl_window() -> BTreeMap<UeIndex, UserWindows> {
        let mut results = BTreeMap::new();
        results.insert(
            UeIndex(0),
            UserWindows {
                downlink: vec![window("2025-01-01T00:00:00", 140)],
                uplink: Vec::new(),
            },
        );
        results
    }

    fn render<F: FnOnce(&mut Vec<u8>)>(f: F) -> String {
        let mut buf = Vec::new();
        f(&mut buf);
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_summary_reports_missing_direction() {
        let results = results_with_one_dl_window();
        let model = CapacityModel::new(SubcarrierSpacing::Scs15, 52);
        let text = render(|buf| print_summary(buf, &results, &model).unwrap());

        assert!(text.contains("[UE0]"));
        assert!(text.contains("DL (PDSCH):"));
        assert!(text.contains("UL (PUSCH): no data"));
        assert!(text.contains("windows with data:          1"));
    }

    #[test]
    fn test_detail_merges_directions_per_row() {
        let mut results = results_with_one_dl_window();
        if let Some(w) = results.get_mut(&UeIndex(0)) {
            w.uplink.push(window("2025-01-01T00:00:00", 42));
            w.uplink.push(window("2025-01-01T00:00:07", 42));
        }
        let text = render(|buf| print_detail(buf, &results, None).unwrap());

        assert!(text.contains("UE0 detail (2 windows, chronological)"));
        assert!(text.contains("reference time: 2025-01-01 00:00:00"));
        // Second row has no DL half
        let rows: Vec<&str> = text
            .lines()
            .filter(|l| l.starts_with("00:00.00") || l.starts_with("00:07.00"))
            .collect();
        assert_eq!(rows.len(), 2);
        assert!(rows[1].trim_start().starts_with("00:07.00"));
        assert!(rows[1].contains('-'));
    }

    #[test]
    fn test_detail_filter_unknown_ue_prints_notice() {
        let results = results_with_one_dl_window();
        let text = render(|buf| print_detail(buf, &results, Some(UeIndex(7))).unwrap());
        assert!(text.contains("UE7: no windows to report"));
        assert!(!text.contains("UE0 detail"));
    }

    #[test]
    fn test_stats_helper() {
        let s = stats([1.0, 2.0, 3.0].into_iter()).unwrap();
        assert_eq!(s.min, 1.0);
        assert_eq!(s.max, 3.0);
        assert_eq!(s.mean, 2.0);
        assert!(stats(std::iter::empty()).is_none());
    }
}
