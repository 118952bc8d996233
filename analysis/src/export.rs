//! CSV Export
//!
//! Flat tabular export of the per-window aggregates, one row per (UE,
//! window) with DL and UL columns side by side. Floating-point fields keep
//! full round-trip precision. The elapsed-seconds axis is controlled by an
//! explicit alignment strategy: per-UE origins for looking at one user in
//! isolation, a shared origin for comparing several users on one axis.

use chrono::NaiveDateTime;
use common::types::UeIndex;
use common::utils::time::elapsed_seconds;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tracing::info;

use crate::window::{UserWindows, WindowAggregate};
use crate::AnalysisError;

/// Time-axis alignment strategy for exported series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeAlignment {
    /// Elapsed seconds count from each UE's own earliest window
    #[default]
    PerUe,
    /// Elapsed seconds count from the earliest window across all UEs, so
    /// several series can be compared on one shared axis
    Global,
}

#[derive(Debug, Serialize)]
struct CsvRow {
    ue: u16,
    window_start: String,
    elapsed_s: f64,
    dl_grants: Option<usize>,
    dl_sum_area: Option<u64>,
    dl_avg_prb: Option<f64>,
    dl_utilization: Option<f64>,
    dl_bandwidth_mhz: Option<f64>,
    dl_share: Option<f64>,
    dl_throughput_mbps: Option<f64>,
    ul_grants: Option<usize>,
    ul_sum_area: Option<u64>,
    ul_avg_prb: Option<f64>,
    ul_utilization: Option<f64>,
    ul_bandwidth_mhz: Option<f64>,
    ul_share: Option<f64>,
    ul_throughput_mbps: Option<f64>,
}

/// Merge one UE's direction series into chronological rows
fn merged_rows(
    windows: &UserWindows,
) -> BTreeMap<NaiveDateTime, (Option<&WindowAggregate>, Option<&WindowAggregate>)> {
    let mut rows: BTreeMap<NaiveDateTime, (Option<&WindowAggregate>, Option<&WindowAggregate>)> =
        BTreeMap::new();
    for w in &windows.downlink {
        rows.entry(w.window_start).or_default().0 = Some(w);
    }
    for w in &windows.uplink {
        rows.entry(w.window_start).or_default().1 = Some(w);
    }
    rows
}

/// Earliest window start across all users, if any
fn global_origin(results: &BTreeMap<UeIndex, UserWindows>) -> Option<NaiveDateTime> {
    results
        .values()
        .flat_map(|w| w.downlink.iter().chain(w.uplink.iter()))
        .map(|w| w.window_start)
        .min()
}

/// Write the aggregates as CSV to any writer
pub fn export_csv<W: Write>(
    writer: W,
    results: &BTreeMap<UeIndex, UserWindows>,
    alignment: TimeAlignment,
) -> Result<(), AnalysisError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    let shared_origin = global_origin(results);

    for (ue, windows) in results {
        let rows = merged_rows(windows);
        let origin = match alignment {
            TimeAlignment::PerUe => rows.keys().next().copied(),
            TimeAlignment::Global => shared_origin,
        };
        let Some(origin) = origin else {
            continue;
        };

        for (window_start, (dl, ul)) in &rows {
            csv_writer.serialize(CsvRow {
                ue: ue.value(),
                window_start: window_start.format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
                elapsed_s: elapsed_seconds(*window_start, origin),
                dl_grants: dl.map(|w| w.grant_count),
                dl_sum_area: dl.map(|w| w.sum_resource_area),
                dl_avg_prb: dl.map(|w| w.average_occupied_prb),
                dl_utilization: dl.map(|w| w.utilization),
                dl_bandwidth_mhz: dl.map(|w| w.occupied_bandwidth_mhz),
                dl_share: dl.map(|w| w.share),
                dl_throughput_mbps: dl.map(|w| w.estimated_throughput_mbps),
                ul_grants: ul.map(|w| w.grant_count),
                ul_sum_area: ul.map(|w| w.sum_resource_area),
                ul_avg_prb: ul.map(|w| w.average_occupied_prb),
                ul_utilization: ul.map(|w| w.utilization),
                ul_bandwidth_mhz: ul.map(|w| w.occupied_bandwidth_mhz),
                ul_share: ul.map(|w| w.share),
                ul_throughput_mbps: ul.map(|w| w.estimated_throughput_mbps),
            })?;
        }
    }

    csv_writer.flush().map_err(AnalysisError::ReportWrite)?;
    Ok(())
}

/// Write the aggregates as CSV to a file
pub fn export_csv_file(
    path: &Path,
    results: &BTreeMap<UeIndex, UserWindows>,
    alignment: TimeAlignment,
) -> Result<(), AnalysisError> {
    let file = File::create(path).map_err(AnalysisError::ReportWrite)?;
    export_csv(file, results, alignment)?;
    info!(path = %path.display(), "window aggregates exported");
    Ok(())
}
