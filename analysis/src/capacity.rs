//! Cell Capacity Model
//!
//! Derives the per-run constants the window aggregator divides by: PRB
//! bandwidth, slots per second, and the total resource-area the whole cell
//! can schedule in one second. The bandwidth-part size is either supplied by
//! the caller or inferred from the PRB ranges observed in the log.

use common::types::SubcarrierSpacing;
use tracing::debug;

/// Subcarriers in one physical resource block
pub const SUBCARRIERS_PER_PRB: u32 = 12;

/// OFDM symbols per slot under the normal cyclic prefix
pub const SYMBOLS_PER_SLOT: u32 = 14;

/// Default bandwidth-part size in PRB when nothing is supplied or observable
pub const DEFAULT_BWP_PRB: u32 = 52;

/// Standard bandwidth-part sizes in PRB, ascending
pub const STANDARD_BWP_SIZES: [u32; 8] = [25, 52, 79, 106, 133, 160, 216, 270];

/// Round a bandwidth-part size up to the nearest standard size.
///
/// Observed PRB ranges underestimate the configured size whenever the capture
/// never saturates the cell, so inferred values snap upward. Values beyond
/// the largest standard size pass through unmodified to allow non-standard
/// deployments.
pub fn snap_to_standard(prb: u32) -> u32 {
    for std_size in STANDARD_BWP_SIZES {
        if prb <= std_size {
            return std_size;
        }
    }
    prb
}

/// Running maxima of PRB indices observed while scanning the log.
///
/// Fed by the parser from PDSCH/PUSCH `prb=[start, end)` ranges and from
/// single PUCCH `prb1=`/`prb2=` indices.
#[derive(Debug, Clone, Copy, Default)]
pub struct BwpProbe {
    max_prb_end: Option<u32>,
    max_prb_index: Option<u32>,
}

impl BwpProbe {
    /// Record the exclusive end of an allocated PRB range
    pub fn observe_range_end(&mut self, prb_end: u32) {
        self.max_prb_end = Some(self.max_prb_end.map_or(prb_end, |m| m.max(prb_end)));
        if prb_end > 0 {
            self.observe_index(prb_end - 1);
        }
    }

    /// Record a single allocated PRB index
    pub fn observe_index(&mut self, prb_index: u32) {
        self.max_prb_index =
            Some(self.max_prb_index.map_or(prb_index, |m| m.max(prb_index)));
    }

    /// Infer the bandwidth-part size from the observed maxima, snapped to the
    /// standard ladder. Returns `None` when no allocation was ever observed.
    pub fn infer(&self) -> Option<u32> {
        let raw = match (self.max_prb_end, self.max_prb_index) {
            (Some(end), Some(idx)) => end.max(idx + 1),
            (Some(end), None) => end,
            (None, Some(idx)) => idx + 1,
            (None, None) => return None,
        };
        let snapped = snap_to_standard(raw);
        debug!(raw, snapped, "inferred bandwidth-part size from observed PRB ranges");
        Some(snapped)
    }
}

/// Cell-wide scheduling capacity constants, derived once per run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacityModel {
    /// Subcarrier spacing of the active bandwidth part
    pub scs: SubcarrierSpacing,
    /// Total PRB count of the scheduling region
    pub bwp_prb: u32,
}

impl CapacityModel {
    /// Create a capacity model for the given numerology and BWP size
    pub fn new(scs: SubcarrierSpacing, bwp_prb: u32) -> Self {
        Self { scs, bwp_prb }
    }

    /// Bandwidth of one PRB in MHz: 12 subcarriers x SCS
    pub fn prb_bandwidth_mhz(&self) -> f64 {
        (SUBCARRIERS_PER_PRB * self.scs.khz()) as f64 / 1000.0
    }

    /// Slots scheduled in one second
    pub fn slots_per_second(&self) -> u32 {
        self.scs.slots_per_second()
    }

    /// Symbol opportunities of a single PRB over one second.
    ///
    /// Denominator of the time-averaged concurrent PRB count.
    pub fn symbols_per_second(&self) -> u64 {
        self.slots_per_second() as u64 * SYMBOLS_PER_SLOT as u64
    }

    /// Total resource-area (PRB x symbol) available to the cell in one second
    pub fn capacity_per_second(&self) -> u64 {
        self.bwp_prb as u64 * self.symbols_per_second()
    }

    /// Total bandwidth of the configured BWP in MHz
    pub fn total_bandwidth_mhz(&self) -> f64 {
        self.bwp_prb as f64 * self.prb_bandwidth_mhz()
    }
}
