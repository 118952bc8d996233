//! Log Record Parser
//!
//! Extracts structured grant records from free-text scheduler log lines.
//! A gNB log interleaves many unrelated event types, so lines that match no
//! known pattern are skipped silently. Each channel has a single tolerant
//! pattern with optional capture groups for the trailing fields that older
//! log revisions omit (`h_id=`, `k1=`, `mod=`).

use chrono::NaiveDateTime;
use common::types::{Direction, Rnti};
use regex::Regex;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, trace};

use crate::capacity::BwpProbe;
use crate::AnalysisError;

/// Timestamp prefix format used by the scheduler log
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

// Example: 2025-01-01T00:00:00.100000 [MAC] PDSCH: rnti=0x4601 h_id=0 k1=4 prb=[0, 42) symb=[1, 14) mod=QPSK rv=0 tbs=309
static PDSCH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^(?P<ts>\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}\.\d+).*?",
        r"PDSCH:\s+rnti=(?P<rnti>0x[0-9a-fA-F]+)\s+",
        r"(?:h_id=(?P<harq>\d+)\s+)?",
        r"(?:k1=\d+\s+)?",
        r"prb=\[(?P<prb_start>\d+),\s*(?P<prb_end>\d+)\)\s+",
        r"symb=\[(?P<symb_start>\d+),\s*(?P<symb_end>\d+)\)",
        r"(?:\s+mod=(?P<modulation>\w+))?",
    ))
    .expect("PDSCH pattern compiles")
});

// Example: 2025-01-01T00:00:00.100000 [MAC] PUSCH: rnti=0x4601 h_id=0 prb=[8, 11) symb=[0, 14) mod=QPSK rv=0 tbs=11
static PUSCH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^(?P<ts>\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}\.\d+).*?",
        r"PUSCH:\s+rnti=(?P<rnti>0x[0-9a-fA-F]+)\s+",
        r"(?:h_id=(?P<harq>\d+)\s+)?",
        r"prb=\[(?P<prb_start>\d+),\s*(?P<prb_end>\d+)\)\s+",
        r"symb=\[(?P<symb_start>\d+),\s*(?P<symb_end>\d+)\)",
        r"(?:\s+mod=(?P<modulation>\w+))?",
    ))
    .expect("PUSCH pattern compiles")
});

// Configured subcarrier spacing, e.g. "common_scs: 15"
static SCS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"common_scs:\s*(\d+)").expect("SCS pattern compiles"));

// PRB maxima feeding bandwidth-part inference: allocation ranges anywhere in
// a line, plus single PUCCH indices ("prb1=3 prb2=48")
static PRB_RANGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"prb=\[(\d+),\s*(\d+)\)").expect("PRB range pattern compiles"));
static PUCCH_PRB_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"prb(?:1|2)=(\d+)").expect("PUCCH PRB pattern compiles"));

/// One physical-layer transmission opportunity, immutable once parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantRecord {
    /// Wall-clock instant of the grant line; `None` when the timestamp
    /// failed to parse, which excludes the record from window aggregation
    pub timestamp: Option<NaiveDateTime>,
    /// Subscriber identifier the grant was addressed to
    pub rnti: Rnti,
    /// Channel kind the grant was carried on
    pub direction: Direction,
    /// First allocated PRB (inclusive)
    pub prb_start: u16,
    /// End of the allocated PRB range (exclusive)
    pub prb_end: u16,
    /// First allocated OFDM symbol within the slot (inclusive)
    pub symb_start: u8,
    /// End of the allocated symbol range (exclusive)
    pub symb_end: u8,
    /// Hybrid-ARQ process id, when the log revision carries it
    pub harq_id: Option<u8>,
    /// Lower-cased modulation label, when present
    pub modulation: Option<String>,
}

impl GrantRecord {
    /// Number of allocated PRBs
    pub fn prb_count(&self) -> u32 {
        (self.prb_end - self.prb_start) as u32
    }

    /// Number of allocated OFDM symbols
    pub fn symbol_count(&self) -> u32 {
        (self.symb_end - self.symb_start) as u32
    }

    /// Resource area in PRB x symbols, the fundamental unit of consumed
    /// capacity
    pub fn resource_area(&self) -> u64 {
        self.prb_count() as u64 * self.symbol_count() as u64
    }
}

/// Everything one pass over the log yields: grants grouped by identity and
/// direction, the configured subcarrier spacing if the log states it, and
/// the PRB maxima feeding bandwidth-part inference
#[derive(Debug, Default)]
pub struct ScannedLog {
    /// PDSCH grants per identity, sorted by timestamp
    pub downlink: HashMap<Rnti, Vec<GrantRecord>>,
    /// PUSCH grants per identity, sorted by timestamp
    pub uplink: HashMap<Rnti, Vec<GrantRecord>>,
    /// First `common_scs:` value seen in the log, in kHz
    pub scs_khz: Option<u32>,
    /// Observed PRB maxima for bandwidth-part inference
    pub bwp_probe: BwpProbe,
    /// Total number of grant records extracted
    pub grant_count: usize,
}

impl ScannedLog {
    /// Whether the scan produced no grant records at all
    pub fn is_empty(&self) -> bool {
        self.grant_count == 0
    }

    /// Grants for one channel kind
    pub fn channel(&self, direction: Direction) -> &HashMap<Rnti, Vec<GrantRecord>> {
        match direction {
            Direction::Downlink => &self.downlink,
            Direction::Uplink => &self.uplink,
        }
    }

    fn push(&mut self, record: GrantRecord) {
        let per_rnti = match record.direction {
            Direction::Downlink => &mut self.downlink,
            Direction::Uplink => &mut self.uplink,
        };
        per_rnti.entry(record.rnti).or_default().push(record);
        self.grant_count += 1;
    }

    fn sort_by_timestamp(&mut self) {
        for grants in self.downlink.values_mut().chain(self.uplink.values_mut()) {
            grants.sort_by_key(|g| g.timestamp.unwrap_or(NaiveDateTime::MAX));
        }
    }
}

/// Attempt to parse one log line as a grant record.
///
/// Returns `None` for lines that match no channel pattern, carry numeric
/// fields out of range, or describe an empty PRB or symbol range.
pub fn parse_grant_line(line: &str) -> Option<GrantRecord> {
    let (direction, caps) = if let Some(caps) = PDSCH_RE.captures(line) {
        (Direction::Downlink, caps)
    } else if let Some(caps) = PUSCH_RE.captures(line) {
        (Direction::Uplink, caps)
    } else {
        return None;
    };

    let rnti: Rnti = caps["rnti"].parse().ok()?;
    let prb_start: u16 = caps["prb_start"].parse().ok()?;
    let prb_end: u16 = caps["prb_end"].parse().ok()?;
    let symb_start: u8 = caps["symb_start"].parse().ok()?;
    let symb_end: u8 = caps["symb_end"].parse().ok()?;

    // A grant must allocate at least one PRB and one symbol
    if prb_end <= prb_start || symb_end <= symb_start {
        trace!(%rnti, "skipping grant line with empty PRB or symbol range");
        return None;
    }

    let timestamp = NaiveDateTime::parse_from_str(&caps["ts"], TIMESTAMP_FORMAT).ok();
    let harq_id = caps.name("harq").and_then(|m| m.as_str().parse().ok());
    let modulation = caps.name("modulation").map(|m| m.as_str().to_lowercase());

    Some(GrantRecord {
        timestamp,
        rnti,
        direction,
        prb_start,
        prb_end,
        symb_start,
        symb_end,
        harq_id,
        modulation,
    })
}

/// Scan a log file in a single sequential pass.
///
/// Grant extraction, the `common_scs:` scalar and the bandwidth-part probe
/// all feed off the same pass. Failure to open or read the file is fatal;
/// this is a one-shot offline tool, not a resilient ingester.
pub fn scan_log_file(path: &Path) -> Result<ScannedLog, AnalysisError> {
    let file = File::open(path).map_err(|source| AnalysisError::LogRead {
        path: path.to_path_buf(),
        source,
    })?;

    let mut scanned = ScannedLog::default();
    for line in BufReader::new(file).lines() {
        let line = line.map_err(|source| AnalysisError::LogRead {
            path: path.to_path_buf(),
            source,
        })?;
        scan_line(&mut scanned, &line);
    }

    scanned.sort_by_timestamp();
    debug!(
        grants = scanned.grant_count,
        scs_khz = ?scanned.scs_khz,
        "log scan complete"
    );
    Ok(scanned)
}

fn scan_line(scanned: &mut ScannedLog, line: &str) {
    if let Some(record) = parse_grant_line(line) {
        scanned.push(record);
    }

    if scanned.scs_khz.is_none() {
        if let Some(caps) = SCS_RE.captures(line) {
            scanned.scs_khz = caps[1].parse().ok();
        }
    }

    // Probe PRB maxima on every line, not just full grant matches: PUCCH
    // lines and partial formats still reveal the scheduling region.
    for caps in PRB_RANGE_RE.captures_iter(line) {
        if let Ok(end) = caps[2].parse::<u32>() {
            scanned.bwp_probe.observe_range_end(end);
        }
    }
    for caps in PUCCH_PRB_RE.captures_iter(line) {
        if let Ok(idx) = caps[1].parse::<u32>() {
            scanned.bwp_probe.observe_index(idx);
        }
    }
}
