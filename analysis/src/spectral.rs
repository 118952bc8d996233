//! Spectral Efficiency Strategy
//!
//! Maps a modulation label to a coarse spectral-efficiency figure used by the
//! throughput estimate. This is deliberately not a real link-adaptation
//! table: the exact value depends on the MCS index and code rate, which the
//! scheduler log does not carry. The mapping is a trait so a corrected table
//! can be injected without touching the aggregator.

use std::collections::HashMap;

/// Spectral efficiency used when the modulation is unknown or absent,
/// in bits/s/Hz
pub const DEFAULT_EFFICIENCY: f64 = 2.0;

/// Strategy mapping a modulation label to spectral efficiency in bits/s/Hz
pub trait SpectralEfficiency {
    /// Efficiency for the given lower-cased modulation label, or the
    /// strategy's default when the label is absent or unrecognized
    fn efficiency(&self, modulation: Option<&str>) -> f64;
}

/// Coarse per-modulation efficiency table.
///
/// Values sit mid-range for each constellation rather than tracking any
/// particular MCS table row.
#[derive(Debug, Clone)]
pub struct ModulationTable {
    table: HashMap<String, f64>,
    default: f64,
}

impl ModulationTable {
    /// Create a table from explicit entries and a fallback value
    pub fn new(entries: &[(&str, f64)], default: f64) -> Self {
        let table = entries
            .iter()
            .map(|(label, eff)| (label.to_lowercase(), *eff))
            .collect();
        Self { table, default }
    }
}

impl Default for ModulationTable {
    fn default() -> Self {
        Self::new(
            &[
                ("qpsk", 1.5),
                ("qam16", 2.5),
                ("qam64", 4.5),
                ("qam256", 6.5),
            ],
            DEFAULT_EFFICIENCY,
        )
    }
}

impl SpectralEfficiency for ModulationTable {
    fn efficiency(&self, modulation: Option<&str>) -> f64 {
        match modulation {
            Some(label) => *self
                .table
                .get(&label.to_lowercase())
                .unwrap_or(&self.default),
            None => self.default,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table() {
        let table = ModulationTable::default();
        assert_eq!(table.efficiency(Some("qpsk")), 1.5);
        assert_eq!(table.efficiency(Some("QAM64")), 4.5);
        assert_eq!(table.efficiency(Some("qam256")), 6.5);
    }

    #[test]
    fn test_unknown_modulation_falls_back() {
        let table = ModulationTable::default();
        assert_eq!(table.efficiency(Some("pi2bpsk")), DEFAULT_EFFICIENCY);
        assert_eq!(table.efficiency(None), DEFAULT_EFFICIENCY);
    }

    #[test]
    fn test_custom_table() {
        let table = ModulationTable::new(&[("qpsk", 1.2)], 3.0);
        assert_eq!(table.efficiency(Some("qpsk")), 1.2);
        assert_eq!(table.efficiency(Some("qam64")), 3.0);
    }
}
