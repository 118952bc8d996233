//! RANscope Main Application
//!
//! Offline analyzer deriving per-UE resource usage (PRB occupancy,
//! utilization, share, throughput estimate) from a captured gNB scheduler
//! log. One-shot batch tool: reads the whole log, prints summary and detail
//! tables to stdout, optionally exports CSV, then exits.

use anyhow::Result;
use clap::error::{ContextKind, ErrorKind};
use clap::{Parser, ValueEnum};
use std::io;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use analysis::capacity::{CapacityModel, DEFAULT_BWP_PRB};
use analysis::export::{export_csv_file, TimeAlignment};
use analysis::identity::{group_by_user, IdentityMap};
use analysis::parser::scan_log_file;
use analysis::report::{print_detail, print_summary};
use analysis::spectral::ModulationTable;
use analysis::window::aggregate;
use analysis::AnalysisError;
use common::types::{SubcarrierSpacing, UeIndex};

/// RANscope: per-UE radio-resource metrics from gNB scheduler logs
#[derive(Parser, Debug)]
#[command(name = "ranscope", version, about, long_about = None)]
struct Args {
    /// Scheduler log file to analyze
    #[arg(default_value = "gnb.log")]
    log_file: PathBuf,

    /// Restrict the detail table to one UE index
    #[arg(long)]
    ue: Option<u16>,

    /// Channel of interest (informational; both directions are always
    /// aggregated and reported)
    #[arg(long, value_enum)]
    channel: Option<Channel>,

    /// Subcarrier spacing override in kHz (15, 30, 60, 120, 240)
    #[arg(long)]
    scs: Option<u32>,

    /// Bandwidth-part size override in PRB, skipping auto-inference
    #[arg(long)]
    bwp_prb: Option<u32>,

    /// Export the per-window aggregates to this CSV file
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Time-axis alignment for CSV export
    #[arg(long, value_enum, default_value_t = Align::PerUe)]
    align: Align,

    /// TOML file mapping RNTIs to UE indices
    #[arg(long)]
    ue_map: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

/// Physical shared channel selector
#[derive(ValueEnum, Debug, Clone, Copy)]
enum Channel {
    Pdsch,
    Pusch,
}

/// CSV time-axis alignment
#[derive(ValueEnum, Debug, Clone, Copy)]
enum Align {
    /// Each UE's elapsed seconds start at its own first window
    PerUe,
    /// All UEs share the earliest window as origin
    Global,
}

impl From<Align> for TimeAlignment {
    fn from(align: Align) -> Self {
        match align {
            Align::PerUe => TimeAlignment::PerUe,
            Align::Global => TimeAlignment::Global,
        }
    }
}

/// Parse the command line, dropping unknown flags instead of aborting.
///
/// Captures routinely travel with wrapper scripts that pass extra options;
/// those are warned about (once logging is up) and ignored. Only the flag
/// token itself is dropped, matching the historical behavior.
fn parse_args_tolerant() -> (Args, Vec<String>) {
    let mut argv: Vec<String> = std::env::args().collect();
    let mut ignored = Vec::new();
    loop {
        match Args::try_parse_from(&argv) {
            Ok(args) => return (args, ignored),
            Err(err) if err.kind() == ErrorKind::UnknownArgument => {
                let Some(bad) = err
                    .get(ContextKind::InvalidArg)
                    .map(|value| value.to_string())
                else {
                    err.exit();
                };
                let before = argv.len();
                argv.retain(|arg| *arg != bad && !arg.starts_with(&format!("{bad}=")));
                if argv.len() == before {
                    // Could not identify the offending token; give up
                    err.exit();
                }
                ignored.push(bad);
            }
            Err(err) => err.exit(),
        }
    }
}

/// Pick the subcarrier spacing: override, then log, then the 15 kHz default
fn select_scs(override_khz: Option<u32>, log_khz: Option<u32>) -> Result<SubcarrierSpacing> {
    if let Some(khz) = override_khz {
        return SubcarrierSpacing::from_khz(khz)
            .ok_or_else(|| anyhow::anyhow!("invalid subcarrier spacing: {} kHz", khz));
    }
    match log_khz {
        Some(khz) => match SubcarrierSpacing::from_khz(khz) {
            Some(scs) => Ok(scs),
            None => {
                warn!("log reports unsupported SCS {} kHz; assuming 15 kHz", khz);
                Ok(SubcarrierSpacing::Scs15)
            }
        },
        None => {
            warn!("no common_scs found in log; assuming 15 kHz");
            Ok(SubcarrierSpacing::Scs15)
        }
    }
}

fn main() -> Result<()> {
    let (args, ignored_flags) = parse_args_tolerant();

    // Initialize logging on stderr; stdout belongs to the report tables
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    for flag in &ignored_flags {
        warn!("ignoring unknown option '{}'", flag);
    }

    info!("analyzing scheduler log: {}", args.log_file.display());
    let scanned = scan_log_file(&args.log_file)?;
    if scanned.is_empty() {
        return Err(AnalysisError::NoRecords.into());
    }
    info!("extracted {} grant records", scanned.grant_count);

    let scs = select_scs(args.scs, scanned.scs_khz)?;
    let bwp_prb = match args.bwp_prb {
        Some(prb) => prb,
        None => match scanned.bwp_probe.infer() {
            Some(prb) => {
                info!("inferred bandwidth-part size from observed PRB ranges: {} PRB", prb);
                prb
            }
            None => {
                warn!(
                    "could not infer bandwidth-part size; assuming {} PRB (use --bwp-prb to override)",
                    DEFAULT_BWP_PRB
                );
                DEFAULT_BWP_PRB
            }
        },
    };

    let model = CapacityModel::new(scs, bwp_prb);
    info!("cell configuration:");
    info!("  SCS: {}", model.scs);
    info!("  PRB bandwidth: {:.3} MHz", model.prb_bandwidth_mhz());
    info!("  BWP: {} PRB ({:.3} MHz total)", model.bwp_prb, model.total_bandwidth_mhz());
    info!("  capacity: {} PRB-symbols/s", model.capacity_per_second());

    if let Some(channel) = args.channel {
        info!("channel filter {:?} noted; reports cover both directions", channel);
    }

    let identity_map = match &args.ue_map {
        Some(path) => IdentityMap::from_toml_file(path)?,
        None => IdentityMap::default(),
    };
    for (rnti, ue) in identity_map.sorted_entries() {
        info!("identity map: {} -> {}", rnti, ue);
    }

    let users = group_by_user(&scanned, &identity_map);
    if users.is_empty() {
        warn!("grant records found, but none map to a known UE");
    }
    let results = aggregate(&users, &model, &ModulationTable::default());

    let stdout = io::stdout();
    let mut out = stdout.lock();
    print_summary(&mut out, &results, &model)?;
    print_detail(&mut out, &results, args.ue.map(UeIndex))?;

    if let Some(path) = &args.csv {
        export_csv_file(path, &results, args.align.into())?;
    }

    Ok(())
}
