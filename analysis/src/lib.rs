//! Scheduler Log Analysis Library
//!
//! This crate reconstructs per-UE radio-resource metrics from free-text gNB
//! scheduler logs: grant parsing, identity resolution, capacity modelling,
//! 1-second window aggregation, and tabular/CSV reporting.

pub mod capacity;
pub mod export;
pub mod identity;
pub mod parser;
pub mod report;
pub mod spectral;
pub mod window;

use std::path::PathBuf;
use thiserror::Error;

/// Common errors for the analysis pipeline
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("failed to read log file '{path}': {source}")]
    LogRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read identity map '{path}': {source}")]
    IdentityMapRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid identity map: {0}")]
    InvalidIdentityMap(String),

    #[error("no matching scheduler records found")]
    NoRecords,

    #[error("CSV export failed: {0}")]
    CsvExport(#[from] csv::Error),

    #[error("report output failed: {0}")]
    ReportWrite(#[from] std::io::Error),
}
