//! Common Types and Utilities Library
//!
//! This crate provides shared types and helpers used across the RANscope
//! log-analysis toolset.

pub mod types;
pub mod utils;

// Re-export commonly used items
pub use types::*;
pub use utils::*;
