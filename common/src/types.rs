//! Common Types for Scheduler Log Analysis
//!
//! Defines fundamental types shared by the parser, aggregator and reporters.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Radio Network Temporary Identifier (RNTI)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Rnti(pub u16);

/// Error returned when an RNTI literal cannot be parsed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid RNTI literal: {0:?}")]
pub struct InvalidRnti(pub String);

impl Rnti {
    /// Create a new RNTI
    pub fn new(value: u16) -> Self {
        Self(value)
    }

    /// Get the RNTI value
    pub fn value(&self) -> u16 {
        self.0
    }
}

impl FromStr for Rnti {
    type Err = InvalidRnti;

    /// Parse a hexadecimal RNTI literal, case-insensitive, with or without
    /// a leading `0x`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        u16::from_str_radix(digits, 16)
            .map(Rnti)
            .map_err(|_| InvalidRnti(s.to_string()))
    }
}

impl fmt::Display for Rnti {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04x}", self.0)
    }
}

/// Logical UE index assigned by the identity map
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct UeIndex(pub u16);

impl UeIndex {
    /// Get the index value
    pub fn value(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for UeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UE{}", self.0)
    }
}

/// Grant direction, i.e. which physical shared channel carried it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Downlink (PDSCH)
    Downlink,
    /// Uplink (PUSCH)
    Uplink,
}

impl Direction {
    /// Short label used in report tables
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Downlink => "DL",
            Direction::Uplink => "UL",
        }
    }

    /// Name of the physical channel carrying grants in this direction
    pub fn channel_name(&self) -> &'static str {
        match self {
            Direction::Downlink => "PDSCH",
            Direction::Uplink => "PUSCH",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Subcarrier spacing values in kHz
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubcarrierSpacing {
    /// 15 kHz
    Scs15,
    /// 30 kHz
    Scs30,
    /// 60 kHz
    Scs60,
    /// 120 kHz
    Scs120,
    /// 240 kHz
    Scs240,
}

impl SubcarrierSpacing {
    /// Create from a kHz value, if it is a valid NR numerology
    pub fn from_khz(khz: u32) -> Option<Self> {
        match khz {
            15 => Some(SubcarrierSpacing::Scs15),
            30 => Some(SubcarrierSpacing::Scs30),
            60 => Some(SubcarrierSpacing::Scs60),
            120 => Some(SubcarrierSpacing::Scs120),
            240 => Some(SubcarrierSpacing::Scs240),
            _ => None,
        }
    }

    /// Spacing in kHz
    pub fn khz(&self) -> u32 {
        match self {
            SubcarrierSpacing::Scs15 => 15,
            SubcarrierSpacing::Scs30 => 30,
            SubcarrierSpacing::Scs60 => 60,
            SubcarrierSpacing::Scs120 => 120,
            SubcarrierSpacing::Scs240 => 240,
        }
    }

    /// Number of slots in one second for this numerology
    pub fn slots_per_second(&self) -> u32 {
        1000 * (self.khz() / 15)
    }
}

impl fmt::Display for SubcarrierSpacing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} kHz", self.khz())
    }
}
