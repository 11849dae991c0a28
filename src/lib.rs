//! # Cloudlight Event Log Library
//!
//! This library provides the persistent event log used by the cloudlight
//! controller: a small device that switches a light on and off depending on
//! cloud coverage. Every sample, light toggle, state-machine transition and
//! error is recorded into a fixed-capacity ring that lives in a reserved
//! region of non-volatile storage (EEPROM on the device, a file on a host).
//!
//! ## Design Philosophy
//!
//! ### Bounded Memory
//! - **Fixed-size records**: Every entry is exactly 8 bytes on the medium
//! - **Fixed capacity**: The ring never grows; once full, the oldest entry is
//!   overwritten one-for-one
//! - **No heap per entry**: Entries are `Copy` and decoded on demand
//!
//! ### Bounded Wear
//! Durable flushes are the expensive, wear-inducing operation. Ordinary
//! appends are staged in a volatile working copy and only committed every
//! few writes; resets are committed immediately.
//!
//! ### Data Flow
//! 1. **Produce**: sampler / relay / state machine call `log_*` on the manager
//! 2. **Stamp & store**: the manager stamps the current epoch second and
//!    writes the encoded record into the next ring slot
//! 3. **Consume**: the dashboard asks for one kind of entry, oldest first,
//!    rendered as a JSON array of `{time, value}` points
//!
//! ## Core Types
//!
//! - [`LogEntry`]: A single 8-byte event record
//! - [`EntryKind`]: Which producer recorded the event
//! - [`SystemState`]: The controller state codes carried by
//!   [`EntryKind::SystemState`] entries

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// Module declarations
pub mod clock;
pub mod codec;
pub mod config;
pub mod export;
pub mod log_manager;
pub mod store;

#[cfg(test)]
mod tests;

pub use clock::{ManualClock, SystemClock, TimeSource};
pub use log_manager::{LogError, LogManager, LogOptions, RingMetadata};
pub use store::{DurableStore, FileStore, MemoryStore, StoreError};

/// Kind tag of a log entry, stored as a single byte on the medium.
///
/// The codec never rejects a tag byte: anything outside the four known
/// kinds decodes to [`EntryKind::Unknown`] so a stray bit pattern can be
/// inspected instead of silently dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryKind {
    /// Cloud coverage sample; percentage ×10 lives in `extra`
    CloudCoverage,
    /// Light relay toggled; `value` is 1 for on, 0 for off
    LightState,
    /// Controller state transition; `value` is a [`SystemState`] code
    SystemState,
    /// Error report; `value` is the error code
    Error,
    /// Unrecognised tag byte read back from storage
    Unknown(u8),
}

impl EntryKind {
    /// Tag byte written to storage.
    pub const fn to_byte(self) -> u8 {
        match self {
            Self::CloudCoverage => 0,
            Self::LightState => 1,
            Self::SystemState => 2,
            Self::Error => 3,
            Self::Unknown(byte) => byte,
        }
    }

    /// Inverse of [`EntryKind::to_byte`]; total over all bytes.
    pub const fn from_byte(byte: u8) -> Self {
        match byte {
            0 => Self::CloudCoverage,
            1 => Self::LightState,
            2 => Self::SystemState,
            3 => Self::Error,
            other => Self::Unknown(other),
        }
    }

    /// Short name used by the dashboard's `type` query parameter.
    pub const fn query_name(self) -> &'static str {
        match self {
            Self::CloudCoverage => "cloud",
            Self::LightState => "light",
            Self::SystemState => "system",
            Self::Error => "error",
            Self::Unknown(_) => "unknown",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(byte) => write!(f, "unknown({byte})"),
            known => f.write_str(known.query_name()),
        }
    }
}

/// Error returned when a `type` parameter names no known entry kind.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown log type: {0:?}")]
pub struct ParseKindError(pub String);

impl FromStr for EntryKind {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cloud" => Ok(Self::CloudCoverage),
            "light" => Ok(Self::LightState),
            "system" => Ok(Self::SystemState),
            "error" => Ok(Self::Error),
            _ => Err(ParseKindError(s.to_string())),
        }
    }
}

/// A single event record.
///
/// Exactly 8 bytes on the medium (see [`codec`]):
/// - `u32` timestamp in epoch seconds
/// - `u8` kind tag
/// - `u8` value
/// - `u16` kind-specific extra payload
///
/// # Example
/// ```
/// use cloudlight_lib::{EntryKind, LogEntry};
///
/// // 42.5 % cloud coverage, stored as fixed-point ×10
/// let entry = LogEntry {
///     timestamp: 1_700_000_000,
///     kind: EntryKind::CloudCoverage,
///     value: 0,
///     extra: 425,
/// };
/// assert_eq!(entry.cloud_coverage(), Some(42.5));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Epoch seconds at which the entry was appended
    pub timestamp: u32,
    /// Producer that recorded the entry
    pub kind: EntryKind,
    /// Raw value byte (light on/off, state code, error code)
    pub value: u8,
    /// Auxiliary payload (cloud coverage ×10)
    pub extra: u16,
}

impl LogEntry {
    /// Cloud coverage percentage for [`EntryKind::CloudCoverage`] entries.
    pub fn cloud_coverage(&self) -> Option<f32> {
        match self.kind {
            EntryKind::CloudCoverage => Some(self.extra as f32 / 10.0),
            _ => None,
        }
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            EntryKind::CloudCoverage => write!(
                f,
                "[{}] cloud {:.1}%",
                self.timestamp,
                self.extra as f32 / 10.0
            ),
            EntryKind::LightState => write!(
                f,
                "[{}] light {}",
                self.timestamp,
                if self.value != 0 { "on" } else { "off" }
            ),
            EntryKind::SystemState => write!(
                f,
                "[{}] state {}",
                self.timestamp,
                SystemState::label_for(self.value)
            ),
            EntryKind::Error => write!(f, "[{}] error {}", self.timestamp, self.value),
            EntryKind::Unknown(tag) => write!(
                f,
                "[{}] unknown tag {} value={} extra={}",
                self.timestamp, tag, self.value, self.extra
            ),
        }
    }
}

/// Controller state codes recorded by [`EntryKind::SystemState`] entries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum SystemState {
    /// Idle, waiting for the next scheduled check
    Normal = 0,
    /// Sampling cloud coverage around sunset
    Monitoring = 1,
    /// Light switched on by the coverage threshold
    Active = 2,
    /// Light switched on by the sunset schedule
    Scheduled = 3,
    /// Light toggled by hand from the dashboard
    Manual = 4,
}

impl SystemState {
    /// Decode a state code; `None` for codes outside `0..=4`.
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Normal),
            1 => Some(Self::Monitoring),
            2 => Some(Self::Active),
            3 => Some(Self::Scheduled),
            4 => Some(Self::Manual),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Normal => "NORMAL",
            Self::Monitoring => "MONITORING",
            Self::Active => "ACTIVE",
            Self::Scheduled => "SCHEDULED",
            Self::Manual => "MANUAL",
        }
    }

    /// Label for a raw code, `"UNKNOWN"` when the code is out of range.
    pub const fn label_for(code: u8) -> &'static str {
        match Self::from_code(code) {
            Some(state) => state.label(),
            None => "UNKNOWN",
        }
    }
}

impl From<SystemState> for u8 {
    fn from(state: SystemState) -> Self {
        state as u8
    }
}
