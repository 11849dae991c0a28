//! # Dashboard Export
//!
//! Turns the log into the chart series served to the dashboard. Each
//! request names one entry kind; the response is that kind's entries,
//! oldest first, as a JSON array:
//!
//! ```json
//! [{"time":1700000000,"value":55.5},{"time":1700000600,"value":62.0}]
//! ```
//!
//! ## Value Decoding
//! - **Cloud coverage**: `extra / 10.0`, one decimal place of precision
//! - **Everything else**: the raw `value` byte
//! - **System state**: additionally carries a `stateName` label
//!
//! The series is recomputed from the ring on every call, so it always
//! reflects the latest appends and any reset.

use crate::clock::TimeSource;
use crate::store::DurableStore;
use crate::{EntryKind, LogEntry, LogManager, SystemState};
use serde::Serialize;

/// Value of one exported point.
///
/// Serialized untagged so raw bytes render as JSON integers and cloud
/// coverage as a decimal.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ExportValue {
    Raw(u8),
    Percent(f32),
}

impl ExportValue {
    pub fn as_f64(self) -> f64 {
        match self {
            ExportValue::Raw(v) => v as f64,
            ExportValue::Percent(v) => v as f64,
        }
    }
}

/// One `{time, value}` point of a chart series.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ExportPoint {
    /// Epoch seconds
    pub time: u32,
    pub value: ExportValue,
    /// Only present for system state entries
    #[serde(rename = "stateName", skip_serializing_if = "Option::is_none")]
    pub state_name: Option<&'static str>,
}

impl ExportPoint {
    /// Decode `entry` for the chart, or `None` if it is not of `kind`.
    pub fn from_entry(entry: &LogEntry, kind: EntryKind) -> Option<Self> {
        if entry.kind != kind {
            return None;
        }

        let value = match kind {
            EntryKind::CloudCoverage => ExportValue::Percent(entry.extra as f32 / 10.0),
            _ => ExportValue::Raw(entry.value),
        };
        let state_name = match kind {
            EntryKind::SystemState => Some(SystemState::label_for(entry.value)),
            _ => None,
        };

        Some(ExportPoint {
            time: entry.timestamp,
            value,
            state_name,
        })
    }
}

/// Filter and decode `entries` into the series for `kind`, preserving order.
pub fn series<I>(entries: I, kind: EntryKind) -> impl Iterator<Item = ExportPoint>
where
    I: IntoIterator<Item = LogEntry>,
{
    entries
        .into_iter()
        .filter_map(move |entry| ExportPoint::from_entry(&entry, kind))
}

impl<S: DurableStore, C: TimeSource> LogManager<S, C> {
    /// Entries of `kind`, oldest first, decoded for charting.
    pub fn export(&self, kind: EntryKind) -> Vec<ExportPoint> {
        series(self.iter(), kind).collect()
    }

    /// [`export`](Self::export) rendered as a JSON array.
    pub fn export_json(&self, kind: EntryKind) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.export(kind))
    }
}
