//! Time sources used to stamp log entries and decide weekly rotation.

use chrono::Utc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Supplies the current time in epoch seconds.
pub trait TimeSource {
    fn now(&self) -> u32;
}

/// Wall clock backed by `chrono::Utc::now()`.
///
/// Times before 1970 read as 0 and times past 2106 saturate at `u32::MAX`,
/// the range of the on-medium timestamp field.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl TimeSource for SystemClock {
    fn now(&self) -> u32 {
        Utc::now().timestamp().clamp(0, u32::MAX as i64) as u32
    }
}

/// Settable clock; clones share the same instant.
///
/// Hand one clone to the log manager and keep another to move time forward:
///
/// ```
/// use cloudlight_lib::{ManualClock, TimeSource};
///
/// let clock = ManualClock::new(1_000);
/// let handle = clock.clone();
/// handle.advance(60);
/// assert_eq!(clock.now(), 1_060);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    secs: Arc<AtomicU32>,
}

impl ManualClock {
    pub fn new(secs: u32) -> Self {
        Self {
            secs: Arc::new(AtomicU32::new(secs)),
        }
    }

    pub fn set(&self, secs: u32) {
        self.secs.store(secs, Ordering::Relaxed);
    }

    pub fn advance(&self, secs: u32) {
        self.secs.fetch_add(secs, Ordering::Relaxed);
    }
}

impl TimeSource for ManualClock {
    fn now(&self) -> u32 {
        self.secs.load(Ordering::Relaxed)
    }
}

impl<T: TimeSource + ?Sized> TimeSource for &T {
    fn now(&self) -> u32 {
        (**self).now()
    }
}
