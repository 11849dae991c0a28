//! # Ring Buffer Log Manager
//!
//! Owns the ring metadata and entry slots inside a [`DurableStore`] and
//! implements append, lookup, reset and rotation on top of them.
//!
//! ## Region Layout
//!
//! Starting at [`LogOptions::base_offset`]:
//! - **Header** (8 bytes): `count`, `head`, `last_reset_epoch`
//! - **Slots** (`capacity × 8` bytes): encoded [`LogEntry`] records
//!
//! For the default capacity of 100 this is 808 bytes. The device reserves
//! 3072 bytes at offset 512; the remainder is unused headroom.
//!
//! ## Index Arithmetic
//!
//! `head` is the next physical slot to write. Logical index 0 is always the
//! oldest live entry:
//! - **Not yet wrapped** (`count < capacity`): slot = logical index
//! - **Wrapped** (`count == capacity`): slot = `(head - count + i + capacity) % capacity`
//!
//! ## Commit Policy
//!
//! Every append stages the entry and the header in the store's working copy.
//! A durable commit happens after [`LogOptions::commit_threshold`] appends,
//! or immediately on any reset. A power cut can therefore lose up to
//! `threshold - 1` of the newest entries.
//!
//! Entry bytes and header are two separate staged writes with no atomic
//! pairing. A power cut between them can leave the header pointing at a slot
//! whose contents were never committed; the open-time range check does not
//! catch that case.

use crate::clock::TimeSource;
use crate::codec::{self, ENTRY_SIZE, METADATA_SIZE};
use crate::store::{DurableStore, StoreError};
use crate::{EntryKind, LogEntry};
use log::{debug, error, info, warn};
use thiserror::Error;

const SECS_PER_DAY: u32 = 86_400;

/// Errors surfaced by [`LogManager`] operations.
#[derive(Error, Debug)]
pub enum LogError {
    /// The store cannot hold the header plus all slots
    #[error("store region too small: need {required} bytes, have {available}")]
    RegionTooSmall { required: usize, available: usize },

    /// Base offset plus region size does not fit in the address space
    #[error("log region at offset {base_offset} overflows the address space")]
    LayoutOverflow { base_offset: usize },

    /// A ring must have at least one slot
    #[error("log capacity must be at least 1")]
    InvalidCapacity,

    /// Committing after zero writes would never batch anything
    #[error("commit threshold must be at least 1")]
    InvalidCommitThreshold,

    /// Cloud coverage outside 0–100 %; nothing was logged
    #[error("cloud coverage {0} is outside 0-100%")]
    CoverageOutOfRange(f32),

    /// Underlying store rejected a read or write
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Sizing and batching parameters for a log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogOptions {
    /// Number of entry slots in the ring
    pub capacity: u16,
    /// Appends between durable commits
    pub commit_threshold: u16,
    /// Byte offset of the header within the store
    pub base_offset: usize,
}

impl Default for LogOptions {
    fn default() -> Self {
        LogOptions {
            capacity: 100,
            commit_threshold: 5,
            base_offset: 0,
        }
    }
}

impl LogOptions {
    /// Bytes occupied by header and slots.
    pub fn region_size(&self) -> usize {
        METADATA_SIZE + self.capacity as usize * ENTRY_SIZE
    }

    /// Bytes the store must hold: everything up to the end of the last slot.
    /// `None` if that end lies past `usize::MAX`.
    pub fn required_size(&self) -> Option<usize> {
        self.base_offset.checked_add(self.region_size())
    }

    /// Reject parameters no ring could operate with.
    pub fn validate(&self) -> Result<(), LogError> {
        if self.capacity == 0 {
            return Err(LogError::InvalidCapacity);
        }
        if self.commit_threshold == 0 {
            return Err(LogError::InvalidCommitThreshold);
        }
        Ok(())
    }
}

/// Ring bookkeeping persisted in the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RingMetadata {
    /// Live entries, `0..=capacity`
    pub count: u16,
    /// Next physical slot to write, `0..capacity`
    pub head: u16,
    /// Epoch seconds of the last reset, 0 if never reset
    pub last_reset_epoch: u32,
}

/// Week index used for rotation: whole weeks since the epoch.
fn week_number(epoch_secs: u32) -> u32 {
    epoch_secs / SECS_PER_DAY / 7
}

/// Persistent circular event log.
///
/// Single owner, no interior locking: wrap it in a `Mutex` if the sampler
/// and the web handler run on different threads.
///
/// # Example
/// ```
/// use cloudlight_lib::{LogManager, LogOptions, ManualClock, MemoryStore};
///
/// let clock = ManualClock::new(1_700_000_000);
/// let store = MemoryStore::new(LogOptions::default().region_size());
/// let mut log = LogManager::open(store, clock, LogOptions::default()).unwrap();
///
/// log.log_cloud_coverage(62.5).unwrap();
/// log.log_light_state(true).unwrap();
///
/// assert_eq!(log.count(), 2);
/// assert_eq!(log.get(0).unwrap().cloud_coverage(), Some(62.5));
/// ```
#[derive(Debug)]
pub struct LogManager<S, C> {
    store: S,
    clock: C,
    options: LogOptions,
    meta: RingMetadata,
    /// Appends staged since the last successful commit
    pending: u16,
    /// Working copy differs from the durable image
    dirty: bool,
}

impl<S: DurableStore, C: TimeSource> LogManager<S, C> {
    /// Attach to `store`, loading and validating the persisted header.
    ///
    /// A header with `count > capacity`, `head >= capacity`, or a last reset
    /// more than a day in the future is treated as corrupt: the log is reset
    /// to empty at the current time and committed straight away.
    pub fn open(store: S, clock: C, options: LogOptions) -> Result<Self, LogError> {
        options.validate()?;

        let required = options
            .required_size()
            .ok_or(LogError::LayoutOverflow {
                base_offset: options.base_offset,
            })?;
        if store.size() < required {
            return Err(LogError::RegionTooSmall {
                required,
                available: store.size(),
            });
        }

        let mut header = [0u8; METADATA_SIZE];
        store.read(options.base_offset, &mut header)?;
        let meta = codec::decode_metadata(&header);

        let mut log = LogManager {
            store,
            clock,
            options,
            meta,
            pending: 0,
            dirty: false,
        };

        let now = log.clock.now();
        if log.is_corrupt(now) {
            warn!(
                "Corrupt log header (count={}, head={}, last_reset={}), resetting",
                meta.count, meta.head, meta.last_reset_epoch
            );
            log.reset(now);
        } else {
            info!(
                "Opened log: {} of {} entries, head at slot {}",
                meta.count, options.capacity, meta.head
            );
        }

        Ok(log)
    }

    fn is_corrupt(&self, now: u32) -> bool {
        self.meta.count > self.options.capacity
            || self.meta.head >= self.options.capacity
            || self.meta.last_reset_epoch > now.saturating_add(SECS_PER_DAY)
    }

    fn needs_weekly_rotation(&self, now: u32) -> bool {
        self.meta.last_reset_epoch != 0
            && week_number(now) > week_number(self.meta.last_reset_epoch)
    }

    fn slot_offset(&self, slot: u16) -> usize {
        self.options.base_offset + METADATA_SIZE + slot as usize * ENTRY_SIZE
    }

    /// Map a logical (oldest-first) index to its physical slot.
    fn physical_slot(&self, logical: u16) -> u16 {
        let capacity = self.options.capacity as u32;
        let count = self.meta.count as u32;
        if count < capacity {
            logical
        } else {
            ((self.meta.head as u32 + capacity - count + logical as u32) % capacity) as u16
        }
    }

    fn persist_metadata(&mut self) -> Result<(), StoreError> {
        let header = codec::encode_metadata(&self.meta);
        self.store.write(self.options.base_offset, &header)?;
        self.dirty = true;
        Ok(())
    }

    /// Commit the working copy; on failure the pending counter is kept so
    /// the next threshold check retries.
    fn commit(&mut self) -> bool {
        if self.store.commit() {
            debug!("Committed log ({} pending writes)", self.pending);
            self.pending = 0;
            self.dirty = false;
            true
        } else {
            warn!(
                "Log commit failed, {} writes remain uncommitted",
                self.pending
            );
            false
        }
    }

    /// Append an entry stamped with the current time.
    ///
    /// Crossing into a later week than the last reset clears the log before
    /// the new entry is stored. Returns the entry as written.
    pub fn append(&mut self, kind: EntryKind, value: u8, extra: u16) -> Result<LogEntry, LogError> {
        let now = self.clock.now();

        if self.needs_weekly_rotation(now) {
            info!(
                "Weekly rotation: week {} -> {}",
                week_number(self.meta.last_reset_epoch),
                week_number(now)
            );
            self.reset(now);
        }

        let entry = LogEntry {
            timestamp: now,
            kind,
            value,
            extra,
        };
        let slot = self.meta.head;
        let offset = self.slot_offset(slot);
        self.store.write(offset, &codec::encode(&entry))?;

        self.meta.head = ((slot as u32 + 1) % self.options.capacity as u32) as u16;
        if self.meta.count < self.options.capacity {
            self.meta.count += 1;
        }
        self.persist_metadata()?;
        self.pending = self.pending.saturating_add(1);

        debug!(
            "Appended {} at slot {} ({} live, {} pending)",
            entry, slot, self.meta.count, self.pending
        );

        if self.pending >= self.options.commit_threshold {
            self.commit();
        }

        Ok(entry)
    }

    /// Entry at logical index `logical` (0 = oldest), if live.
    pub fn get(&self, logical: u16) -> Option<LogEntry> {
        if logical >= self.meta.count {
            return None;
        }

        let slot = self.physical_slot(logical);
        let mut buf = [0u8; ENTRY_SIZE];
        match self.store.read(self.slot_offset(slot), &mut buf) {
            Ok(()) => Some(codec::decode(&buf)),
            Err(e) => {
                error!("Failed to read slot {}: {}", slot, e);
                None
            }
        }
    }

    /// Number of live entries.
    pub fn count(&self) -> u16 {
        self.meta.count
    }

    pub fn capacity(&self) -> u16 {
        self.options.capacity
    }

    pub fn metadata(&self) -> RingMetadata {
        self.meta
    }

    /// Appends staged since the last successful commit.
    pub fn pending_writes(&self) -> u16 {
        self.pending
    }

    /// All live entries, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = LogEntry> + '_ {
        (0..self.meta.count).filter_map(move |i| self.get(i))
    }

    /// Clear the log and record `now` as the reset time.
    ///
    /// Entry bytes are left in place; only the header changes. The header is
    /// committed immediately. Returns whether that commit succeeded.
    pub fn reset(&mut self, now: u32) -> bool {
        self.meta = RingMetadata {
            count: 0,
            head: 0,
            last_reset_epoch: now,
        };
        if let Err(e) = self.persist_metadata() {
            error!("Failed to write log header on reset: {}", e);
            return false;
        }
        info!("Log reset at {}", now);
        self.commit()
    }

    /// Force a commit of any staged writes. Returns `true` when nothing is
    /// left uncommitted.
    pub fn flush(&mut self) -> bool {
        if !self.dirty {
            return true;
        }
        self.commit()
    }

    /// Log a cloud coverage sample as fixed-point ×10 in `extra`.
    pub fn log_cloud_coverage(&mut self, percent: f32) -> Result<LogEntry, LogError> {
        if !(0.0..=100.0).contains(&percent) {
            return Err(LogError::CoverageOutOfRange(percent));
        }
        self.append(EntryKind::CloudCoverage, 0, (percent * 10.0) as u16)
    }

    pub fn log_light_state(&mut self, is_on: bool) -> Result<LogEntry, LogError> {
        self.append(EntryKind::LightState, u8::from(is_on), 0)
    }

    /// Log a controller state code; accepts raw codes or a [`SystemState`](crate::SystemState).
    pub fn log_system_state(&mut self, code: impl Into<u8>) -> Result<LogEntry, LogError> {
        self.append(EntryKind::SystemState, code.into(), 0)
    }

    pub fn log_error(&mut self, code: u8) -> Result<LogEntry, LogError> {
        self.append(EntryKind::Error, code, 0)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Give up ownership of the store, e.g. to simulate a restart.
    pub fn into_store(self) -> S {
        self.store
    }
}
