//! # Scenario Test Suite for the Event Log
//!
//! These tests drive a [`LogManager`] end to end through an in-memory or
//! file-backed store with a hand-controlled clock: ordering before and after
//! wraparound, survival across restarts, rotation, and dashboard export.

use tempfile::tempdir;

use crate::export::ExportValue;
use crate::{
    DurableStore, EntryKind, FileStore, LogEntry, LogManager, LogOptions, ManualClock,
    MemoryStore, RingMetadata, SystemState, TimeSource,
};

const T0: u32 = 1_700_000_000;
const WEEK: u32 = 7 * 86_400;

fn options(capacity: u16) -> LogOptions {
    LogOptions {
        capacity,
        ..LogOptions::default()
    }
}

fn open_memory(capacity: u16) -> (LogManager<MemoryStore, ManualClock>, ManualClock) {
    let clock = ManualClock::new(T0);
    let store = MemoryStore::new(options(capacity).region_size());
    let log = LogManager::open(store, clock.clone(), options(capacity))
        .expect("Should open log on a blank store");
    (log, clock)
}

/// Simulate losing power and rebooting: drop the manager, discard the
/// store's uncommitted bytes, and open again.
fn restart(
    log: LogManager<MemoryStore, ManualClock>,
    clock: &ManualClock,
) -> LogManager<MemoryStore, ManualClock> {
    let capacity = log.capacity();
    let mut store = log.into_store();
    store.power_cycle();
    LogManager::open(store, clock.clone(), options(capacity)).expect("Should reopen log")
}

/// Test that entries come back in append order before the ring fills.
#[test]
fn entries_read_back_in_append_order() {
    let (mut log, clock) = open_memory(10);

    let mut written = Vec::new();
    for code in 0..7u8 {
        clock.advance(60);
        written.push(log.log_error(code).unwrap());
    }

    assert_eq!(log.count(), 7);
    for (i, expected) in written.iter().enumerate() {
        assert_eq!(
            log.get(i as u16).as_ref(),
            Some(expected),
            "Logical index {} should hold the {}-th append",
            i,
            i + 1
        );
    }
    assert_eq!(log.get(7), None, "Index past count should be absent");
}

/// Test the boundary where the ring is exactly full but nothing is evicted.
///
/// `head` has wrapped back to 0 while `count == capacity`, so lookups go
/// through the wrapped slot formula.
#[test]
fn exactly_full_ring_reads_back_in_order() {
    let capacity = 5u16;
    let (mut log, clock) = open_memory(capacity);

    let mut written = Vec::new();
    for code in 0..capacity as u8 {
        clock.advance(1);
        written.push(log.log_error(code).unwrap());
    }

    assert_eq!(log.count(), capacity);
    assert_eq!(log.metadata().head, 0, "Head should have wrapped to slot 0");
    let read: Vec<LogEntry> = (0..capacity).filter_map(|i| log.get(i)).collect();
    assert_eq!(read, written);
    assert_eq!(log.get(capacity), None);
}

/// Test the four-slot wraparound: A..E leaves B, C, D, E.
#[test]
fn capacity_four_wraparound_keeps_newest_four() {
    let (mut log, clock) = open_memory(4);

    let mut written = Vec::new();
    for code in [b'A', b'B', b'C', b'D', b'E'] {
        clock.advance(1);
        written.push(log.log_error(code).unwrap());
    }

    assert_eq!(log.count(), 4);
    let values: Vec<u8> = (0..4).map(|i| log.get(i).unwrap().value).collect();
    assert_eq!(values, vec![b'B', b'C', b'D', b'E']);
    assert_eq!(log.get(0), Some(written[1]));
    assert_eq!(log.get(3), Some(written[4]));
    assert_eq!(log.get(4), None);
}

/// Test eviction after many laps around the ring.
///
/// With `capacity + k` appends, the first `k` are gone and the rest are
/// retrievable oldest first.
#[test]
fn overflow_evicts_oldest_one_for_one() {
    let capacity = 6u16;
    let (mut log, clock) = open_memory(capacity);

    let total = capacity as u32 * 3 + 2;
    let mut written = Vec::new();
    for n in 0..total {
        clock.advance(10);
        written.push(log.log_error((n % 256) as u8).unwrap());
    }

    let k = (total - capacity as u32) as usize;
    assert_eq!(log.count(), capacity);
    assert_eq!(log.get(0), Some(written[k]), "get(0) should be the (k+1)-th append");

    let remaining: Vec<LogEntry> = log.iter().collect();
    assert_eq!(remaining, written[k..].to_vec());

    // Timestamps must be strictly increasing across the wrap point
    for pair in remaining.windows(2) {
        assert!(pair[0].timestamp < pair[1].timestamp);
    }
}

/// Test that a forced commit makes the newest entry survive a restart.
#[test]
fn flushed_entry_survives_restart() {
    let (mut log, clock) = open_memory(10);
    log.log_light_state(true).unwrap();
    let last = log.log_system_state(SystemState::Monitoring).unwrap();
    assert!(log.flush(), "Flush should succeed on a healthy store");

    let log = restart(log, &clock);

    assert_eq!(log.count(), 2);
    assert_eq!(log.get(log.count() - 1), Some(last));
}

/// Test the wear trade-off: without a commit, the last batch is lost.
#[test]
fn uncommitted_appends_are_lost_on_power_loss() {
    let (mut log, clock) = open_memory(20);
    for code in 0..7 {
        log.log_error(code).unwrap();
    }
    // Threshold 5: one commit after the fifth append, two appends staged
    assert_eq!(log.store().commit_count(), 1);
    assert_eq!(log.pending_writes(), 2);

    let log = restart(log, &clock);

    assert_eq!(log.count(), 5);
    assert_eq!(log.get(4).unwrap().value, 4);
    assert_eq!(log.get(5), None);
}

/// Test that a full ring survives a restart with correct ordering.
#[test]
fn wrapped_ring_survives_restart() {
    let (mut log, clock) = open_memory(4);
    for code in 1..=10 {
        clock.advance(5);
        log.log_error(code).unwrap();
    }
    assert!(log.flush());

    let log = restart(log, &clock);

    let values: Vec<u8> = log.iter().map(|e| e.value).collect();
    assert_eq!(values, vec![7, 8, 9, 10]);
}

/// Test that back-to-back resets are harmless and the next append is index 0.
#[test]
fn consecutive_resets_are_idempotent() {
    let (mut log, clock) = open_memory(8);
    for _ in 0..3 {
        log.log_light_state(false).unwrap();
    }

    assert!(log.reset(clock.now()));
    assert_eq!(log.count(), 0);
    assert!(log.reset(clock.now()));
    assert_eq!(log.count(), 0);

    let entry = log.log_error(42).unwrap();
    assert_eq!(log.count(), 1);
    assert_eq!(log.get(0), Some(entry));
    assert_eq!(log.metadata().head, 1);
}

/// Test that a reset is durable straight away, without a flush.
#[test]
fn reset_is_durable_without_flush() {
    let (mut log, clock) = open_memory(8);
    for _ in 0..5 {
        log.log_error(1).unwrap();
    }
    clock.advance(100);
    log.reset(clock.now());

    let log = restart(log, &clock);

    assert_eq!(log.count(), 0);
    assert_eq!(log.metadata().last_reset_epoch, T0 + 100);
}

/// Test weekly rotation: an append in the week after the last reset clears
/// everything before storing the new entry.
#[test]
fn append_in_next_week_rotates_log() {
    let (mut log, clock) = open_memory(10);
    log.reset(T0);
    for _ in 0..4 {
        clock.advance(3_600);
        log.log_light_state(true).unwrap();
    }
    assert_eq!(log.count(), 4);

    // Jump to the first second of the following week
    let next_week = (T0 / WEEK + 1) * WEEK;
    clock.set(next_week);
    let commits_before = log.store().commit_count();
    let entry = log.log_error(7).unwrap();

    assert_eq!(log.count(), 1, "Rotation should leave only the new entry");
    assert_eq!(log.get(0), Some(entry));
    assert_eq!(log.metadata().last_reset_epoch, next_week);
    assert_eq!(
        log.store().commit_count(),
        commits_before + 1,
        "Rotation should commit immediately, outside the append batch"
    );
    assert_eq!(log.pending_writes(), 1);
}

/// Test that a rotation survives power loss even though the entry that
/// triggered it was never flushed.
#[test]
fn rotation_is_durable_without_flush() {
    let (mut log, clock) = open_memory(10);
    log.reset(T0);
    for _ in 0..5 {
        clock.advance(60);
        log.log_light_state(true).unwrap();
    }

    let next_week = (T0 / WEEK + 1) * WEEK;
    clock.set(next_week + 30);
    log.log_error(7).unwrap();

    let log = restart(log, &clock);

    assert_eq!(log.metadata().last_reset_epoch, next_week + 30);
    assert_eq!(log.count(), 0, "The staged entry after the rotation is lost");
    assert_eq!(log.metadata().head, 0);
}

/// Test that appends later in the same week do not rotate.
#[test]
fn append_within_same_week_does_not_rotate() {
    let (mut log, clock) = open_memory(10);
    let week_start = (T0 / WEEK) * WEEK;
    log.reset(week_start);
    clock.set(week_start);

    log.log_error(1).unwrap();
    clock.set(week_start + WEEK - 1);
    log.log_error(2).unwrap();

    assert_eq!(log.count(), 2);
}

/// Test that a log that was never reset does not rotate on its own.
#[test]
fn never_reset_log_does_not_rotate() {
    let (mut log, clock) = open_memory(10);
    log.log_error(1).unwrap();
    clock.advance(5 * WEEK);
    log.log_error(2).unwrap();

    assert_eq!(log.count(), 2);
    assert_eq!(log.metadata().last_reset_epoch, 0);
}

/// Test recovery from a factory-erased (all 0xFF) region.
#[test]
fn erased_store_is_recovered_as_empty() {
    let clock = ManualClock::new(T0);
    let store = MemoryStore::erased(options(10).region_size());
    let log = LogManager::open(store, clock, options(10)).unwrap();

    assert_eq!(
        log.metadata(),
        RingMetadata {
            count: 0,
            head: 0,
            last_reset_epoch: T0
        }
    );
    assert_eq!(
        log.store().commit_count(),
        1,
        "Recovery should be committed immediately"
    );
}

/// Test each corrupt-header condition independently.
#[test]
fn out_of_range_header_fields_trigger_reset() {
    let corrupt_headers = [
        RingMetadata {
            count: 11,
            head: 0,
            last_reset_epoch: T0,
        },
        RingMetadata {
            count: 3,
            head: 10,
            last_reset_epoch: T0,
        },
        RingMetadata {
            count: 3,
            head: 3,
            last_reset_epoch: T0 + 86_400 + 1,
        },
    ];

    for header in corrupt_headers {
        let mut store = MemoryStore::new(options(10).region_size());
        store.write(0, &crate::codec::encode_metadata(&header)).unwrap();

        let log = LogManager::open(store, ManualClock::new(T0), options(10)).unwrap();
        assert_eq!(log.count(), 0, "Header {:?} should be treated as corrupt", header);
        assert_eq!(log.metadata().last_reset_epoch, T0);
    }
}

/// Test that plausible headers are loaded as-is.
#[test]
fn plausible_header_is_kept() {
    let header = RingMetadata {
        count: 10,
        head: 9,
        // Up to a day of clock skew is tolerated
        last_reset_epoch: T0 + 86_400,
    };
    let mut store = MemoryStore::new(options(10).region_size());
    store.write(0, &crate::codec::encode_metadata(&header)).unwrap();

    let log = LogManager::open(store, ManualClock::new(T0), options(10)).unwrap();
    assert_eq!(log.metadata(), header);
    assert_eq!(log.store().commit_count(), 0);
}

/// Test that failed commits never lose staged data from the live view.
#[test]
fn failed_commits_keep_entries_queryable() {
    let (mut log, _) = open_memory(10);
    let mut store = MemoryStore::new(options(10).region_size());
    store.set_fail_commits(true);
    let mut log_failing = LogManager::open(store, ManualClock::new(T0), options(10)).unwrap();

    for code in 0..8 {
        log_failing.log_error(code).unwrap();
        log.log_error(code).unwrap();
    }

    assert_eq!(log_failing.pending_writes(), 8);
    assert_eq!(log_failing.count(), 8);
    assert_eq!(
        log_failing.iter().map(|e| e.value).collect::<Vec<_>>(),
        log.iter().map(|e| e.value).collect::<Vec<_>>()
    );
    assert!(!log_failing.flush());
}

/// Test the dashboard export of cloud samples mixed with light toggles.
#[test]
fn export_filters_cloud_coverage_in_order() {
    let (mut log, clock) = open_memory(20);

    log.log_cloud_coverage(10.0).unwrap();
    clock.advance(600);
    log.log_light_state(true).unwrap();
    clock.advance(600);
    log.log_cloud_coverage(55.5).unwrap();
    clock.advance(600);
    log.log_light_state(false).unwrap();
    clock.advance(600);
    log.log_cloud_coverage(99.9).unwrap();

    let points = log.export(EntryKind::CloudCoverage);
    assert_eq!(points.len(), 3);

    let expected = [10.0, 55.5, 99.9];
    for (point, want) in points.iter().zip(expected) {
        let got = point.value.as_f64();
        assert!(
            (got - want).abs() <= 0.1,
            "Exported coverage {} should be within 0.1 of {}",
            got,
            want
        );
        assert!(point.state_name.is_none());
    }
    assert_eq!(points[0].time, T0);
    assert_eq!(points[1].time, T0 + 1_200);
    assert_eq!(points[2].time, T0 + 2_400);
}

/// Test the JSON served to the chart for system states.
#[test]
fn export_json_labels_system_states() {
    let (mut log, clock) = open_memory(10);
    log.log_system_state(SystemState::Normal).unwrap();
    clock.advance(1);
    log.log_light_state(true).unwrap();
    clock.advance(1);
    log.log_system_state(SystemState::Manual).unwrap();
    clock.advance(1);
    log.log_system_state(200u8).unwrap();

    let json = log.export_json(EntryKind::SystemState).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
    let items = parsed.as_array().expect("Export should be a JSON array");

    assert_eq!(items.len(), 3);
    assert_eq!(items[0]["time"], T0);
    assert_eq!(items[0]["stateName"], "NORMAL");
    assert_eq!(items[1]["value"], 4);
    assert_eq!(items[1]["stateName"], "MANUAL");
    assert_eq!(items[2]["value"], 200);
    assert_eq!(items[2]["stateName"], "UNKNOWN");

    let light = log.export_json(EntryKind::LightState).unwrap();
    assert_eq!(light, format!(r#"[{{"time":{},"value":1}}]"#, T0 + 1));
}

/// Test that export tracks the ring after wraparound and after a reset.
#[test]
fn export_is_recomputed_on_each_call() {
    let (mut log, clock) = open_memory(3);
    for code in 1..=5 {
        clock.advance(1);
        log.log_error(code).unwrap();
    }
    let values: Vec<_> = log
        .export(EntryKind::Error)
        .into_iter()
        .map(|p| p.value)
        .collect();
    assert_eq!(
        values,
        vec![ExportValue::Raw(3), ExportValue::Raw(4), ExportValue::Raw(5)]
    );

    log.reset(clock.now());
    assert!(log.export(EntryKind::Error).is_empty());
    assert_eq!(log.export_json(EntryKind::Error).unwrap(), "[]");
}

/// Test that the dashboard's `type` parameter maps onto entry kinds.
#[test]
fn query_names_parse_to_kinds() {
    assert_eq!("cloud".parse::<EntryKind>().unwrap(), EntryKind::CloudCoverage);
    assert_eq!("light".parse::<EntryKind>().unwrap(), EntryKind::LightState);
    assert_eq!("System".parse::<EntryKind>().unwrap(), EntryKind::SystemState);
    assert_eq!("error".parse::<EntryKind>().unwrap(), EntryKind::Error);
    assert!("humidity".parse::<EntryKind>().is_err());

    for kind in [
        EntryKind::CloudCoverage,
        EntryKind::LightState,
        EntryKind::SystemState,
        EntryKind::Error,
    ] {
        assert_eq!(kind.query_name().parse::<EntryKind>().unwrap(), kind);
        assert_eq!(EntryKind::from_byte(kind.to_byte()), kind);
    }
}

/// Test the full path through a file-backed store, as the CLI uses it.
#[test]
fn file_store_log_survives_reopen() {
    let dir = tempdir().expect("Should create temp dir");
    let path = dir.path().join("eeprom.bin");
    let opts = LogOptions {
        capacity: 100,
        commit_threshold: 5,
        base_offset: 512,
    };
    let clock = ManualClock::new(T0);

    {
        let store = FileStore::open(&path, 512 + 3072).unwrap();
        let mut log = LogManager::open(store, clock.clone(), opts).unwrap();
        log.log_cloud_coverage(33.5).unwrap();
        log.log_light_state(true).unwrap();
        assert!(log.flush());
    }

    let store = FileStore::open(&path, 512 + 3072).unwrap();
    let log = LogManager::open(store, clock, opts).unwrap();
    assert_eq!(log.count(), 2);
    assert_eq!(log.get(0).unwrap().extra, 335);
    assert_eq!(log.get(1).unwrap().kind, EntryKind::LightState);

    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(bytes.len(), 3584);
    assert!(bytes[..512].iter().all(|&b| b == 0), "Bytes before the region stay untouched");
}
