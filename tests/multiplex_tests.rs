//! Fan-out behavior of MultiplexWriter under each concurrency policy.

use streamkit::{ByteStream, Error, MemoryStream, MultiplexWriter, TieredSpillStream};
use tokio_util::sync::CancellationToken;

#[path = "test_common/mod.rs"]
mod test_common;

use test_common::{ReadOnlyStream, RecordingSink, SlowSink, entries, new_log};

// Construction

#[test]
fn both_forced_flags_fail_before_any_write() {
    let log = new_log();
    let result = MultiplexWriter::builder()
        .add_sink(RecordingSink::new(0, log.clone()))
        .force_parallel(true)
        .force_serial(true)
        .build();

    assert!(matches!(result, Err(Error::InvalidArgument(_))));
    assert!(entries(&log).is_empty());
}

#[test]
fn non_writable_sink_fails_construction() {
    let result = MultiplexWriter::builder()
        .add_sink(MemoryStream::new())
        .add_sink(ReadOnlyStream::new())
        .build();

    match result {
        Err(Error::InvalidArgument(msg)) => assert!(msg.contains("sink 1")),
        other => panic!("expected InvalidArgument, got {other:?}"),
    }
}

// Default policy, synchronous path

#[test]
fn default_sync_visits_every_sink_in_order() {
    let log = new_log();
    let mut writer = MultiplexWriter::builder()
        .add_sink(RecordingSink::new(0, log.clone()))
        .add_sink(RecordingSink::new(1, log.clone()))
        .add_sink(RecordingSink::new(2, log.clone()))
        .build()
        .unwrap();

    writer.write(b"data").unwrap();

    assert_eq!(
        entries(&log),
        vec![(0, "write"), (1, "write"), (2, "write")]
    );
}

#[test]
fn default_sync_continues_past_failure_and_raises_single_error() {
    let log = new_log();
    let mut writer = MultiplexWriter::builder()
        .add_sink(RecordingSink::new(0, log.clone()))
        .add_sink(RecordingSink::failing(1, log.clone()))
        .add_sink(RecordingSink::new(2, log.clone()))
        .build()
        .unwrap();

    let err = writer.write(b"data").unwrap_err();

    // All sinks were still attempted.
    assert_eq!(
        entries(&log),
        vec![(0, "write"), (1, "write"), (2, "write")]
    );
    // One failure is raised unwrapped.
    match err {
        Error::Generic(msg) => assert!(msg.contains("sink 1")),
        other => panic!("expected Generic, got {other:?}"),
    }
}

#[test]
fn default_sync_aggregates_multiple_failures_in_order() {
    let log = new_log();
    let mut writer = MultiplexWriter::builder()
        .add_sink(RecordingSink::failing(0, log.clone()))
        .add_sink(RecordingSink::new(1, log.clone()))
        .add_sink(RecordingSink::failing(2, log.clone()))
        .build()
        .unwrap();

    let err = writer.write(b"data").unwrap_err();

    match err {
        Error::Aggregate(agg) => {
            assert_eq!(agg.len(), 2);
            let formatted: Vec<String> = agg.errors().iter().map(|e| e.to_string()).collect();
            assert!(formatted[0].contains("sink 0"));
            assert!(formatted[1].contains("sink 2"));
        }
        other => panic!("expected Aggregate, got {other:?}"),
    }
}

// ForceSerial: sync aborts early, async attempts everything

#[test]
fn force_serial_sync_aborts_on_first_failure() {
    let log = new_log();
    let mut writer = MultiplexWriter::builder()
        .add_sink(RecordingSink::new(0, log.clone()))
        .add_sink(RecordingSink::failing(1, log.clone()))
        .add_sink(RecordingSink::new(2, log.clone()))
        .force_serial(true)
        .build()
        .unwrap();

    let err = writer.write(b"data").unwrap_err();

    // Sink 2 was never attempted.
    assert_eq!(entries(&log), vec![(0, "write"), (1, "write")]);
    assert!(matches!(err, Error::Generic(_)));
}

#[tokio::test]
async fn force_serial_async_attempts_all_and_aggregates() {
    let log = new_log();
    let mut writer = MultiplexWriter::builder()
        .add_sink(RecordingSink::failing(0, log.clone()))
        .add_sink(RecordingSink::new(1, log.clone()))
        .add_sink(RecordingSink::failing(2, log.clone()))
        .force_serial(true)
        .build()
        .unwrap();

    let cancel = CancellationToken::new();
    let err = writer.write_async(b"data", &cancel).await.unwrap_err();

    // Unlike the synchronous path, every sink was attempted, in order.
    assert_eq!(
        entries(&log),
        vec![(0, "write"), (1, "write"), (2, "write")]
    );
    match err {
        Error::Aggregate(agg) => assert_eq!(agg.len(), 2),
        other => panic!("expected Aggregate, got {other:?}"),
    }
}

// ForceParallel: sync surfaces one failure, async aggregates all

#[test]
fn force_parallel_sync_raises_single_failure() {
    let log = new_log();
    let mut writer = MultiplexWriter::builder()
        .add_sink(RecordingSink::failing(0, log.clone()))
        .add_sink(RecordingSink::new(1, log.clone()))
        .add_sink(RecordingSink::failing(2, log.clone()))
        .force_parallel(true)
        .build()
        .unwrap();

    let err = writer.write(b"data").unwrap_err();

    // Every sink ran, but only one failure surfaces even though two occurred.
    assert_eq!(entries(&log).len(), 3);
    assert!(matches!(err, Error::Generic(_)));
}

#[tokio::test]
async fn force_parallel_async_aggregates_all_failures() {
    let log = new_log();
    let mut writer = MultiplexWriter::builder()
        .add_sink(RecordingSink::failing(0, log.clone()))
        .add_sink(RecordingSink::new(1, log.clone()))
        .add_sink(RecordingSink::failing(2, log.clone()))
        .force_parallel(true)
        .build()
        .unwrap();

    let cancel = CancellationToken::new();
    let err = writer.write_async(b"data", &cancel).await.unwrap_err();

    assert_eq!(entries(&log).len(), 3);
    match err {
        Error::Aggregate(agg) => assert_eq!(agg.len(), 2),
        other => panic!("expected Aggregate, got {other:?}"),
    }
}

// Default policy, suspendable path

#[tokio::test]
async fn default_async_propagates_first_failure_unaggregated() {
    let log = new_log();
    let mut writer = MultiplexWriter::builder()
        .add_sink(RecordingSink::failing(0, log.clone()))
        .add_sink(RecordingSink::failing(1, log.clone()))
        .build()
        .unwrap();

    let cancel = CancellationToken::new();
    let err = writer.write_async(b"data", &cancel).await.unwrap_err();

    // Both sinks were attempted; only the first failure surfaces,
    // never an aggregate.
    assert_eq!(entries(&log), vec![(0, "write"), (1, "write")]);
    match err {
        Error::Generic(msg) => assert!(msg.contains("sink 0")),
        other => panic!("expected Generic, got {other:?}"),
    }
}

#[tokio::test]
async fn default_async_awaits_every_sink_before_raising() {
    let log = new_log();
    let mut writer = MultiplexWriter::builder()
        .add_sink(RecordingSink::failing(0, log.clone()))
        .add_sink(SlowSink::new(1, log.clone()))
        .build()
        .unwrap();

    let cancel = CancellationToken::new();
    let err = writer.write_async(b"data", &cancel).await.unwrap_err();

    // The slow sink's write still lands even though sink 0 failed on its
    // first poll; in-flight sinks are never abandoned.
    assert_eq!(entries(&log), vec![(0, "write"), (1, "write")]);
    match err {
        Error::Generic(msg) => assert!(msg.contains("sink 0")),
        other => panic!("expected Generic, got {other:?}"),
    }
}

// Flush and single-byte writes share the fan-out structure

#[test]
fn flush_fans_out_to_every_sink() {
    let log = new_log();
    let mut writer = MultiplexWriter::builder()
        .add_sink(RecordingSink::new(0, log.clone()))
        .add_sink(RecordingSink::new(1, log.clone()))
        .build()
        .unwrap();

    writer.flush().unwrap();

    assert_eq!(entries(&log), vec![(0, "flush"), (1, "flush")]);
}

#[test]
fn write_byte_replicates_to_all_sinks() {
    let first = MemoryStream::new();
    let second = MemoryStream::new();
    let (a, b) = (first.clone(), second.clone());

    let mut writer = MultiplexWriter::builder()
        .add_sink(first)
        .add_sink(second)
        .build()
        .unwrap();

    writer.write_byte(0x42).unwrap();

    assert_eq!(a.contents(), vec![0x42]);
    assert_eq!(b.contents(), vec![0x42]);
}

// Composition

#[test]
fn spill_stream_can_be_a_sink() {
    let copy = MemoryStream::new();
    let handle = copy.clone();

    let mut writer = MultiplexWriter::builder()
        .add_sink(copy)
        .add_sink(TieredSpillStream::new(16))
        .build()
        .unwrap();

    // Pushes the spill sink past its limit while mirroring to memory.
    writer.write(&[7u8; 64]).unwrap();
    writer.flush().unwrap();

    assert_eq!(handle.contents(), vec![7u8; 64]);
}

#[tokio::test]
async fn async_flush_and_write_byte_fan_out() {
    let log = new_log();
    let mut writer = MultiplexWriter::builder()
        .add_sink(RecordingSink::new(0, log.clone()))
        .add_sink(RecordingSink::new(1, log.clone()))
        .build()
        .unwrap();

    let cancel = CancellationToken::new();
    writer.write_byte_async(1, &cancel).await.unwrap();
    writer.flush_async(&cancel).await.unwrap();

    assert_eq!(
        entries(&log),
        vec![(0, "write"), (1, "write"), (0, "flush"), (1, "flush")]
    );
}
