//! Collector Tests
//!
//! Stop conditions, bounded queues and termination when workers fail.

use crate::*;
use casrace_concurrency::{race, OutputFormat, Overflow, RaceConfig, StopCondition};
use casrace_core::CasOutcome;
use std::io;
use std::time::Duration;

/// Every send is accounted for exactly once
fn assert_sends_accounted(report: &RaceReport, workers: usize) {
    let queue = report.queue;
    assert_eq!(
        queue.delivered + queue.dropped + queue.undelivered,
        report.attempts() + workers as u64
    );
}

/// Stopping on the first sentinel still lets every worker finish
#[test]
fn test_stop_on_first_worker() {
    let cluster = create_cluster();
    let session = create_session(&cluster, RetryPolicyKind::StatementLevel);
    let config = RaceConfig::new(3, Duration::from_millis(10), 30)
        .stop_condition(StopCondition::FirstWorker);

    let (report, _) = race(&config, |_| Ok(&session), io::sink());

    assert!(report.is_clean());
    assert_eq!(report.collector.completed.len(), 1);
    assert_eq!(report.successes(), 30);
    assert!(report.collector.records.len() as u64 <= report.attempts());
    assert_sends_accounted(&report, 3);
    assert_eq!(current_revision(&session), 30);
}

/// Waiting for all sentinels sees every attempt
#[test]
fn test_all_workers_sees_every_attempt() {
    let cluster = create_cluster();
    let session = create_session(&cluster, RetryPolicyKind::StatementLevel);

    let (report, _) = race(&RaceConfig::new(4, Duration::ZERO, 20), |_| Ok(&session), io::sink());

    assert_eq!(report.collector.records.len() as u64, report.attempts());
    assert_eq!(report.collector.completed.len(), 4);
    assert!(!report.collector.closed_early);
    assert_eq!(report.queue.undelivered, 0);
}

/// A full bounded queue with Block loses nothing
#[test]
fn test_bounded_queue_block() {
    let cluster = create_cluster();
    let session = create_session(&cluster, RetryPolicyKind::StatementLevel);
    let config = RaceConfig::new(4, Duration::ZERO, 40).bounded(1, Overflow::Block);

    let (report, _) = race(&config, |_| Ok(&session), io::sink());

    assert_eq!(report.queue.dropped, 0);
    assert_eq!(report.collector.records.len() as u64, report.attempts());
}

/// A full bounded queue with Drop counts what it discards
#[test]
fn test_bounded_queue_drop() {
    let cluster = create_cluster();
    let session = create_session(&cluster, RetryPolicyKind::StatementLevel);
    let config = RaceConfig::new(4, Duration::ZERO, 40).bounded(1, Overflow::Drop);

    let (report, _) = race(&config, |_| Ok(&session), io::sink());

    assert!(report.is_clean());
    assert_eq!(report.successes(), 40);
    assert_eq!(
        report.collector.records.len() as u64 + report.queue.dropped,
        report.attempts()
    );
    let dropped: u64 = report.summaries().map(|s| s.dropped).sum();
    assert_eq!(dropped, report.queue.dropped);
    assert_sends_accounted(&report, 4);
}

/// Workers that die on a fatal error still terminate the collector
#[test]
fn test_fatal_errors_still_send_sentinels() {
    let cluster = create_cluster();
    let session = create_session(&cluster, RetryPolicyKind::StatementLevel);
    cluster.set_live_replicas(1);

    let (report, _) = race(&RaceConfig::new(3, Duration::ZERO, 5), |_| Ok(&session), io::sink());

    assert_eq!(report.errors().count(), 3);
    assert!(report.errors().all(|e| e.is_fatal()));
    assert_eq!(report.collector.completed.len(), 3);
    assert!(report.collector.records.is_empty());
}

/// Human output is one bracketed line per attempt, in arrival order
#[test]
fn test_human_output_lines() {
    let cluster = create_cluster();
    let session = create_session(&cluster, RetryPolicyKind::StatementLevel);

    let (report, out) = race(&RaceConfig::new(2, Duration::ZERO, 6), |_| Ok(&session), Vec::new());

    let text = String::from_utf8(out).unwrap();
    let lines: Vec<_> = text.lines().collect();
    assert_eq!(lines.len(), report.collector.records.len());
    for (line, record) in lines.iter().zip(&report.collector.records) {
        assert_eq!(*line, record.to_string());
        assert!(line.starts_with('[') && line.ends_with(']'));
    }
}

/// JSON output is one object per line
#[test]
fn test_json_output_lines() {
    let cluster = create_cluster();
    let session = create_session(&cluster, RetryPolicyKind::StatementLevel);
    let config = RaceConfig::new(2, Duration::ZERO, 4).format(OutputFormat::Json);

    let (report, out) = race(&config, |_| Ok(&session), Vec::new());

    let text = String::from_utf8(out).unwrap();
    let parsed: Vec<casrace_core::AttemptRecord> = text
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(parsed, report.collector.records);
    assert_eq!(
        parsed.iter().filter(|r| r.outcome == CasOutcome::Success).count(),
        4
    );
}
