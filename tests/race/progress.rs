//! Progress Tests
//!
//! Every race terminates with the record at its target revision.

use crate::*;
use casrace_concurrency::{race, RaceConfig};
use casrace_core::CasOutcome;
use proptest::prelude::*;
use std::collections::BTreeMap;
use std::io;
use std::time::Duration;

/// One worker, target 10: ten successes 0→1 … 9→10 in order
#[test]
fn test_single_worker_ten_successes() {
    let cluster = create_cluster();
    let session = create_session(&cluster, RetryPolicyKind::StatementLevel);

    let (report, _) = race(&RaceConfig::new(1, Duration::ZERO, 10), |_| Ok(&session), io::sink());

    let records = &report.collector.records;
    assert_eq!(records.len(), 10);
    for (i, record) in records.iter().enumerate() {
        assert_eq!(record.outcome, CasOutcome::Success);
        assert_eq!(record.observed_revision, i as u64);
        assert_eq!(record.attempted_revision, i as u64 + 1);
    }
    assert_eq!(current_revision(&session), 10);
}

/// A race starting from an advanced revision only covers the remainder
#[test]
fn test_progress_from_advanced_revision() {
    let cluster = create_cluster();
    let session = create_session(&cluster, RetryPolicyKind::StatementLevel);
    let id = RecordId::default();
    for rev in 0..5 {
        session.compare_and_swap(&id, rev, rev + 1, DEFAULT_PAYLOAD).unwrap();
    }

    let (report, _) = race(&RaceConfig::new(3, Duration::ZERO, 8), |_| Ok(&session), io::sink());

    assert_eq!(report.successes(), 3);
    let lowest = successes(&report).iter().map(|r| r.observed_revision).min();
    assert_eq!(lowest, Some(5));
    assert_eq!(current_revision(&session), 8);
}

/// A target at or below the current revision makes no attempts
#[test]
fn test_target_already_passed() {
    let cluster = create_cluster();
    let session = create_session(&cluster, RetryPolicyKind::StatementLevel);
    session.compare_and_swap(&RecordId::default(), 0, 1, DEFAULT_PAYLOAD).unwrap();

    let (report, _) = race(&RaceConfig::new(4, Duration::ZERO, 1), |_| Ok(&session), io::sink());

    assert!(report.is_clean());
    assert_eq!(report.attempts(), 0);
    assert_eq!(report.collector.completed.len(), 4);
}

/// The startup delay is slept once, not per attempt
#[test]
fn test_startup_delay_is_one_shot() {
    let cluster = create_cluster();
    let session = create_session(&cluster, RetryPolicyKind::StatementLevel);

    let started = std::time::Instant::now();
    let (report, _) = race(
        &RaceConfig::new(1, Duration::from_millis(50), 20),
        |_| Ok(&session),
        io::sink(),
    );

    assert_eq!(report.successes(), 20);
    // 20 delays would take a full second.
    assert!(started.elapsed() < Duration::from_millis(900));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Any number of workers drives the record exactly to the target
    #[test]
    fn prop_progress_over_worker_counts(workers in 1usize..8, target in 0u64..25) {
        let cluster = create_cluster();
        let session = create_session(&cluster, RetryPolicyKind::StatementLevel);

        let (report, _) = race(&RaceConfig::new(workers, Duration::ZERO, target), |_| Ok(&session), io::sink());

        prop_assert!(report.is_clean());
        prop_assert_eq!(report.successes(), target);
        prop_assert_eq!(current_revision(&session), target);
        for summary in report.summaries() {
            prop_assert_eq!(summary.final_revision, target);
        }

        let mut per_revision: BTreeMap<u64, usize> = BTreeMap::new();
        for record in successes(&report) {
            *per_revision.entry(record.attempted_revision).or_default() += 1;
        }
        prop_assert!(per_revision.values().all(|&n| n == 1));
        prop_assert_eq!(per_revision.len() as u64, target);
    }
}
