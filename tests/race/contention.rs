//! Contention Tests
//!
//! Many workers racing on one record: the store's CAS is the only arbiter.

use crate::*;
use casrace_concurrency::{race, RaceConfig};
use casrace_core::{CasOutcome, WorkerId};
use std::collections::{BTreeSet, HashMap};
use std::io;
use std::time::Duration;

/// Check the race invariants on a finished report
fn assert_race_invariants(report: &RaceReport, target: u64) {
    let wins = successes(report);

    // At most one success per attempted revision, and no gaps.
    let committed: BTreeSet<u64> = wins.iter().map(|r| r.attempted_revision).collect();
    assert_eq!(committed.len(), wins.len(), "a revision was won twice");
    assert_eq!(committed, (1..=target).collect::<BTreeSet<_>>());

    // Each worker's own wins arrive in increasing order.
    let mut last: HashMap<WorkerId, u64> = HashMap::new();
    for record in &wins {
        let prev = last.insert(record.worker, record.attempted_revision);
        if let Some(prev) = prev {
            assert!(prev < record.attempted_revision, "worker {} went backwards", record.worker);
        }
    }

    // Every attempt moves exactly one revision forward.
    for record in &report.collector.records {
        assert_eq!(record.attempted_revision, record.observed_revision + 1);
    }
}

/// Five workers, target 10: exactly ten successes, conflicts for the rest
#[test]
fn test_five_workers_ten_successes() {
    let cluster = create_cluster();
    let session = create_session(&cluster, RetryPolicyKind::StatementLevel);

    let (report, _) = race(&RaceConfig::new(5, Duration::ZERO, 10), |_| Ok(&session), io::sink());

    assert!(report.is_clean());
    assert_eq!(report.successes(), 10);
    assert_race_invariants(&report, 10);

    let conflicts = report
        .collector
        .records
        .iter()
        .filter(|r| r.outcome == CasOutcome::Conflict)
        .count() as u64;
    assert_eq!(conflicts, report.attempts() - 10);
    assert_eq!(cluster.cas_commits(), 10);
    assert_eq!(current_revision(&session), 10);
}

/// Per-worker sessions give the same guarantees as a shared one
#[test]
fn test_race_sessions() {
    let cluster = create_cluster();
    let session = create_session(&cluster, RetryPolicyKind::StatementLevel);

    let (report, _) = race(
        &RaceConfig::new(6, Duration::from_millis(5), 30),
        |_| {
            Ok(Session::connect(
                Arc::clone(&cluster),
                SessionConfig::with_retry_policy(RetryPolicyKind::StatementLevel),
            ))
        },
        io::sink(),
    );

    assert!(report.is_clean());
    assert_race_invariants(&report, 30);
    assert_eq!(current_revision(&session), 30);
}

/// Timed-out writes, some of which landed, never produce a double commit
#[test]
fn test_write_timeouts_do_not_double_commit() {
    let cluster = create_cluster();
    let session = create_session(&cluster, RetryPolicyKind::StatementLevel);
    cluster.faults().set_write_timeout_rate(0.3);

    let (report, _) = race(&RaceConfig::new(4, Duration::ZERO, 25), |_| Ok(&session), io::sink());
    cluster.faults().set_write_timeout_rate(0.0);

    assert!(report.is_clean());
    assert_eq!(current_revision(&session), 25);
    assert_eq!(cluster.cas_commits(), 25);

    // A landed-but-timed-out write is reported as something other than
    // success, so reported wins can fall short of the target but never
    // exceed it or repeat a revision.
    let wins = successes(&report);
    let committed: BTreeSet<u64> = wins.iter().map(|r| r.attempted_revision).collect();
    assert_eq!(committed.len(), wins.len());
    assert!(wins.len() <= 25);
}
