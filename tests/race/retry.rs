//! Retry Policy Tests
//!
//! The two policies differ only in the level a retry is issued at. The
//! cluster's issue log makes that level observable.

use crate::*;
use casrace_concurrency::{relay, RaceConfig};
use casrace_core::{CasOutcome, ConsistencyLevel, FailureKind, StoreError};
use casrace_store::{InjectedFault, IssuedStatement, StatementKind, MAX_RETRIES};
use proptest::prelude::*;
use std::io;
use std::time::Duration;

fn cas_issues(cluster: &SimulatedCluster) -> Vec<IssuedStatement> {
    cluster
        .issued()
        .into_iter()
        .filter(|s| s.kind == StatementKind::Cas)
        .collect()
}

/// Run one worker to revision 1 after scripting `fault` on its first CAS
fn race_through_fault(kind: RetryPolicyKind, fault: InjectedFault) -> Vec<IssuedStatement> {
    let cluster = create_cluster();
    let session = create_session(&cluster, kind);
    cluster.clear_issued();
    cluster.faults().push(fault);

    let (report, _) = relay(&session, &RaceConfig::new(1, Duration::ZERO, 1), io::sink());
    assert!(report.is_clean());
    assert_eq!(report.successes(), 1);
    cas_issues(&cluster)
}

/// A timed-out CAS is retried at QUORUM by the statement-level policy and
/// at SERIAL by the callback-level policy
#[test]
fn test_cas_write_timeout_retry_level_diverges() {
    let fault = InjectedFault::write_timeout().on(StatementKind::Cas);

    let statement = race_through_fault(RetryPolicyKind::StatementLevel, fault);
    let callback = race_through_fault(RetryPolicyKind::CallbackLevel, fault);

    assert_eq!(statement.len(), 2);
    assert_eq!(callback.len(), 2);
    assert_eq!(statement[0].consistency, ConsistencyLevel::Quorum);
    assert_eq!(callback[0].consistency, ConsistencyLevel::Quorum);
    assert_eq!(statement[1].consistency, ConsistencyLevel::Quorum);
    assert_eq!(callback[1].consistency, ConsistencyLevel::Serial);
    assert!(callback.iter().all(|s| s.configured == ConsistencyLevel::Quorum));
}

/// Whatever level the callback reports is what the callback policy retries at
#[test]
fn test_callback_policy_follows_injected_level() {
    let fault = InjectedFault::write_timeout()
        .on(StatementKind::Cas)
        .reported_at(ConsistencyLevel::One);

    let statement = race_through_fault(RetryPolicyKind::StatementLevel, fault);
    let callback = race_through_fault(RetryPolicyKind::CallbackLevel, fault);

    assert_eq!(statement[1].consistency, ConsistencyLevel::Quorum);
    assert_eq!(callback[1].consistency, ConsistencyLevel::One);
}

/// Read timeouts are retried at the statement level by both policies when
/// the callback reports the issued level
#[test]
fn test_read_timeout_retry_level() {
    for kind in [RetryPolicyKind::StatementLevel, RetryPolicyKind::CallbackLevel] {
        let cluster = create_cluster();
        let session = create_session(&cluster, kind);
        cluster.clear_issued();
        cluster
            .faults()
            .push(InjectedFault::read_timeout().on(StatementKind::Select));

        assert_eq!(current_revision(&session), 0);
        let issued = cluster.issued();
        assert_eq!(issued.len(), 2);
        assert_eq!(issued[1].consistency, ConsistencyLevel::Quorum, "policy {}", kind);
    }
}

/// A CAS that times out on every retry surfaces as a WriteTimeout outcome
/// and the worker re-reads before trying again
#[test]
fn test_exhausted_write_timeout_is_an_outcome() {
    let cluster = create_cluster();
    let session = create_session(&cluster, RetryPolicyKind::StatementLevel);
    cluster
        .faults()
        .push_n(InjectedFault::write_timeout().on(StatementKind::Cas), MAX_RETRIES as usize + 1);

    let (report, _) = relay(&session, &RaceConfig::new(1, Duration::ZERO, 1), io::sink());

    let outcomes: Vec<_> = report.collector.records.iter().map(|r| r.outcome).collect();
    assert_eq!(outcomes, vec![CasOutcome::WriteTimeout, CasOutcome::Success]);
    assert_eq!(current_revision(&session), 1);
}

/// Losing quorum is fatal for the worker, under either policy
#[test]
fn test_unavailable_escalates_as_fatal() {
    for kind in [RetryPolicyKind::StatementLevel, RetryPolicyKind::CallbackLevel] {
        let cluster = create_cluster();
        let session = create_session(&cluster, kind);
        cluster.set_live_replicas(1);
        cluster.clear_issued();

        let (report, _) = relay(&session, &RaceConfig::new(1, Duration::ZERO, 3), io::sink());

        let errors: Vec<_> = report.errors().collect();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].is_fatal());
        match errors[0].store_error() {
            Some(StoreError::RetriesExhausted { failure, retries }) => {
                assert_eq!(failure.kind, FailureKind::Unavailable);
                assert_eq!(*retries, MAX_RETRIES);
            }
            other => panic!("unexpected error: {:?}", other),
        }
        // First try plus three retries of the initial read.
        assert_eq!(cluster.issued().len(), MAX_RETRIES as usize + 1);
        assert_eq!(report.collector.completed.len(), 1);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Up to three transient failures are absorbed; the fourth escalates
    #[test]
    fn prop_retry_bound(failures in 0usize..8, callback in any::<bool>()) {
        let kind = if callback { RetryPolicyKind::CallbackLevel } else { RetryPolicyKind::StatementLevel };
        let cluster = create_cluster();
        let session = create_session(&cluster, kind);
        cluster.clear_issued();
        cluster
            .faults()
            .push_n(InjectedFault::read_timeout().on(StatementKind::Select), failures);

        let result = session.read(&RecordId::default());
        let absorbed = failures <= MAX_RETRIES as usize;

        prop_assert_eq!(result.is_ok(), absorbed);
        let expected_issues = if absorbed { failures + 1 } else { MAX_RETRIES as usize + 1 };
        prop_assert_eq!(cluster.issued().len(), expected_issues);
        prop_assert_eq!(cluster.faults().pending(), failures - failures.min(MAX_RETRIES as usize + 1));
    }
}
