//! Facade Tests
//!
//! The `CasRace` harness as the CLI drives it: one operation per process,
//! rows carried between processes in a state file.

use casrace::prelude::*;
use std::io;

fn harness(kind: RetryPolicyKind) -> CasRace {
    CasRace::builder()
        .retry_policy(kind)
        .open()
        .expect("Failed to open harness")
}

/// read → create → cas → cas → cas, as separate commands
#[test]
fn test_single_operations() {
    let h = harness(RetryPolicyKind::StatementLevel);

    assert!(h.read().unwrap_err().is_not_found());
    assert!(h.create().unwrap());
    assert_eq!(h.read().unwrap(), 0);
    assert_eq!(h.cas().unwrap(), (0, CasOutcome::Success));
    assert_eq!(h.cas_thread().unwrap(), (1, CasOutcome::Success));
    assert_eq!(h.read_main_then_cas_thread().unwrap(), (2, CasOutcome::Success));
    assert_eq!(h.read().unwrap(), 3);
}

/// CAS without a record reports NoRow rather than failing
#[test]
fn test_cas_without_record() {
    let h = harness(RetryPolicyKind::StatementLevel);
    // The read comes first and fails.
    assert!(h.cas().unwrap_err().is_not_found());
    let outcome = h
        .session()
        .compare_and_swap(h.record_id(), 0, 1, casrace::DEFAULT_PAYLOAD)
        .unwrap();
    assert_eq!(outcome, CasOutcome::NoRow);
}

/// `race` creates the record when it is missing
#[test]
fn test_race_creates_record() {
    for kind in [RetryPolicyKind::StatementLevel, RetryPolicyKind::CallbackLevel] {
        let h = harness(kind);
        let (report, _) = h
            .race(&RaceConfig::new(5, Duration::ZERO, 10), io::sink())
            .unwrap();
        assert_eq!(report.successes(), 10);
        assert_eq!(h.read().unwrap(), 10);
    }
}

/// `race-sessions` opens one session per worker on the same cluster
#[test]
fn test_race_sessions() {
    let h = harness(RetryPolicyKind::CallbackLevel);
    h.create().unwrap();

    let config = RaceConfig::new(4, Duration::from_millis(5), 12).stop_condition(StopCondition::AllWorkers);
    let (report, _) = h.race_sessions(&config, io::sink()).unwrap();

    assert!(report.is_clean());
    assert_eq!(report.successes(), 12);
    assert_eq!(h.cluster().cas_commits(), 12);
}

/// `relay` prints `[success, n, n+1, 0, pid]` for each step
#[test]
fn test_relay_output() {
    let h = harness(RetryPolicyKind::StatementLevel);
    h.create().unwrap();

    let (_, out) = h
        .relay(3, Duration::ZERO, OutputFormat::Human, Vec::new())
        .unwrap();

    let pid = std::process::id();
    let expected: String = (0..3)
        .map(|n| format!("[success, {}, {}, 0, {}]\n", n, n + 1, pid))
        .collect();
    assert_eq!(String::from_utf8(out).unwrap(), expected);
}

/// `relay` drives the record the harness was opened on
#[test]
fn test_relay_on_custom_record() {
    let h = CasRace::builder()
        .retry_policy(RetryPolicyKind::StatementLevel)
        .record_id("other-row")
        .open()
        .unwrap();
    h.create().unwrap();

    let (report, _) = h.relay(3, Duration::ZERO, OutputFormat::Human, io::sink()).unwrap();

    assert!(report.is_clean(), "{:?}", report.errors().collect::<Vec<_>>());
    assert_eq!(h.read().unwrap(), 3);
    assert!(h
        .session()
        .read(&RecordId::default())
        .unwrap_err()
        .is_not_found());
}

/// Rows saved at the top revision refuse a further single CAS
#[test]
fn test_cas_from_maximum_revision() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cluster.json");

    let first = CasRace::builder().state_file(&path).open().unwrap();
    first
        .session()
        .create(first.record_id(), Revision::MAX, casrace::DEFAULT_PAYLOAD)
        .unwrap();
    first.save_state().unwrap();

    let second = CasRace::builder().state_file(&path).open().unwrap();
    assert_eq!(second.read().unwrap(), Revision::MAX);
    assert!(matches!(
        second.cas_thread().unwrap_err(),
        Error::Store(casrace::StoreError::RevisionOverflow(_))
    ));
}

/// Rows survive between harnesses through the state file
#[test]
fn test_state_file_between_processes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cluster.json");

    let first = CasRace::builder().state_file(&path).open().unwrap();
    first.create().unwrap();
    first.save_state().unwrap();

    let second = CasRace::builder().state_file(&path).open().unwrap();
    second
        .race(&RaceConfig::new(2, Duration::ZERO, 5), io::sink())
        .unwrap();
    second.save_state().unwrap();

    let third = CasRace::builder().state_file(&path).open().unwrap();
    assert_eq!(third.read().unwrap(), 5);
}

/// Too few live replicas makes every operation fatal
#[test]
fn test_lost_quorum_is_fatal() {
    let h = CasRace::builder()
        .retry_policy(RetryPolicyKind::StatementLevel)
        .live_replicas(1)
        .open()
        .unwrap();

    let err = h.read().unwrap_err();
    assert!(err.is_fatal());
    assert!(!err.is_not_found());
}
