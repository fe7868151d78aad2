//! Create Tests
//!
//! `create` is a plain insert: no conditional check, and running it on an
//! existing record never rewinds an advanced revision.

use crate::*;
use casrace_concurrency::{race, RaceConfig};
use casrace_core::{Record, StoreError};
use casrace_store::{InjectedFault, StatementKind};
use std::io;
use std::time::Duration;

/// Create on an empty cluster writes revision 0 with the default row
#[test]
fn test_create_fresh_record() {
    let cluster = create_cluster();
    let session = Session::connect(Arc::clone(&cluster), SessionConfig::default());
    let id = RecordId::default();

    assert!(session.create(&id, 0, DEFAULT_PAYLOAD).unwrap());
    assert_eq!(session.fetch(&id).unwrap(), Record::default());
}

/// Create issues a single plain insert, never a conditional update
#[test]
fn test_create_is_unconditional() {
    let cluster = create_cluster();
    let session = Session::connect(Arc::clone(&cluster), SessionConfig::default());

    session.create(&RecordId::default(), 0, DEFAULT_PAYLOAD).unwrap();

    let issued = cluster.issued();
    assert_eq!(issued.len(), 1);
    assert_eq!(issued[0].kind, StatementKind::Insert);
    assert_eq!(cluster.cas_commits(), 0);
}

/// Creating again after a race keeps the advanced revision
#[test]
fn test_create_is_idempotent() {
    let cluster = create_cluster();
    let session = create_session(&cluster, RetryPolicyKind::StatementLevel);

    let (report, _) = race(&RaceConfig::new(3, Duration::ZERO, 7), |_| Ok(&session), io::sink());
    assert_eq!(report.successes(), 7);

    let id = RecordId::default();
    assert!(session.create(&id, 0, b"again").unwrap());
    assert!(session.create(&id, 0, b"again").unwrap());

    let row = session.fetch(&id).unwrap();
    assert_eq!(row.revision, 7);
    assert_eq!(row.payload, b"again".to_vec());
}

/// An insert that times out past the retry bound is an error, not fatal
#[test]
fn test_create_write_timeout_escalates() {
    let cluster = create_cluster();
    let session = Session::connect(Arc::clone(&cluster), SessionConfig::default());
    cluster
        .faults()
        .push_n(InjectedFault::write_timeout().on(StatementKind::Insert), 4);

    let err = session.create(&RecordId::default(), 0, DEFAULT_PAYLOAD).unwrap_err();
    assert!(matches!(err, StoreError::RetriesExhausted { .. }));
    assert!(!err.is_fatal());
}

/// An insert whose timeout is absorbed by a retry still reports success
#[test]
fn test_create_survives_one_timeout() {
    let cluster = create_cluster();
    let session = Session::connect(Arc::clone(&cluster), SessionConfig::default());
    cluster
        .faults()
        .push(InjectedFault::write_timeout().on(StatementKind::Insert).applied());

    assert!(session.create(&RecordId::default(), 0, DEFAULT_PAYLOAD).unwrap());
    assert_eq!(current_revision(&session), 0);
}
