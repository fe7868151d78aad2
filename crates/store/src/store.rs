//! The revision store contract consumed by the race engine

use casrace_core::{CasOutcome, Record, RecordId, Revision, StoreResult};
use std::sync::Arc;

/// Read / create / compare-and-swap over revision-guarded records
///
/// All serialization of concurrent updates is delegated to
/// [`compare_and_swap`](RevisionStore::compare_and_swap); callers take no
/// locks of their own.
pub trait RevisionStore: Send + Sync {
    /// Current committed row of `id`: revision, metadata and payload
    ///
    /// Fails with [`StoreError::NotFound`](casrace_core::StoreError::NotFound)
    /// when no record exists.
    fn fetch(&self, id: &RecordId) -> StoreResult<Record>;

    /// Current committed revision of `id`
    fn read(&self, id: &RecordId) -> StoreResult<Revision> {
        self.fetch(id).map(|record| record.revision)
    }

    /// Write the record without any conditional check
    ///
    /// Returns `true` when the write completed without error.
    fn create(&self, id: &RecordId, revision: Revision, payload: &[u8]) -> StoreResult<bool>;

    /// Install `new` if the stored revision equals `expected`
    ///
    /// A write timeout that survives the retry policy comes back as
    /// [`CasOutcome::WriteTimeout`]; the update may or may not have landed.
    fn compare_and_swap(
        &self,
        id: &RecordId,
        expected: Revision,
        new: Revision,
        payload: &[u8],
    ) -> StoreResult<CasOutcome>;
}

impl<T: RevisionStore + ?Sized> RevisionStore for Arc<T> {
    fn fetch(&self, id: &RecordId) -> StoreResult<Record> {
        (**self).fetch(id)
    }

    fn read(&self, id: &RecordId) -> StoreResult<Revision> {
        (**self).read(id)
    }

    fn create(&self, id: &RecordId, revision: Revision, payload: &[u8]) -> StoreResult<bool> {
        (**self).create(id, revision, payload)
    }

    fn compare_and_swap(
        &self,
        id: &RecordId,
        expected: Revision,
        new: Revision,
        payload: &[u8],
    ) -> StoreResult<CasOutcome> {
        (**self).compare_and_swap(id, expected, new, payload)
    }
}

impl<T: RevisionStore + ?Sized> RevisionStore for &T {
    fn fetch(&self, id: &RecordId) -> StoreResult<Record> {
        (**self).fetch(id)
    }

    fn read(&self, id: &RecordId) -> StoreResult<Revision> {
        (**self).read(id)
    }

    fn create(&self, id: &RecordId, revision: Revision, payload: &[u8]) -> StoreResult<bool> {
        (**self).create(id, revision, payload)
    }

    fn compare_and_swap(
        &self,
        id: &RecordId,
        expected: Revision,
        new: Revision,
        payload: &[u8],
    ) -> StoreResult<CasOutcome> {
        (**self).compare_and_swap(id, expected, new, payload)
    }
}
