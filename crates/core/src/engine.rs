//! Store engine contract
//!
//! The minimal surface every federated backend must expose. An engine manages
//! a sorted mapping from store-local keys to resource payloads; it never sees
//! the global scope space. The registry strips scopes from incoming filters
//! and re-encodes local keys on the way out.
//!
//! `select_entries` returns a lazy, single-pass stream sorted ascending by the
//! store's native order. Consumers may stop pulling at any point; dropping the
//! iterator releases backend resources (cursors, locks) without completing the
//! sequence.

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;

/// Store-internal key
///
/// Positive, minted by the owning store at insertion time, monotonically
/// increasing per store, never reused after deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LocalKey(u64);

impl LocalKey {
    /// Wrap a raw key value
    #[inline]
    pub const fn new(raw: u64) -> Self {
        LocalKey(raw)
    }

    /// Raw key value
    #[inline]
    pub const fn as_raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for LocalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lazy, finite, single-pass stream of matching entries
///
/// Entries arrive sorted ascending by the store's native order (local key for
/// description stores, phenomenon time then key for observation stores).
/// The stream owns whatever it needs (snapshots, shared handles) rather than
/// borrowing the engine, so the federation can hold streams from several
/// stores at once. Dropping the iterator early is the supported abandonment
/// path and must release backend resources.
pub type EntryIter<R> = Box<dyn Iterator<Item = Result<(LocalKey, R)>> + Send>;

/// Contract every pluggable per-store backend satisfies
///
/// Implementations handle their own internal locking; callers never hold a
/// lock spanning two engines, which is what keeps cross-store transactions
/// out of scope.
pub trait StoreEngine: Send + Sync {
    /// Resource payload type managed by this engine
    type Record;
    /// Filter type understood by this engine
    type Filter;

    /// Insert a record, minting the next local key
    ///
    /// Fails with `ReadOnly` on a read-only store and with `Conflict` if the
    /// record's identity (e.g. UID) already exists.
    fn add(&self, record: Self::Record) -> Result<LocalKey>;

    /// Fetch one record by local key, `None` if absent
    fn get(&self, key: LocalKey) -> Result<Option<Self::Record>>;

    /// Stream all entries matching `filter` in the store's native ascending order
    fn select_entries(&self, filter: &Self::Filter) -> Result<EntryIter<Self::Record>>;

    /// Count matching entries
    ///
    /// Must not materialize the full result set when the filter is
    /// unconstrained; implementations short-circuit on index statistics.
    fn count_matching(&self, filter: &Self::Filter) -> Result<u64>;

    /// Bulk-delete matching entries, returning the number actually removed
    ///
    /// A filter matching zero rows returns `Ok(0)`, never an error.
    fn remove_entries(&self, filter: &Self::Filter) -> Result<u64>;

    /// True when every mutator fails with `ReadOnly`
    fn is_read_only(&self) -> bool {
        false
    }
}

/// Read-only view over an engine, or an empty stand-in
///
/// Wrapping delegates reads and rejects every mutator. `empty()` is the
/// standard substitute for backends that do not support a record kind: all
/// reads come back empty, all writes fail.
pub struct ReadOnlyStore<E: StoreEngine> {
    inner: Option<E>,
    _marker: PhantomData<fn() -> E>,
}

impl<E: StoreEngine> ReadOnlyStore<E> {
    /// Wrap an engine, exposing only its read side
    pub fn wrap(inner: E) -> Self {
        ReadOnlyStore {
            inner: Some(inner),
            _marker: PhantomData,
        }
    }

    /// Stand-in with no backing data
    pub fn empty() -> Self {
        ReadOnlyStore {
            inner: None,
            _marker: PhantomData,
        }
    }
}

impl<E: StoreEngine> StoreEngine for ReadOnlyStore<E>
where
    E::Record: 'static,
{
    type Record = E::Record;
    type Filter = E::Filter;

    fn add(&self, _record: Self::Record) -> Result<LocalKey> {
        Err(CoreError::ReadOnly("add".to_string()))
    }

    fn get(&self, key: LocalKey) -> Result<Option<Self::Record>> {
        match &self.inner {
            Some(engine) => engine.get(key),
            None => Ok(None),
        }
    }

    fn select_entries(&self, filter: &Self::Filter) -> Result<EntryIter<Self::Record>> {
        match &self.inner {
            Some(engine) => engine.select_entries(filter),
            None => Ok(Box::new(std::iter::empty())),
        }
    }

    fn count_matching(&self, filter: &Self::Filter) -> Result<u64> {
        match &self.inner {
            Some(engine) => engine.count_matching(filter),
            None => Ok(0),
        }
    }

    fn remove_entries(&self, _filter: &Self::Filter) -> Result<u64> {
        Err(CoreError::ReadOnly("remove_entries".to_string()))
    }

    fn is_read_only(&self) -> bool {
        true
    }
}
