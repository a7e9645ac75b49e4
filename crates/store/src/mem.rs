//! In-memory store engines
//!
//! Reference backends over sorted maps. Records are held in encoded form so
//! the envelope codec is exercised on every read path, not just on disk
//! backends; decoding happens lazily as the caller pulls the entry stream.
//!
//! Three structures per description store:
//! - `entries`: local key to envelope bytes, the source of truth
//! - `uid_index`: unique-identifier lookup, enforcing UID uniqueness
//! - `text_index`: inverted keyword index over name and description
//!
//! The observation store swaps the uid and text indexes for a
//! `(phenomenon time, key)` index so selection streams in time order.
//!
//! Locking is per-structure `parking_lot::RwLock`; writers take the locks in
//! declaration order. `select_entries` snapshots the candidate bytes under a
//! read lock and decodes outside it, so a long-lived stream never blocks
//! writers.

use obshub_core::{
    CoreError, EntryIter, Feature, LocalKey, ObsFilter, ObsRecord, Resource, ResourceFilter,
    Result, StoreEngine, SystemDesc, Timestamp,
};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use crate::codec::{feature_codec, obs_codec, system_codec, VersionedCodec};
use crate::text_index::TextIndex;

/// In-memory engine for description-style resources
///
/// Generic over the payload; [`MemSystemStore`] and [`MemFeatureStore`] are
/// the shipped instantiations.
pub struct MemResourceStore<R> {
    entries: RwLock<BTreeMap<LocalKey, Vec<u8>>>,
    uid_index: RwLock<BTreeMap<String, LocalKey>>,
    text_index: TextIndex,
    next_key: AtomicU64,
    codec: VersionedCodec<R>,
}

/// In-memory system description store
pub type MemSystemStore = MemResourceStore<SystemDesc>;
/// In-memory sampling feature store
pub type MemFeatureStore = MemResourceStore<Feature>;

impl<R> MemResourceStore<R> {
    /// Create an empty store around `codec`
    pub fn new(codec: VersionedCodec<R>) -> Self {
        MemResourceStore {
            entries: RwLock::new(BTreeMap::new()),
            uid_index: RwLock::new(BTreeMap::new()),
            text_index: TextIndex::new(),
            next_key: AtomicU64::new(1),
            codec,
        }
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// True when the store holds no records
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Local key registered for `uid`, if any
    pub fn key_of_uid(&self, uid: &str) -> Option<LocalKey> {
        self.uid_index.read().get(uid).copied()
    }
}

impl Default for MemSystemStore {
    fn default() -> Self {
        Self::new(system_codec())
    }
}

impl Default for MemFeatureStore {
    fn default() -> Self {
        Self::new(feature_codec())
    }
}

impl<R: Resource> MemResourceStore<R> {
    /// Candidate `(key, bytes)` pairs in ascending key order
    ///
    /// Explicit id sets and text-only filters resolve through their indexes;
    /// everything else falls back to a full scan. Payload predicates are
    /// applied later, against the decoded record.
    fn candidates(&self, filter: &ResourceFilter<R>) -> Vec<(LocalKey, Vec<u8>)> {
        let entries = self.entries.read();
        if let Some(ids) = filter.ids().explicit() {
            ids.iter()
                .map(|id| LocalKey::new(id.as_raw()))
                .filter_map(|key| entries.get(&key).map(|bytes| (key, bytes.clone())))
                .collect()
        } else if let Some(text) = filter.full_text() {
            self.text_index
                .select_keys(text)
                .into_iter()
                .filter_map(|key| entries.get(&key).map(|bytes| (key, bytes.clone())))
                .collect()
        } else {
            entries
                .iter()
                .map(|(key, bytes)| (*key, bytes.clone()))
                .collect()
        }
    }
}

impl<R> StoreEngine for MemResourceStore<R>
where
    R: Resource + Send + Sync + 'static,
{
    type Record = R;
    type Filter = ResourceFilter<R>;

    fn add(&self, record: R) -> Result<LocalKey> {
        let bytes = self.codec.encode(&record)?;
        let mut entries = self.entries.write();
        let mut uid_index = self.uid_index.write();
        if let Some(uid) = record.uid() {
            if uid_index.contains_key(uid) {
                return Err(CoreError::Conflict(format!("uid already registered: {uid}")));
            }
        }
        let key = LocalKey::new(self.next_key.fetch_add(1, Ordering::SeqCst));
        entries.insert(key, bytes);
        if let Some(uid) = record.uid() {
            uid_index.insert(uid.to_string(), key);
        }
        self.text_index.add(key, &record);
        debug!(%key, "record added");
        Ok(key)
    }

    fn get(&self, key: LocalKey) -> Result<Option<R>> {
        match self.entries.read().get(&key) {
            Some(bytes) => Ok(Some(self.codec.decode(bytes)?)),
            None => Ok(None),
        }
    }

    fn select_entries(&self, filter: &ResourceFilter<R>) -> Result<EntryIter<R>> {
        let candidates = self.candidates(filter);
        let limit = filter.limit().unwrap_or(usize::MAX);
        let filter = filter.clone();
        let codec = self.codec.clone();
        let iter = candidates
            .into_iter()
            .filter_map(move |(key, bytes)| match codec.decode(&bytes) {
                Ok(record) => filter.test(&record).then_some(Ok((key, record))),
                Err(err) => Some(Err(err)),
            })
            .take(limit);
        Ok(Box::new(iter))
    }

    fn count_matching(&self, filter: &ResourceFilter<R>) -> Result<u64> {
        if filter.is_unconstrained() {
            let len = self.entries.read().len();
            return Ok(filter.limit().map_or(len, |l| len.min(l)) as u64);
        }
        let mut count = 0u64;
        for entry in self.select_entries(filter)? {
            entry?;
            count += 1;
        }
        Ok(count)
    }

    fn remove_entries(&self, filter: &ResourceFilter<R>) -> Result<u64> {
        let mut entries = self.entries.write();
        let mut uid_index = self.uid_index.write();
        let limit = filter.limit().unwrap_or(usize::MAX);
        let mut doomed = Vec::new();
        for (key, bytes) in entries.iter() {
            if doomed.len() >= limit {
                break;
            }
            if !filter.ids().matches_key(*key) {
                continue;
            }
            let record: R = self.codec.decode(bytes)?;
            if filter.test(&record) {
                doomed.push((*key, record));
            }
        }
        for (key, record) in &doomed {
            entries.remove(key);
            if let Some(uid) = record.uid() {
                uid_index.remove(uid);
            }
            self.text_index.remove(*key, record);
        }
        if !doomed.is_empty() {
            debug!(removed = doomed.len(), "records removed");
        }
        Ok(doomed.len() as u64)
    }
}

/// In-memory observation store
///
/// Entries stream in `(phenomenon time, key)` order; a time window on the
/// filter narrows the index range scanned instead of post-filtering.
pub struct MemObsStore {
    entries: RwLock<BTreeMap<LocalKey, Vec<u8>>>,
    time_index: RwLock<BTreeSet<(Timestamp, LocalKey)>>,
    next_key: AtomicU64,
    codec: VersionedCodec<ObsRecord>,
}

impl MemObsStore {
    /// Create an empty observation store around `codec`
    pub fn new(codec: VersionedCodec<ObsRecord>) -> Self {
        MemObsStore {
            entries: RwLock::new(BTreeMap::new()),
            time_index: RwLock::new(BTreeSet::new()),
            next_key: AtomicU64::new(1),
            codec,
        }
    }

    /// Number of stored observations
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// True when the store holds no observations
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn candidates(&self, filter: &ObsFilter) -> Vec<(LocalKey, Vec<u8>)> {
        let entries = self.entries.read();
        let index = self.time_index.read();
        let scan: Box<dyn Iterator<Item = &(Timestamp, LocalKey)>> =
            match filter.phenomenon_time() {
                Some(window) => Box::new(index.range((
                    Bound::Included((window.begin(), LocalKey::new(0))),
                    Bound::Included((window.end(), LocalKey::new(u64::MAX))),
                ))),
                None => Box::new(index.iter()),
            };
        scan.filter(|(_, key)| filter.ids().matches_key(*key))
            .filter_map(|(_, key)| entries.get(key).map(|bytes| (*key, bytes.clone())))
            .collect()
    }
}

impl Default for MemObsStore {
    fn default() -> Self {
        Self::new(obs_codec())
    }
}

impl StoreEngine for MemObsStore {
    type Record = ObsRecord;
    type Filter = ObsFilter;

    fn add(&self, record: ObsRecord) -> Result<LocalKey> {
        let bytes = self.codec.encode(&record)?;
        let mut entries = self.entries.write();
        let mut time_index = self.time_index.write();
        let key = LocalKey::new(self.next_key.fetch_add(1, Ordering::SeqCst));
        entries.insert(key, bytes);
        time_index.insert((record.phenomenon_time, key));
        Ok(key)
    }

    fn get(&self, key: LocalKey) -> Result<Option<ObsRecord>> {
        match self.entries.read().get(&key) {
            Some(bytes) => Ok(Some(self.codec.decode(bytes)?)),
            None => Ok(None),
        }
    }

    fn select_entries(&self, filter: &ObsFilter) -> Result<EntryIter<ObsRecord>> {
        let candidates = self.candidates(filter);
        let limit = filter.limit().unwrap_or(usize::MAX);
        let filter = filter.clone();
        let codec = self.codec.clone();
        let iter = candidates
            .into_iter()
            .filter_map(move |(key, bytes)| match codec.decode(&bytes) {
                Ok(record) => filter.test(&record).then_some(Ok((key, record))),
                Err(err) => Some(Err(err)),
            })
            .take(limit);
        Ok(Box::new(iter))
    }

    fn count_matching(&self, filter: &ObsFilter) -> Result<u64> {
        if filter.is_unconstrained() {
            let len = self.entries.read().len();
            return Ok(filter.limit().map_or(len, |l| len.min(l)) as u64);
        }
        let mut count = 0u64;
        for entry in self.select_entries(filter)? {
            entry?;
            count += 1;
        }
        Ok(count)
    }

    fn remove_entries(&self, filter: &ObsFilter) -> Result<u64> {
        let mut entries = self.entries.write();
        let mut time_index = self.time_index.write();
        let limit = filter.limit().unwrap_or(usize::MAX);
        let mut doomed = Vec::new();
        for (key, bytes) in entries.iter() {
            if doomed.len() >= limit {
                break;
            }
            if !filter.ids().matches_key(*key) {
                continue;
            }
            let record: ObsRecord = self.codec.decode(bytes)?;
            if filter.test(&record) {
                doomed.push((*key, record.phenomenon_time));
            }
        }
        for (key, time) in &doomed {
            entries.remove(key);
            time_index.remove(&(*time, *key));
        }
        if !doomed.is_empty() {
            debug!(removed = doomed.len(), "observations removed");
        }
        Ok(doomed.len() as u64)
    }
}
