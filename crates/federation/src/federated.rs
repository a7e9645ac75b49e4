//! Federated store views over the registry
//!
//! [`FederatedDatabase`] presents the whole federation as one database: reads
//! fan out to every relevant store, re-encode local keys into the global id
//! space and k-way merge the per-store streams, so results arrive in global
//! order without materializing any store's full output.
//!
//! Filters cross the boundary in two steps. The id selector is partitioned by
//! scope and re-expressed in each store's local key space; a descriptive
//! system sub-filter on observations is first resolved to an explicit global
//! id set by querying the system stores, so engines only ever evaluate ids.
//!
//! A failing store is handled per [`ReadFailurePolicy`]: fail-fast aborts the
//! operation with a [`CoreError::Backend`] naming the store, degrade-and-log
//! drops the store from the result and raises the stream's degraded flag.

use crate::merge::MergeSorted;
use crate::registry::{FederationConfig, FederationRegistry, ReadFailurePolicy, StoreBundle};
use obshub_core::{
    CoreError, EntryIter, Feature, IdSelector, ObsFilter, ObsRecord, Resource, ResourceFilter,
    Result, ScopedId, StoreEngine, SystemDesc, SystemFilter,
};
use smallvec::SmallVec;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::warn;

/// Shared marker raised when a degraded read dropped at least one store
///
/// Cloned into every stream a federated read produces; the caller keeps one
/// handle and checks it after consuming the stream, since a store can also
/// fail mid-stream.
#[derive(Debug, Clone, Default)]
pub struct DegradedFlag(Arc<AtomicBool>);

impl DegradedFlag {
    /// Fresh, unraised flag
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn mark(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// True once any store has been dropped from the result
    pub fn is_degraded(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Merged entry stream of one federated read
///
/// Yields `(global id, record)` pairs in the read's global order. Under the
/// degrade policy the stream never surfaces backend errors; consult
/// [`is_degraded`](FederatedEntries::is_degraded) after consuming it.
pub struct FederatedEntries<R> {
    iter: Box<dyn Iterator<Item = Result<(ScopedId, R)>> + Send>,
    degraded: DegradedFlag,
}

impl<R> FederatedEntries<R> {
    fn empty(degraded: DegradedFlag) -> Self
    where
        R: 'static,
    {
        FederatedEntries {
            iter: Box::new(std::iter::empty()),
            degraded,
        }
    }

    /// Handle to the degraded marker, usable while the stream is consumed
    pub fn degraded_flag(&self) -> DegradedFlag {
        self.degraded.clone()
    }

    /// True once any store has been dropped from this result
    ///
    /// Only final after the stream is exhausted; a store can fail mid-stream.
    pub fn is_degraded(&self) -> bool {
        self.degraded.is_degraded()
    }
}

impl<R> Iterator for FederatedEntries<R> {
    type Item = Result<(ScopedId, R)>;

    fn next(&mut self) -> Option<Self::Item> {
        self.iter.next()
    }
}

/// Degrade-policy adapter over one store's stream
///
/// The first element error ends the source: the error is logged, the shared
/// flag raised, and the source reports exhaustion so the merge continues with
/// the remaining stores.
struct DegradeOnError<I> {
    inner: I,
    label: String,
    kind: &'static str,
    flag: DegradedFlag,
    failed: bool,
}

impl<I, T> Iterator for DegradeOnError<I>
where
    I: Iterator<Item = Result<T>>,
{
    type Item = Result<T>;

    fn next(&mut self) -> Option<Result<T>> {
        if self.failed {
            return None;
        }
        match self.inner.next() {
            Some(Err(err)) => {
                warn!(
                    store = %self.label,
                    kind = self.kind,
                    error = %err,
                    "dropping store from degraded result"
                );
                self.flag.mark();
                self.failed = true;
                None
            }
            other => other,
        }
    }
}

/// One store participating in a dispatched operation
struct Candidate {
    scope: u32,
    bundle: Arc<dyn StoreBundle>,
    local_ids: Option<BTreeSet<ScopedId>>,
}

/// Partition an id selector into per-store candidates
///
/// Unconstrained selectors address every registered store. Explicit ids are
/// grouped by decoded scope; ids no encoder call could have produced and ids
/// pointing at an unregistered scope cannot match anything and are dropped.
/// The match-nothing sentinel falls out as zero candidates.
fn candidates(registry: &FederationRegistry, ids: &IdSelector) -> SmallVec<[Candidate; 4]> {
    match ids.explicit() {
        None => registry
            .stores()
            .into_iter()
            .map(|(scope, bundle)| Candidate {
                scope,
                bundle,
                local_ids: None,
            })
            .collect(),
        Some(set) => {
            let encoder = registry.encoder();
            let mut by_scope: BTreeMap<u32, BTreeSet<ScopedId>> = BTreeMap::new();
            for id in set {
                if let Ok((scope, local)) = encoder.decode(*id) {
                    by_scope
                        .entry(scope)
                        .or_default()
                        .insert(ScopedId::from_raw(local.as_raw()));
                }
            }
            by_scope
                .into_iter()
                .filter_map(|(scope, locals)| {
                    registry.store(scope).map(|bundle| Candidate {
                        scope,
                        bundle,
                        local_ids: Some(locals),
                    })
                })
                .collect()
        }
    }
}

fn local_selector(candidate: &Candidate) -> IdSelector {
    match &candidate.local_ids {
        Some(locals) => IdSelector::of(locals.iter().copied()),
        None => IdSelector::unconstrained(),
    }
}

fn backend_error(store: &str, err: CoreError) -> CoreError {
    CoreError::Backend {
        store: store.to_string(),
        message: err.to_string(),
    }
}

fn wrap_source<T: Send + 'static>(
    source: Box<dyn Iterator<Item = Result<T>> + Send>,
    policy: ReadFailurePolicy,
    label: &str,
    kind: &'static str,
    flag: &DegradedFlag,
) -> Box<dyn Iterator<Item = Result<T>> + Send> {
    match policy {
        ReadFailurePolicy::FailFast => source,
        ReadFailurePolicy::DegradeAndLog => Box::new(DegradeOnError {
            inner: source,
            label: label.to_string(),
            kind,
            flag: flag.clone(),
            failed: false,
        }),
    }
}

type Source<R> = Box<dyn Iterator<Item = Result<(ScopedId, R)>> + Send>;

/// Open per-candidate streams and lift them into the global id space
///
/// A store that fails to open its stream is handled per `policy`; a store
/// failing later, mid-stream, is handled by the [`DegradeOnError`] wrapper
/// (or surfaces through the merge under fail-fast).
fn collect_sources<R, S>(
    registry: &FederationRegistry,
    ids: &IdSelector,
    kind: &'static str,
    degraded: &DegradedFlag,
    mut select: S,
) -> Result<Vec<Source<R>>>
where
    R: Send + 'static,
    S: FnMut(&Candidate) -> Result<EntryIter<R>>,
{
    let policy = registry.read_failure_policy();
    let encoder = registry.encoder();
    let mut sources = Vec::new();
    for candidate in candidates(registry, ids) {
        let entries = match select(&candidate) {
            Ok(entries) => entries,
            Err(err) => match policy {
                ReadFailurePolicy::FailFast => {
                    return Err(backend_error(candidate.bundle.label(), err));
                }
                ReadFailurePolicy::DegradeAndLog => {
                    warn!(
                        store = candidate.bundle.label(),
                        kind,
                        error = %err,
                        "skipping unreadable store in degraded result"
                    );
                    degraded.mark();
                    continue;
                }
            },
        };
        let scope = candidate.scope;
        let encoded = entries.map(move |entry| {
            entry.and_then(|(key, record)| encoder.encode(scope, key).map(|id| (id, record)))
        });
        sources.push(wrap_source(
            Box::new(encoded),
            policy,
            candidate.bundle.label(),
            kind,
            degraded,
        ));
    }
    Ok(sources)
}

fn finish<R, I>(merged: I, limit: Option<usize>, degraded: DegradedFlag) -> FederatedEntries<R>
where
    I: Iterator<Item = Result<(ScopedId, R)>> + Send + 'static,
{
    let iter: Box<dyn Iterator<Item = Result<(ScopedId, R)>> + Send> = match limit {
        Some(limit) => Box::new(merged.take(limit)),
        None => Box::new(merged),
    };
    FederatedEntries {
        iter,
        degraded,
    }
}

type EngineOf<R> =
    fn(&dyn StoreBundle) -> &dyn StoreEngine<Record = R, Filter = ResourceFilter<R>>;

/// The federation presented as one database
///
/// Cheap to clone; all views share the one registry.
#[derive(Debug, Clone)]
pub struct FederatedDatabase {
    registry: Arc<FederationRegistry>,
}

impl FederatedDatabase {
    /// View an existing registry as a database
    pub fn new(registry: Arc<FederationRegistry>) -> Self {
        FederatedDatabase { registry }
    }

    /// Open a fresh registry and wrap it
    pub fn open(config: FederationConfig) -> Result<Self> {
        Ok(Self::new(Arc::new(FederationRegistry::open(config)?)))
    }

    /// The underlying registry
    pub fn registry(&self) -> &Arc<FederationRegistry> {
        &self.registry
    }

    /// Federated view over system descriptions
    pub fn systems(&self) -> FederatedResourceStore<SystemDesc> {
        FederatedResourceStore {
            registry: Arc::clone(&self.registry),
            engine_of: |bundle| bundle.systems(),
            kind: "systems",
        }
    }

    /// Federated view over sampling features
    pub fn features(&self) -> FederatedResourceStore<Feature> {
        FederatedResourceStore {
            registry: Arc::clone(&self.registry),
            engine_of: |bundle| bundle.features(),
            kind: "features",
        }
    }

    /// Federated view over observations
    pub fn observations(&self) -> FederatedObsStore {
        FederatedObsStore {
            registry: Arc::clone(&self.registry),
        }
    }
}

/// Federated view over one description-style resource kind
pub struct FederatedResourceStore<R: Resource> {
    registry: Arc<FederationRegistry>,
    engine_of: EngineOf<R>,
    kind: &'static str,
}

impl<R: Resource + Send + 'static> FederatedResourceStore<R> {
    /// Fetch one record by global id
    ///
    /// An id no encoder call could have produced, or one whose scope is not
    /// registered, resolves to `Ok(None)` rather than an error: such an id
    /// simply does not name a record in this federation.
    pub fn get(&self, id: ScopedId) -> Result<Option<R>> {
        let (scope, local) = match self.registry.encoder().decode(id) {
            Ok(pair) => pair,
            Err(_) => return Ok(None),
        };
        let Some(bundle) = self.registry.store(scope) else {
            return Ok(None);
        };
        (self.engine_of)(bundle.as_ref()).get(local)
    }

    /// Stream matching records across all stores, ascending by global id
    pub fn select_entries(&self, filter: &ResourceFilter<R>) -> Result<FederatedEntries<R>> {
        let degraded = DegradedFlag::new();
        let sources = collect_sources(
            &self.registry,
            filter.ids(),
            self.kind,
            &degraded,
            |candidate| {
                let local = filter.with_id_selector(local_selector(candidate));
                (self.engine_of)(candidate.bundle.as_ref()).select_entries(&local)
            },
        )?;
        let merged = MergeSorted::new(sources, |entry: &(ScopedId, R)| entry.0);
        Ok(finish(merged, filter.limit(), degraded))
    }

    /// Count matching records across all stores, capped by the filter limit
    pub fn count_matching(&self, filter: &ResourceFilter<R>) -> Result<u64> {
        let policy = self.registry.read_failure_policy();
        let mut total = 0u64;
        for candidate in candidates(&self.registry, filter.ids()) {
            let local = filter.with_id_selector(local_selector(&candidate));
            match (self.engine_of)(candidate.bundle.as_ref()).count_matching(&local) {
                Ok(count) => total += count,
                Err(err) => match policy {
                    ReadFailurePolicy::FailFast => {
                        return Err(backend_error(candidate.bundle.label(), err));
                    }
                    ReadFailurePolicy::DegradeAndLog => {
                        warn!(
                            store = candidate.bundle.label(),
                            kind = self.kind,
                            error = %err,
                            "skipping store in degraded count"
                        );
                    }
                },
            }
        }
        Ok(match filter.limit() {
            Some(limit) => total.min(limit as u64),
            None => total,
        })
    }

    /// Delete matching records from every writable store
    ///
    /// Read-only stores are skipped rather than treated as failures; a
    /// mutator error from a writable store aborts and propagates as-is.
    pub fn remove_entries(&self, filter: &ResourceFilter<R>) -> Result<u64> {
        let mut total = 0u64;
        for candidate in candidates(&self.registry, filter.ids()) {
            let engine = (self.engine_of)(candidate.bundle.as_ref());
            if engine.is_read_only() {
                continue;
            }
            let local = filter.with_id_selector(local_selector(&candidate));
            total += engine.remove_entries(&local)?;
        }
        Ok(total)
    }
}

/// Federated view over observations
///
/// Reads merge by `(phenomenon time, global id)` rather than bare id, so the
/// federated stream is the time-ordered interleaving of all stores.
pub struct FederatedObsStore {
    registry: Arc<FederationRegistry>,
}

impl FederatedObsStore {
    /// Fetch one observation by global id
    pub fn get(&self, id: ScopedId) -> Result<Option<ObsRecord>> {
        let (scope, local) = match self.registry.encoder().decode(id) {
            Ok(pair) => pair,
            Err(_) => return Ok(None),
        };
        let Some(bundle) = self.registry.store(scope) else {
            return Ok(None);
        };
        bundle.observations().get(local)
    }

    /// Reduce a descriptive system sub-filter to an explicit id set
    ///
    /// A sub-filter constraining systems by UID, text, validity or predicate
    /// cannot be evaluated against an observation record; it is resolved by
    /// querying the federated system stores first. `Ok(None)` means the
    /// sub-filter provably matches no system, so the observation result is
    /// empty without touching any observation store.
    fn resolve_systems(&self, filter: &ObsFilter, degraded: &DegradedFlag) -> Result<Option<ObsFilter>> {
        let Some(sub) = filter.systems() else {
            return Ok(Some(filter.clone()));
        };
        let descriptive = sub.uid_patterns().is_some()
            || sub.full_text().is_some()
            || sub.valid_time().is_some()
            || sub.value_predicate().is_some();
        if !descriptive {
            return Ok(Some(filter.clone()));
        }

        let systems = FederatedResourceStore::<SystemDesc> {
            registry: Arc::clone(&self.registry),
            engine_of: |bundle| bundle.systems(),
            kind: "systems",
        };
        let mut entries = systems.select_entries(sub)?;
        let mut ids = Vec::new();
        for entry in &mut entries {
            let (id, _) = entry?;
            ids.push(id);
        }
        if entries.is_degraded() {
            degraded.mark();
        }
        if ids.is_empty() {
            return Ok(None);
        }
        let resolved = SystemFilter::builder().with_ids(ids).build()?;
        Ok(Some(filter.with_resolved_systems(resolved)))
    }

    /// Stream matching observations across all stores, ascending by
    /// `(phenomenon time, global id)`
    pub fn select_entries(&self, filter: &ObsFilter) -> Result<FederatedEntries<ObsRecord>> {
        let degraded = DegradedFlag::new();
        let Some(resolved) = self.resolve_systems(filter, &degraded)? else {
            return Ok(FederatedEntries::empty(degraded));
        };
        let sources = collect_sources(
            &self.registry,
            resolved.ids(),
            "observations",
            &degraded,
            |candidate| {
                let local = resolved.with_id_selector(local_selector(candidate));
                candidate.bundle.observations().select_entries(&local)
            },
        )?;
        let merged = MergeSorted::new(sources, |entry: &(ScopedId, ObsRecord)| {
            (entry.1.phenomenon_time, entry.0)
        });
        Ok(finish(merged, resolved.limit(), degraded))
    }

    /// Count matching observations across all stores, capped by the filter limit
    pub fn count_matching(&self, filter: &ObsFilter) -> Result<u64> {
        let degraded = DegradedFlag::new();
        let Some(resolved) = self.resolve_systems(filter, &degraded)? else {
            return Ok(0);
        };
        let policy = self.registry.read_failure_policy();
        let mut total = 0u64;
        for candidate in candidates(&self.registry, resolved.ids()) {
            let local = resolved.with_id_selector(local_selector(&candidate));
            match candidate.bundle.observations().count_matching(&local) {
                Ok(count) => total += count,
                Err(err) => match policy {
                    ReadFailurePolicy::FailFast => {
                        return Err(backend_error(candidate.bundle.label(), err));
                    }
                    ReadFailurePolicy::DegradeAndLog => {
                        warn!(
                            store = candidate.bundle.label(),
                            kind = "observations",
                            error = %err,
                            "skipping store in degraded count"
                        );
                    }
                },
            }
        }
        Ok(match resolved.limit() {
            Some(limit) => total.min(limit as u64),
            None => total,
        })
    }

    /// Delete matching observations from every writable store
    pub fn remove_entries(&self, filter: &ObsFilter) -> Result<u64> {
        let degraded = DegradedFlag::new();
        let Some(resolved) = self.resolve_systems(filter, &degraded)? else {
            return Ok(0);
        };
        let mut total = 0u64;
        for candidate in candidates(&self.registry, resolved.ids()) {
            let engine = candidate.bundle.observations();
            if engine.is_read_only() {
                continue;
            }
            let local = resolved.with_id_selector(local_selector(&candidate));
            total += engine.remove_entries(&local)?;
        }
        Ok(total)
    }
}
