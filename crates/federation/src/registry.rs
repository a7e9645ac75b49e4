//! Store registration and scope allocation
//!
//! The registry is the single authority mapping scopes to stores and UID
//! patterns to their owning scope. It is an explicitly constructed service
//! object: `open()` it with a [`FederationConfig`], `close()` it when the hub
//! shuts down. No ambient singleton.
//!
//! Scopes are allocated sequentially and never reused within a registry
//! lifetime, so a dangling global id can never silently resolve to a newer
//! store's record.
//!
//! The tables lock is held only while reading or updating the tables, never
//! across a call into a store engine.

use crate::retention::PurgeConfig;
use obshub_core::{
    CoreError, Feature, FeatureFilter, IdEncoder, ObsFilter, ObsRecord, Result, StoreEngine,
    SystemDesc, SystemFilter, UidPattern,
};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use tracing::info;

/// What a registered store exposes to the federation
///
/// One engine per record kind; backends that do not support a kind hand out
/// [`ReadOnlyStore::empty()`](obshub_core::ReadOnlyStore::empty). The label
/// only appears in logs and error messages.
pub trait StoreBundle: Send + Sync {
    /// Short human-readable name for logs
    fn label(&self) -> &str;

    /// System description engine
    fn systems(&self) -> &dyn StoreEngine<Record = SystemDesc, Filter = SystemFilter>;

    /// Sampling feature engine
    fn features(&self) -> &dyn StoreEngine<Record = Feature, Filter = FeatureFilter>;

    /// Observation engine
    fn observations(&self) -> &dyn StoreEngine<Record = ObsRecord, Filter = ObsFilter>;
}

/// How federated reads treat a failing store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadFailurePolicy {
    /// Abort the whole operation on the first backend error
    FailFast,
    /// Skip the failing store, log a warning, mark the result degraded
    #[default]
    DegradeAndLog,
}

/// Configuration fixed at registry construction
#[derive(Debug, Clone)]
pub struct FederationConfig {
    /// Scope-encoding modulus; immutable for the registry lifetime
    pub max_scopes: u32,
    /// Failure policy for federated read aggregation
    pub read_failure_policy: ReadFailurePolicy,
    /// Retention policy, `None` to keep records forever
    pub purge: Option<PurgeConfig>,
}

impl Default for FederationConfig {
    fn default() -> Self {
        FederationConfig {
            max_scopes: 1000,
            read_failure_policy: ReadFailurePolicy::default(),
            purge: None,
        }
    }
}

/// Lifecycle notifications published to subscribers
///
/// Delivery is best-effort over a non-blocking channel; a subscriber that
/// went away is dropped on the next publish. This is the seam an external
/// notification bus plugs into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    /// A store joined the federation
    StoreRegistered {
        /// Assigned scope
        scope: u32,
        /// Store label
        label: String,
    },
    /// A store left the federation
    StoreUnregistered {
        /// Released scope (never reassigned)
        scope: u32,
        /// Store label
        label: String,
    },
    /// A purge pass removed expired records
    RecordsPurged {
        /// Removed system descriptions
        systems: u64,
        /// Removed sampling features
        features: u64,
        /// Removed observations
        observations: u64,
    },
}

struct UidOwner {
    scope: u32,
    pattern: UidPattern,
}

#[derive(Default)]
struct Tables {
    stores: BTreeMap<u32, Arc<dyn StoreBundle>>,
    // keyed by pattern display text; literal "a" and prefix "a*" are distinct keys
    uid_owners: BTreeMap<String, UidOwner>,
    next_scope: u32,
}

/// Scope and UID tables of one federation
pub struct FederationRegistry {
    encoder: IdEncoder,
    read_failure_policy: ReadFailurePolicy,
    purge: Option<PurgeConfig>,
    tables: RwLock<Tables>,
    subscribers: Mutex<Vec<mpsc::Sender<RegistryEvent>>>,
    closed: AtomicBool,
}

impl FederationRegistry {
    /// Open a registry with the given configuration
    pub fn open(config: FederationConfig) -> Result<Self> {
        let encoder = IdEncoder::new(config.max_scopes)?;
        Ok(FederationRegistry {
            encoder,
            read_failure_policy: config.read_failure_policy,
            purge: config.purge,
            tables: RwLock::new(Tables {
                next_scope: 1,
                ..Tables::default()
            }),
            subscribers: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        })
    }

    /// The id codec of this federation
    pub fn encoder(&self) -> IdEncoder {
        self.encoder
    }

    /// Failure policy applied by federated reads
    pub fn read_failure_policy(&self) -> ReadFailurePolicy {
        self.read_failure_policy
    }

    /// Retention policy, if configured
    pub fn purge_config(&self) -> Option<PurgeConfig> {
        self.purge.clone()
    }

    /// Register a store under the UID patterns it owns
    ///
    /// Assigns the next free scope and records every pattern. All-or-nothing:
    /// a pattern already owned by another scope leaves the tables untouched
    /// and returns `Conflict`. Fails with `IllegalState` once the registry is
    /// closed or the scope space is exhausted.
    pub fn register<I, S>(&self, uids: I, bundle: Arc<dyn StoreBundle>) -> Result<u32>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.ensure_open("register")?;
        let mut patterns = Vec::new();
        for raw in uids {
            patterns.push(UidPattern::parse(raw.as_ref())?);
        }

        let scope = {
            let mut tables = self.tables.write();
            if tables
                .stores
                .values()
                .any(|existing| Arc::ptr_eq(existing, &bundle))
            {
                return Err(CoreError::Conflict(format!(
                    "store '{}' is already registered",
                    bundle.label()
                )));
            }
            if tables.next_scope >= self.encoder.max_scopes() {
                return Err(CoreError::IllegalState(format!(
                    "scope space exhausted at {} scopes",
                    self.encoder.max_scopes()
                )));
            }
            for pattern in &patterns {
                if let Some(owner) = tables.uid_owners.get(&pattern.to_string()) {
                    return Err(CoreError::Conflict(format!(
                        "uid pattern '{pattern}' already owned by scope {}",
                        owner.scope
                    )));
                }
            }
            let scope = tables.next_scope;
            tables.next_scope += 1;
            tables.stores.insert(scope, Arc::clone(&bundle));
            for pattern in patterns {
                tables
                    .uid_owners
                    .insert(pattern.to_string(), UidOwner { scope, pattern });
            }
            scope
        };

        info!(scope, label = bundle.label(), "store registered");
        self.publish(RegistryEvent::StoreRegistered {
            scope,
            label: bundle.label().to_string(),
        });
        Ok(scope)
    }

    /// Remove a store and every UID mapping pointing at it
    ///
    /// The store's data is untouched; its scope is never reassigned, so ids
    /// minted under it simply stop resolving.
    pub fn unregister(&self, scope: u32) -> Result<()> {
        self.ensure_open("unregister")?;
        let bundle = {
            let mut tables = self.tables.write();
            let bundle = tables.stores.remove(&scope).ok_or_else(|| {
                CoreError::InvalidArgument(format!("scope {scope} is not registered"))
            })?;
            tables.uid_owners.retain(|_, owner| owner.scope != scope);
            bundle
        };

        info!(scope, label = bundle.label(), "store unregistered");
        self.publish(RegistryEvent::StoreUnregistered {
            scope,
            label: bundle.label().to_string(),
        });
        Ok(())
    }

    /// The store owning `uid`, preferring the most specific pattern
    pub fn store_for_uid(&self, uid: &str) -> Option<(u32, Arc<dyn StoreBundle>)> {
        let tables = self.tables.read();
        tables
            .uid_owners
            .range::<str, _>((Bound::Unbounded, Bound::Included(uid)))
            .rev()
            .find(|(_, owner)| owner.pattern.matches(uid))
            .and_then(|(_, owner)| {
                tables
                    .stores
                    .get(&owner.scope)
                    .map(|bundle| (owner.scope, Arc::clone(bundle)))
            })
    }

    /// Registered scopes, ascending
    pub fn scopes(&self) -> Vec<u32> {
        self.tables.read().stores.keys().copied().collect()
    }

    /// The store registered under `scope`, if any
    pub fn store(&self, scope: u32) -> Option<Arc<dyn StoreBundle>> {
        self.tables.read().stores.get(&scope).cloned()
    }

    /// Snapshot of all registered stores, ascending by scope
    pub fn stores(&self) -> Vec<(u32, Arc<dyn StoreBundle>)> {
        self.tables
            .read()
            .stores
            .iter()
            .map(|(scope, bundle)| (*scope, Arc::clone(bundle)))
            .collect()
    }

    /// Whether `scope` currently resolves to a store
    pub fn is_registered(&self, scope: u32) -> bool {
        self.tables.read().stores.contains_key(&scope)
    }

    /// Subscribe to registry lifecycle events
    pub fn subscribe(&self) -> mpsc::Receiver<RegistryEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.lock().push(tx);
        rx
    }

    pub(crate) fn publish(&self, event: RegistryEvent) {
        self.subscribers
            .lock()
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }

    /// Stop accepting registration changes; reads keep working
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        info!("registry closed");
    }

    /// Whether `close()` has been called
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self, operation: &str) -> Result<()> {
        if self.is_closed() {
            return Err(CoreError::IllegalState(format!(
                "{operation} on a closed registry"
            )));
        }
        Ok(())
    }
}

impl std::fmt::Debug for FederationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FederationRegistry")
            .field("max_scopes", &self.encoder.max_scopes())
            .field("scopes", &self.scopes())
            .field("closed", &self.is_closed())
            .finish()
    }
}
