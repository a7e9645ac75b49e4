//! End-to-end federation scenarios
//!
//! Drives the public `obshub` facade the way an embedding hub would: build
//! store bundles over the in-memory engines, register them with their UID
//! patterns, and query through the federated database.

use std::sync::Arc;

use obshub::{
    CoreError, Feature, FeatureFilter, FederatedDatabase, LocalKey, MemFeatureStore, MemObsStore,
    MemSystemStore, ObsFilter, ObsRecord, ScopedId, StoreBundle, StoreEngine, SystemDesc,
    SystemFilter, Timestamp,
};

struct Bundle {
    label: String,
    systems: MemSystemStore,
    features: MemFeatureStore,
    observations: MemObsStore,
}

impl Bundle {
    fn new(label: &str) -> Arc<Bundle> {
        Arc::new(Bundle {
            label: label.to_string(),
            systems: MemSystemStore::default(),
            features: MemFeatureStore::default(),
            observations: MemObsStore::default(),
        })
    }
}

impl StoreBundle for Bundle {
    fn label(&self) -> &str {
        &self.label
    }

    fn systems(&self) -> &dyn StoreEngine<Record = SystemDesc, Filter = SystemFilter> {
        &self.systems
    }

    fn features(&self) -> &dyn StoreEngine<Record = Feature, Filter = FeatureFilter> {
        &self.features
    }

    fn observations(&self) -> &dyn StoreEngine<Record = ObsRecord, Filter = ObsFilter> {
        &self.observations
    }
}

fn obs(system: u64, secs: u64) -> ObsRecord {
    ObsRecord::new(
        ScopedId::from_raw(system),
        Timestamp::from_secs(secs),
        serde_json::json!({"t": secs}),
    )
}

/// Two stores with interleaved observation times. The federated stream must
/// come back in phenomenon-time order regardless of which store holds each
/// record, and a limit must apply after the merge, not per store.
#[test]
fn test_merge_interleaves_stores_in_time_order_with_limit() {
    let db = FederatedDatabase::open(Default::default()).unwrap();
    let encoder = db.registry().encoder();

    let alpha = Bundle::new("alpha");
    alpha.observations.add(obs(11, 100)).unwrap();
    alpha.observations.add(obs(11, 200)).unwrap();
    alpha.observations.add(obs(11, 300)).unwrap();
    let beta = Bundle::new("beta");
    beta.observations.add(obs(12, 150)).unwrap();
    beta.observations.add(obs(12, 250)).unwrap();

    let scope_a = db.registry().register(["urn:osh:a:*"], alpha).unwrap();
    let scope_b = db.registry().register(["urn:osh:b:*"], beta).unwrap();

    let filter = ObsFilter::builder().with_limit(3).build().unwrap();
    let entries: Vec<(ScopedId, Timestamp)> = db
        .observations()
        .select_entries(&filter)
        .unwrap()
        .map(|entry| entry.map(|(id, record)| (id, record.phenomenon_time)))
        .collect::<Result<_, _>>()
        .unwrap();

    let id = |scope, local| encoder.encode(scope, LocalKey::new(local)).unwrap();
    assert_eq!(
        entries,
        vec![
            (id(scope_a, 1), Timestamp::from_secs(100)),
            (id(scope_b, 1), Timestamp::from_secs(150)),
            (id(scope_a, 2), Timestamp::from_secs(200)),
        ]
    );

    // without a limit the tail arrives too, still in time order
    let times: Vec<u64> = db
        .observations()
        .select_entries(&ObsFilter::all())
        .unwrap()
        .map(|entry| entry.unwrap().1.phenomenon_time.as_secs())
        .collect();
    assert_eq!(times, vec![100, 150, 200, 250, 300]);
}

/// A second registration claiming an already-owned UID pattern must fail
/// whole, leaving no trace of the rejected store.
#[test]
fn test_uid_pattern_conflict_rejects_whole_registration() {
    let db = FederatedDatabase::open(Default::default()).unwrap();
    let registry = db.registry();

    let first = registry
        .register(["urn:osh:site:s1", "urn:osh:site:s2"], Bundle::new("first"))
        .unwrap();

    let result = registry.register(
        ["urn:osh:site:s2", "urn:osh:site:s3"],
        Bundle::new("second"),
    );
    assert!(matches!(result, Err(CoreError::Conflict(_))));

    // the rejected store is nowhere: no scope, no UID mapping at all
    assert_eq!(registry.scopes(), vec![first]);
    assert_eq!(registry.store_for_uid("urn:osh:site:s2").unwrap().0, first);
    assert!(registry.store_for_uid("urn:osh:site:s3").is_none());
}

/// Global ids minted by one federation resolve through `get` on the facade.
#[test]
fn test_global_ids_round_trip_through_get() {
    let db = FederatedDatabase::open(Default::default()).unwrap();

    let bundle = Bundle::new("solo");
    let key = bundle
        .systems
        .add(SystemDesc::new("urn:osh:sensor:ws1", "Station"))
        .unwrap();
    let scope = db.registry().register(["urn:osh:sensor:*"], bundle).unwrap();

    let global = db.registry().encoder().encode(scope, key).unwrap();
    let fetched = db.systems().get(global).unwrap().unwrap();
    assert_eq!(fetched.uid, "urn:osh:sensor:ws1");

    // an id from a scope that was never allocated resolves to nothing
    let orphan = db
        .registry()
        .encoder()
        .encode(scope + 1, LocalKey::new(1))
        .unwrap();
    assert_eq!(db.systems().get(orphan).unwrap(), None);
}
