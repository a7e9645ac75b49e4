//! Shared fixtures for federation tests

use crate::registry::StoreBundle;
use obshub_core::{
    CoreError, EntryIter, Feature, FeatureFilter, LocalKey, ObsFilter, ObsRecord, ReadOnlyStore,
    Result, StoreEngine, SystemDesc, SystemFilter,
};
use obshub_store::{MemFeatureStore, MemObsStore, MemSystemStore};
use std::marker::PhantomData;
use std::sync::Arc;

/// Read-write bundle over the in-memory engines
pub struct MemBundle {
    label: String,
    pub systems: MemSystemStore,
    pub features: MemFeatureStore,
    pub observations: MemObsStore,
}

impl MemBundle {
    pub fn new(label: &str) -> Arc<MemBundle> {
        Arc::new(MemBundle {
            label: label.to_string(),
            systems: MemSystemStore::default(),
            features: MemFeatureStore::default(),
            observations: MemObsStore::default(),
        })
    }
}

impl StoreBundle for MemBundle {
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

/// Bundle exposing only the read side of pre-populated engines
pub struct ReadOnlyBundle {
    label: String,
    systems: ReadOnlyStore<MemSystemStore>,
    features: ReadOnlyStore<MemFeatureStore>,
    observations: ReadOnlyStore<MemObsStore>,
}

impl ReadOnlyBundle {
    pub fn new(
        label: &str,
        systems: MemSystemStore,
        features: MemFeatureStore,
        observations: MemObsStore,
    ) -> Arc<ReadOnlyBundle> {
        Arc::new(ReadOnlyBundle {
            label: label.to_string(),
            systems: ReadOnlyStore::wrap(systems),
            features: ReadOnlyStore::wrap(features),
            observations: ReadOnlyStore::wrap(observations),
        })
    }
}

impl StoreBundle for ReadOnlyBundle {
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

/// Engine whose every call fails, simulating a lost backend
pub struct BrokenEngine<R, F> {
    _marker: PhantomData<fn() -> (R, F)>,
}

impl<R, F> Default for BrokenEngine<R, F> {
    fn default() -> Self {
        BrokenEngine {
            _marker: PhantomData,
        }
    }
}

fn offline<T>() -> Result<T> {
    Err(CoreError::IllegalState("backend offline".to_string()))
}

impl<R, F> StoreEngine for BrokenEngine<R, F> {
    type Record = R;
    type Filter = F;

    fn add(&self, _record: R) -> Result<LocalKey> {
        offline()
    }

    fn get(&self, _key: LocalKey) -> Result<Option<R>> {
        offline()
    }

    fn select_entries(&self, _filter: &F) -> Result<EntryIter<R>> {
        offline()
    }

    fn count_matching(&self, _filter: &F) -> Result<u64> {
        offline()
    }

    fn remove_entries(&self, _filter: &F) -> Result<u64> {
        offline()
    }
}

/// Bundle whose engines all fail
pub struct BrokenBundle {
    label: String,
    systems: BrokenEngine<SystemDesc, SystemFilter>,
    features: BrokenEngine<Feature, FeatureFilter>,
    observations: BrokenEngine<ObsRecord, ObsFilter>,
}

impl BrokenBundle {
    pub fn new(label: &str) -> Arc<BrokenBundle> {
        Arc::new(BrokenBundle {
            label: label.to_string(),
            systems: BrokenEngine::default(),
            features: BrokenEngine::default(),
            observations: BrokenEngine::default(),
        })
    }
}

impl StoreBundle for BrokenBundle {
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
