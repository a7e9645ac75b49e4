//! Federation layer: registry, dispatch, merge and retention
//!
//! This crate turns a set of independent stores into one database. The
//! [`FederationRegistry`] assigns each store a scope and owns the UID routing
//! tables; [`FederatedDatabase`] fans reads out across stores and k-way merges
//! the sorted per-store streams back into global order; [`PurgePolicy`] ages
//! records out across the whole federation.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod federated;
pub mod merge;
pub mod registry;
pub mod retention;

#[cfg(test)]
mod testing;

pub use federated::{
    DegradedFlag, FederatedDatabase, FederatedEntries, FederatedObsStore, FederatedResourceStore,
};
pub use merge::MergeSorted;
pub use registry::{
    FederationConfig, FederationRegistry, ReadFailurePolicy, RegistryEvent, StoreBundle,
};
pub use retention::{PurgeConfig, PurgePolicy, PurgeRunner, PurgeStats};
