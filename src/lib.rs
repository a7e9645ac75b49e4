//! ObsHub - Federated store for sensor systems, features and observations
//!
//! ObsHub presents a set of independent stores as one database. Each store is
//! registered under a scope and a set of UID patterns; reads fan out to the
//! stores that can hold matching records and merge the sorted per-store
//! streams back into one globally ordered stream.
//!
//! # Quick Start
//!
//! ```ignore
//! use obshub::{FederatedDatabase, ObsFilter, SystemFilter};
//!
//! // Open a federation and register a backend under its UID patterns
//! let db = FederatedDatabase::open(Default::default())?;
//! db.registry().register(["urn:osh:sensor:*"], bundle)?;
//!
//! // Query across every registered store at once
//! for entry in db.systems().select_entries(&SystemFilter::all())? {
//!     let (id, desc) = entry?;
//!     println!("{id}: {}", desc.name);
//! }
//!
//! // Observations merge in phenomenon-time order
//! let recent = db.observations().count_matching(&ObsFilter::all())?;
//! ```
//!
//! # Architecture
//!
//! The workspace splits along the seams a backend author cares about:
//! `obshub-core` holds the identifier codec, the resource model, the filter
//! algebra and the [`StoreEngine`] contract; `obshub-store` ships the
//! versioned record codecs and the in-memory reference engines;
//! `obshub-federation` owns the registry, the k-way merge and retention.
//!
//! This crate re-exports all three, so most users depend on `obshub` alone.

pub use obshub_core::*;
pub use obshub_federation::*;
pub use obshub_store::*;
