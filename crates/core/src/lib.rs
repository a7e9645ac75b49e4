//! Core types and traits for ObsHub
//!
//! This crate defines the foundations the federation is built on:
//! - ScopedId / IdEncoder: the scope-packed global identifier codec
//! - Timestamp: microsecond-precision time
//! - CoreError: the error taxonomy shared by every layer
//! - Resource model: SystemDesc, Feature, ObsRecord and the Resource trait
//! - Filter algebra: immutable, builder-constructed, AND-intersectable
//! - StoreEngine: the contract every pluggable backend satisfies

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod engine;
pub mod error;
pub mod filter;
pub mod resource;
pub mod scoped_id;
pub mod timestamp;

pub use engine::{EntryIter, LocalKey, ReadOnlyStore, StoreEngine};
pub use error::{CoreError, Result};
pub use filter::{
    FeatureFilter, FeatureFilterBuilder, IdSelector, ObsFilter, ObsFilterBuilder, ResourceFilter,
    ResourceFilterBuilder, SystemFilter, SystemFilterBuilder, TemporalFilter, TemporalMode,
    TextFilter, TimeRange, UidPattern, ValuePredicate,
};
pub use resource::{Feature, ObsRecord, Resource, SystemDesc};
pub use scoped_id::{IdEncoder, ScopedId};
pub use timestamp::Timestamp;
