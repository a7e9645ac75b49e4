//! Store backends for ObsHub
//!
//! Everything a concrete backend needs on top of the `obshub-core` engine
//! contract:
//! - `codec`: versioned record envelopes with eager payload migration
//! - `mem`: reference in-memory engines for systems, features and observations
//! - `text_index` / `tokenizer`: the inverted keyword index behind full-text
//!   filters
//!
//! The in-memory engines are production defaults for single-node hubs and the
//! substrate federation tests run against; disk-backed engines plug in behind
//! the same [`StoreEngine`](obshub_core::StoreEngine) trait.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod mem;
pub mod text_index;
pub mod tokenizer;

pub use codec::{feature_codec, obs_codec, system_codec, VersionedCodec, VersionedCodecBuilder};
pub use mem::{MemFeatureStore, MemObsStore, MemResourceStore, MemSystemStore};
pub use text_index::TextIndex;
pub use tokenizer::{tokenize, tokenize_unique};
