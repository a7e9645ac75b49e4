//! Versioned record envelopes
//!
//! Every stored record is wrapped in a self-describing envelope:
//!
//! ```text
//! [version: varint u32][payload: bytes]
//! ```
//!
//! Encoding always writes the current version. Decoding reads the tag and
//! dispatches to the decoder registered for that version; old decoders
//! migrate the payload to the current shape eagerly, so the rest of the
//! store only ever sees one type. An unregistered tag is a hard
//! [`CoreError::UnknownVersion`] rather than a skip, since silently
//! dropping records would corrupt query results.
//!
//! The codec seam also leaves room for compression or encryption layers
//! below the envelope later on.

pub mod records;
pub mod varint;

use obshub_core::{CoreError, Result};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::trace;

pub use records::{feature_codec, obs_codec, system_codec};

type EncodeFn<T> = Arc<dyn Fn(&T) -> Result<Vec<u8>> + Send + Sync>;
type DecodeFn<T> = Arc<dyn Fn(&[u8]) -> Result<T> + Send + Sync>;

/// Envelope codec for one record type across all its payload versions
///
/// Cheap to clone; encoder and decoders are shared behind `Arc`, so entry
/// streams can carry their own handle and decode after the engine call
/// returns.
pub struct VersionedCodec<T> {
    current_version: u32,
    encode: EncodeFn<T>,
    decoders: BTreeMap<u32, DecodeFn<T>>,
}

impl<T> Clone for VersionedCodec<T> {
    fn clone(&self) -> Self {
        VersionedCodec {
            current_version: self.current_version,
            encode: Arc::clone(&self.encode),
            decoders: self.decoders.clone(),
        }
    }
}

impl<T> VersionedCodec<T> {
    /// Start building a codec
    pub fn builder() -> VersionedCodecBuilder<T> {
        VersionedCodecBuilder {
            current: None,
            decoders: BTreeMap::new(),
        }
    }

    /// The version tag written on encode
    pub fn current_version(&self) -> u32 {
        self.current_version
    }

    /// Wrap `record` in a current-version envelope
    pub fn encode(&self, record: &T) -> Result<Vec<u8>> {
        let payload = (self.encode)(record)?;
        let mut buf = Vec::with_capacity(payload.len() + 1);
        varint::write_u32(&mut buf, self.current_version);
        buf.extend_from_slice(&payload);
        Ok(buf)
    }

    /// Unwrap an envelope, migrating old payloads to the current shape
    pub fn decode(&self, bytes: &[u8]) -> Result<T> {
        let (version, payload) = varint::read_u32(bytes)?;
        let decoder = self
            .decoders
            .get(&version)
            .ok_or(CoreError::UnknownVersion(version))?;
        if version != self.current_version {
            trace!(version, current = self.current_version, "migrating record payload");
        }
        decoder(payload)
    }

    /// Versions this codec can decode, ascending
    pub fn known_versions(&self) -> Vec<u32> {
        self.decoders.keys().copied().collect()
    }
}

impl<T> std::fmt::Debug for VersionedCodec<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionedCodec")
            .field("current_version", &self.current_version)
            .field("known_versions", &self.known_versions())
            .finish()
    }
}

/// Builder for [`VersionedCodec`]
pub struct VersionedCodecBuilder<T> {
    current: Option<(u32, EncodeFn<T>)>,
    decoders: BTreeMap<u32, DecodeFn<T>>,
}

impl<T> VersionedCodecBuilder<T> {
    /// Register a decoder for a historical payload version
    ///
    /// The decoder must produce the current record shape.
    pub fn with_decoder<D>(mut self, version: u32, decode: D) -> Self
    where
        D: Fn(&[u8]) -> Result<T> + Send + Sync + 'static,
    {
        self.decoders.insert(version, Arc::new(decode));
        self
    }

    /// Set the current version with its encoder and decoder
    pub fn current<E, D>(mut self, version: u32, encode: E, decode: D) -> Self
    where
        E: Fn(&T) -> Result<Vec<u8>> + Send + Sync + 'static,
        D: Fn(&[u8]) -> Result<T> + Send + Sync + 'static,
    {
        self.current = Some((version, Arc::new(encode)));
        self.decoders.insert(version, Arc::new(decode));
        self
    }

    /// Finish the codec; fails if no current version was set
    pub fn build(self) -> Result<VersionedCodec<T>> {
        let (current_version, encode) = self.current.ok_or_else(|| {
            CoreError::InvalidArgument("codec has no current version".into())
        })?;
        Ok(VersionedCodec {
            current_version,
            encode,
            decoders: self.decoders,
        })
    }
}
