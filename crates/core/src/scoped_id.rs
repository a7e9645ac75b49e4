//! Scope-qualified identifier codec
//!
//! Every record in the federation is addressed by one comparable 64-bit id
//! packing a (scope, local key) pair:
//!
//! ```text
//! global = local * max_scopes + scope
//! ```
//!
//! For a fixed scope the global order follows the local order, so per-store
//! streams stay sorted after encoding. Decoding recovers the pair with a
//! modulus and a division; no table lookup is involved, which is what lets
//! stores mint local keys without coordinating with each other.
//!
//! Scope 0 is reserved: the raw value 0 is the [`ScopedId::NONE`] sentinel
//! meaning "no id", distinct from every valid identifier (local numbering
//! starts at 1).

use crate::engine::LocalKey;
use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Globally comparable identifier encoding a (scope, local key) pair
///
/// Minted exactly once by the federation when a record is inserted; immutable
/// thereafter; never reused even after deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ScopedId(u64);

impl ScopedId {
    /// Sentinel meaning "no id"
    pub const NONE: ScopedId = ScopedId(0);

    /// Wrap an already-encoded global value
    #[inline]
    pub const fn from_raw(raw: u64) -> Self {
        ScopedId(raw)
    }

    /// Encoded global value
    #[inline]
    pub const fn as_raw(&self) -> u64 {
        self.0
    }

    /// True for the "no id" sentinel
    #[inline]
    pub const fn is_none(&self) -> bool {
        self.0 == 0
    }

    /// True for any non-sentinel id
    #[inline]
    pub const fn is_some(&self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for ScopedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Encoder/decoder for the scope-packed id space
///
/// `max_scopes` is the encoding modulus, fixed for the lifetime of a
/// federation; changing it would re-interpret every id ever handed out.
/// Usable scopes are `1..max_scopes` (scope 0 is reserved for the sentinel).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdEncoder {
    max_scopes: u32,
}

impl IdEncoder {
    /// Create an encoder over `max_scopes` scope slots
    ///
    /// Fails if `max_scopes < 2`: with the zero slot reserved, anything
    /// smaller leaves no usable scope.
    pub fn new(max_scopes: u32) -> Result<Self> {
        if max_scopes < 2 {
            return Err(CoreError::InvalidArgument(format!(
                "max_scopes must be at least 2, got {max_scopes}"
            )));
        }
        Ok(IdEncoder { max_scopes })
    }

    /// The encoding modulus
    #[inline]
    pub const fn max_scopes(&self) -> u32 {
        self.max_scopes
    }

    /// Pack a (scope, local key) pair into a global id
    ///
    /// `scope` must be in `[1, max_scopes - 1]` and `local` must be positive.
    pub fn encode(&self, scope: u32, local: LocalKey) -> Result<ScopedId> {
        if scope == 0 || scope >= self.max_scopes {
            return Err(CoreError::InvalidArgument(format!(
                "scope {scope} outside valid range [1, {}]",
                self.max_scopes - 1
            )));
        }
        if local.as_raw() == 0 {
            return Err(CoreError::InvalidArgument(
                "local key must be positive".to_string(),
            ));
        }
        let raw = local
            .as_raw()
            .checked_mul(u64::from(self.max_scopes))
            .and_then(|v| v.checked_add(u64::from(scope)))
            .ok_or_else(|| {
                CoreError::InvalidArgument(format!(
                    "local key {local} overflows the id space for {} scopes",
                    self.max_scopes
                ))
            })?;
        Ok(ScopedId(raw))
    }

    /// Unpack a global id into its (scope, local key) pair
    ///
    /// Rejects the sentinel and any value that no valid `encode` call could
    /// have produced.
    pub fn decode(&self, id: ScopedId) -> Result<(u32, LocalKey)> {
        if id.is_none() {
            return Err(CoreError::InvalidArgument(
                "cannot decode the none sentinel".to_string(),
            ));
        }
        let scope = (id.0 % u64::from(self.max_scopes)) as u32;
        let local = id.0 / u64::from(self.max_scopes);
        if scope == 0 || local == 0 {
            return Err(CoreError::InvalidArgument(format!(
                "id {id} was not produced by an encoder with {} scopes",
                self.max_scopes
            )));
        }
        Ok((scope, LocalKey::new(local)))
    }

    /// Scope portion of an id, without validating the local part
    #[inline]
    pub fn scope_of(&self, id: ScopedId) -> u32 {
        (id.0 % u64::from(self.max_scopes)) as u32
    }

    /// Local portion of an id, without validating the scope part
    #[inline]
    pub fn local_of(&self, id: ScopedId) -> LocalKey {
        LocalKey::new(id.0 / u64::from(self.max_scopes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const N: u32 = 100;

    fn encoder() -> IdEncoder {
        IdEncoder::new(N).unwrap()
    }

    #[test]
    fn test_encoder_rejects_degenerate_capacity() {
        assert!(IdEncoder::new(0).is_err());
        assert!(IdEncoder::new(1).is_err());
        assert!(IdEncoder::new(2).is_ok());
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let enc = encoder();
        let id = enc.encode(3, LocalKey::new(42)).unwrap();
        assert_eq!(id.as_raw(), 42 * 100 + 3);
        assert_eq!(enc.decode(id).unwrap(), (3, LocalKey::new(42)));
    }

    #[test]
    fn test_encode_rejects_invalid_scope() {
        let enc = encoder();
        assert!(enc.encode(0, LocalKey::new(1)).is_err());
        assert!(enc.encode(N, LocalKey::new(1)).is_err());
        assert!(enc.encode(N - 1, LocalKey::new(1)).is_ok());
    }

    #[test]
    fn test_encode_rejects_zero_local() {
        let enc = encoder();
        assert!(matches!(
            enc.encode(1, LocalKey::new(0)),
            Err(CoreError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_encode_rejects_overflow() {
        let enc = encoder();
        assert!(enc.encode(1, LocalKey::new(u64::MAX / 50)).is_err());
    }

    #[test]
    fn test_decode_rejects_sentinel_and_foreign_values() {
        let enc = encoder();
        assert!(enc.decode(ScopedId::NONE).is_err());
        // raw 100 decodes to scope 0, which no encode call can produce
        assert!(enc.decode(ScopedId::from_raw(100)).is_err());
        // raw 7 decodes to local 0
        assert!(enc.decode(ScopedId::from_raw(7)).is_err());
    }

    #[test]
    fn test_none_is_distinct_from_valid_ids() {
        let enc = encoder();
        let id = enc.encode(1, LocalKey::new(1)).unwrap();
        assert!(id.is_some());
        assert_ne!(id, ScopedId::NONE);
        assert!(ScopedId::NONE.is_none());
    }

    #[test]
    fn test_scope_and_local_accessors() {
        let enc = encoder();
        let id = enc.encode(7, LocalKey::new(123)).unwrap();
        assert_eq!(enc.scope_of(id), 7);
        assert_eq!(enc.local_of(id), LocalKey::new(123));
    }

    #[test]
    fn test_global_order_refines_local_order() {
        let enc = encoder();
        let a = enc.encode(5, LocalKey::new(10)).unwrap();
        let b = enc.encode(5, LocalKey::new(11)).unwrap();
        assert!(a < b);
    }

    proptest! {
        #[test]
        fn prop_round_trip(scope in 1u32..N, local in 1u64..1_000_000_000) {
            let enc = encoder();
            let id = enc.encode(scope, LocalKey::new(local)).unwrap();
            prop_assert_eq!(enc.decode(id).unwrap(), (scope, LocalKey::new(local)));
        }

        #[test]
        fn prop_order_preserved_within_scope(
            scope in 1u32..N,
            a in 1u64..1_000_000_000,
            b in 1u64..1_000_000_000,
        ) {
            let enc = encoder();
            let ia = enc.encode(scope, LocalKey::new(a)).unwrap();
            let ib = enc.encode(scope, LocalKey::new(b)).unwrap();
            prop_assert_eq!(a < b, ia < ib);
        }

        #[test]
        fn prop_injective(
            s1 in 1u32..N, l1 in 1u64..1_000_000_000,
            s2 in 1u32..N, l2 in 1u64..1_000_000_000,
        ) {
            let enc = encoder();
            let i1 = enc.encode(s1, LocalKey::new(l1)).unwrap();
            let i2 = enc.encode(s2, LocalKey::new(l2)).unwrap();
            prop_assert_eq!((s1, l1) == (s2, l2), i1 == i2);
        }
    }
}
