//! Id-set constraint shared by every filter kind

use crate::engine::LocalKey;
use crate::error::{CoreError, Result};
use crate::scoped_id::ScopedId;
use std::collections::BTreeSet;

/// Constraint over a set of ids
///
/// Three states, and the distinction matters:
/// - `unconstrained()` matches every id (the default),
/// - an explicit non-empty set matches exactly its members,
/// - the explicit empty set is the "match nothing" sentinel, used to express
///   "no parent" without a null sub-filter.
///
/// At the federation boundary the members are fully scope-encoded ids; the
/// dispatcher re-expresses them in a store's local key space before handing
/// the filter down, so engines only ever see bare local values.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IdSelector {
    ids: Option<BTreeSet<ScopedId>>,
}

impl IdSelector {
    /// Selector matching every id
    pub fn unconstrained() -> Self {
        IdSelector { ids: None }
    }

    /// Selector matching exactly the given ids
    ///
    /// An empty iterator produces the "match nothing" sentinel, not the
    /// unconstrained selector.
    pub fn of(ids: impl IntoIterator<Item = ScopedId>) -> Self {
        IdSelector {
            ids: Some(ids.into_iter().collect()),
        }
    }

    /// The "match nothing" sentinel
    pub fn match_nothing() -> Self {
        IdSelector {
            ids: Some(BTreeSet::new()),
        }
    }

    /// True when no constraint is present
    pub fn is_unconstrained(&self) -> bool {
        self.ids.is_none()
    }

    /// True for the explicit-empty sentinel
    pub fn is_match_nothing(&self) -> bool {
        matches!(&self.ids, Some(set) if set.is_empty())
    }

    /// The explicit id set, `None` when unconstrained
    pub fn explicit(&self) -> Option<&BTreeSet<ScopedId>> {
        self.ids.as_ref()
    }

    /// Whether `id` satisfies this constraint
    pub fn contains(&self, id: ScopedId) -> bool {
        match &self.ids {
            None => true,
            Some(set) => set.contains(&id),
        }
    }

    /// Whether a store-local key satisfies this constraint
    ///
    /// Only meaningful for selectors already re-expressed in local key space.
    pub fn matches_key(&self, key: LocalKey) -> bool {
        self.contains(ScopedId::from_raw(key.as_raw()))
    }

    /// Pointwise AND of two selectors
    ///
    /// Two disjoint non-empty explicit sets are a contradiction and raise
    /// `EmptyIntersection`; the sentinel absorbs everything without error.
    pub fn intersect(&self, other: &Self) -> Result<Self> {
        match (&self.ids, &other.ids) {
            (None, None) => Ok(IdSelector::unconstrained()),
            (Some(_), None) => Ok(self.clone()),
            (None, Some(_)) => Ok(other.clone()),
            (Some(a), Some(b)) => {
                if a.is_empty() || b.is_empty() {
                    return Ok(IdSelector::match_nothing());
                }
                let common: BTreeSet<ScopedId> = a.intersection(b).copied().collect();
                if common.is_empty() {
                    Err(CoreError::EmptyIntersection)
                } else {
                    Ok(IdSelector { ids: Some(common) })
                }
            }
        }
    }
}
