//! Resource filter algebra
//!
//! Immutable filters built through companion builders, with logical-AND
//! intersection. Intersecting two filters whose constraints provably match
//! nothing raises [`CoreError::EmptyIntersection`](crate::error::CoreError);
//! callers short-circuit to an empty result instead of dispatching to
//! storage.
//!
//! The pieces:
//! - [`IdSelector`] — explicit id sets, with a "match nothing" sentinel
//! - [`UidPattern`] — literal / trailing-`*` patterns over UID strings
//! - [`TextFilter`] — keyword sets with prefix-match semantics
//! - [`TimeRange`] / [`TemporalFilter`] — temporal windows and match modes
//! - [`ValuePredicate`] — opaque payload predicates
//! - [`ResourceFilter`] (aliased per kind) and [`ObsFilter`] — the concrete
//!   filters engines and the dispatcher consume

pub mod ids;
pub mod obs;
pub mod predicate;
pub mod resource;
pub mod temporal;
pub mod text;
pub mod uid;

pub use ids::IdSelector;
pub use obs::{ObsFilter, ObsFilterBuilder};
pub use predicate::ValuePredicate;
pub use resource::{
    FeatureFilter, FeatureFilterBuilder, ResourceFilter, ResourceFilterBuilder, SystemFilter,
    SystemFilterBuilder,
};
pub use temporal::{TemporalFilter, TemporalMode, TimeRange};
pub use text::TextFilter;
pub use uid::UidPattern;

use crate::error::Result;

/// AND two optional constraints; an absent side means "unconstrained"
pub(crate) fn intersect_opt<T: Clone>(
    a: Option<&T>,
    b: Option<&T>,
    combine: impl FnOnce(&T, &T) -> Result<T>,
) -> Result<Option<T>> {
    match (a, b) {
        (Some(x), Some(y)) => combine(x, y).map(Some),
        (Some(x), None) => Ok(Some(x.clone())),
        (None, Some(y)) => Ok(Some(y.clone())),
        (None, None) => Ok(None),
    }
}

/// Intersect two optional limits as `min`
pub(crate) fn min_limit(a: Option<usize>, b: Option<usize>) -> Option<usize> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.min(y)),
        (Some(x), None) => Some(x),
        (None, Some(y)) => Some(y),
        (None, None) => None,
    }
}
