//! Generic filter over description-style resources
//!
//! One filter shape serves every resource kind whose payload implements
//! [`Resource`]; concrete kinds are type aliases. This replaces per-kind
//! filter/builder class ladders with a single configuration struct plus a
//! validating `build()`.

use crate::error::Result;
use crate::filter::ids::IdSelector;
use crate::filter::predicate::ValuePredicate;
use crate::filter::temporal::TemporalFilter;
use crate::filter::text::TextFilter;
use crate::filter::uid::{intersect_patterns, UidPattern};
use crate::filter::{intersect_opt, min_limit};
use crate::resource::{Feature, Resource, SystemDesc};
use crate::scoped_id::ScopedId;
use crate::filter::TimeRange;
use std::collections::BTreeSet;

/// Immutable filter over resources of type `R`
///
/// Built only through [`ResourceFilterBuilder`]; an empty filter accepts
/// everything. The id selector constrains keys, not payloads, so `test()`
/// ignores it; engines consult it separately when scanning.
pub struct ResourceFilter<R> {
    ids: IdSelector,
    uids: Option<BTreeSet<UidPattern>>,
    full_text: Option<TextFilter>,
    valid_time: Option<TemporalFilter>,
    value_predicate: Option<ValuePredicate<R>>,
    limit: Option<usize>,
}

/// Filter over system descriptions
pub type SystemFilter = ResourceFilter<SystemDesc>;
/// Builder for [`SystemFilter`]
pub type SystemFilterBuilder = ResourceFilterBuilder<SystemDesc>;
/// Filter over sampling features
pub type FeatureFilter = ResourceFilter<Feature>;
/// Builder for [`FeatureFilter`]
pub type FeatureFilterBuilder = ResourceFilterBuilder<Feature>;

impl<R> Default for ResourceFilter<R> {
    fn default() -> Self {
        ResourceFilter {
            ids: IdSelector::unconstrained(),
            uids: None,
            full_text: None,
            valid_time: None,
            value_predicate: None,
            limit: None,
        }
    }
}

// manual impls: a derive would demand `R: Clone`/`R: Debug`, but the payload
// type only ever appears behind the predicate's Arc
impl<R> Clone for ResourceFilter<R> {
    fn clone(&self) -> Self {
        ResourceFilter {
            ids: self.ids.clone(),
            uids: self.uids.clone(),
            full_text: self.full_text.clone(),
            valid_time: self.valid_time,
            value_predicate: self.value_predicate.clone(),
            limit: self.limit,
        }
    }
}

impl<R> std::fmt::Debug for ResourceFilter<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceFilter")
            .field("ids", &self.ids)
            .field("uids", &self.uids)
            .field("full_text", &self.full_text)
            .field("valid_time", &self.valid_time)
            .field("value_predicate", &self.value_predicate)
            .field("limit", &self.limit)
            .finish()
    }
}

impl<R> ResourceFilter<R> {
    /// Start building a filter
    pub fn builder() -> ResourceFilterBuilder<R> {
        ResourceFilterBuilder::default()
    }

    /// The filter accepting every resource
    pub fn all() -> Self {
        Self::default()
    }

    /// Id constraint
    pub fn ids(&self) -> &IdSelector {
        &self.ids
    }

    /// UID pattern constraint, if any
    pub fn uid_patterns(&self) -> Option<&BTreeSet<UidPattern>> {
        self.uids.as_ref()
    }

    /// Full-text constraint, if any
    pub fn full_text(&self) -> Option<&TextFilter> {
        self.full_text.as_ref()
    }

    /// Valid-time constraint, if any
    pub fn valid_time(&self) -> Option<&TemporalFilter> {
        self.valid_time.as_ref()
    }

    /// Opaque payload predicate, if any
    pub fn value_predicate(&self) -> Option<&ValuePredicate<R>> {
        self.value_predicate.as_ref()
    }

    /// Result-count limit, if any
    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// True when no payload or key constraint is present
    ///
    /// Engines use this to answer `count_matching` from index statistics
    /// instead of scanning.
    pub fn is_unconstrained(&self) -> bool {
        self.ids.is_unconstrained()
            && self.uids.is_none()
            && self.full_text.is_none()
            && self.valid_time.is_none()
            && self.value_predicate.is_none()
    }

    /// Derive a filter identical to this one but with the id selector replaced
    ///
    /// The dispatcher uses this to re-express a global id set in a store's
    /// local key space before handing the filter down.
    pub fn with_id_selector(&self, ids: IdSelector) -> Self {
        let mut derived = self.clone();
        derived.ids = ids;
        derived
    }

    /// Derive a builder initialized with this filter's constraints
    pub fn to_builder(&self) -> ResourceFilterBuilder<R> {
        ResourceFilterBuilder {
            ids: self.ids.clone(),
            uids: self
                .uids
                .iter()
                .flatten()
                .map(|p| p.to_string())
                .collect(),
            keywords: self
                .full_text
                .iter()
                .flat_map(|t| t.keywords().map(str::to_string))
                .collect(),
            valid_time: self.valid_time,
            value_predicate: self.value_predicate.clone(),
            limit: self.limit,
        }
    }

    /// Pointwise AND of two filters
    ///
    /// Field rules: set intersection for ids (disjoint explicit sets raise
    /// `EmptyIntersection`), coverage-aware intersection for UID patterns and
    /// keywords, range intersection for the time window, AND composition for
    /// value predicates, `min` for limits.
    pub fn intersect(&self, other: &Self) -> Result<Self>
    where
        R: 'static,
    {
        let ids = self.ids.intersect(&other.ids)?;
        let uids = intersect_opt(self.uids.as_ref(), other.uids.as_ref(), |a, b| {
            intersect_patterns(a, b)
        })?;
        let full_text = intersect_opt(self.full_text.as_ref(), other.full_text.as_ref(), |a, b| {
            a.intersect(b)
        })?;
        let valid_time = intersect_opt(
            self.valid_time.as_ref(),
            other.valid_time.as_ref(),
            |a, b| a.intersect(b),
        )?;
        let value_predicate = match (&self.value_predicate, &other.value_predicate) {
            (Some(a), Some(b)) => Some(a.and(b)),
            (Some(a), None) => Some(a.clone()),
            (None, Some(b)) => Some(b.clone()),
            (None, None) => None,
        };
        Ok(ResourceFilter {
            ids,
            uids,
            full_text,
            valid_time,
            value_predicate,
            limit: min_limit(self.limit, other.limit),
        })
    }
}

impl<R: Resource> ResourceFilter<R> {
    /// Evaluate all payload predicates with AND semantics
    ///
    /// A resource with no validity period counts as valid for all time. The
    /// id selector is a key-space constraint and is not evaluated here.
    pub fn test(&self, resource: &R) -> bool
    where
        R: 'static,
    {
        if let Some(patterns) = &self.uids {
            match resource.uid() {
                Some(uid) => {
                    if !patterns.iter().any(|p| p.matches(uid)) {
                        return false;
                    }
                }
                None => return false,
            }
        }
        if let Some(text) = &self.full_text {
            if !text.matches(resource.name(), resource.description()) {
                return false;
            }
        }
        if let Some(temporal) = &self.valid_time {
            let field = resource.valid_time().unwrap_or_else(TimeRange::all_time);
            if !temporal.matches_range(field) {
                return false;
            }
        }
        if let Some(predicate) = &self.value_predicate {
            if !predicate.test(resource) {
                return false;
            }
        }
        true
    }
}

/// Companion builder for [`ResourceFilter`]
///
/// UID patterns and keywords are collected raw and validated in `build()`,
/// which keeps the fluent chain infallible until the end.
pub struct ResourceFilterBuilder<R> {
    ids: IdSelector,
    uids: Vec<String>,
    keywords: Vec<String>,
    valid_time: Option<TemporalFilter>,
    value_predicate: Option<ValuePredicate<R>>,
    limit: Option<usize>,
}

impl<R> Default for ResourceFilterBuilder<R> {
    fn default() -> Self {
        ResourceFilterBuilder {
            ids: IdSelector::unconstrained(),
            uids: Vec::new(),
            keywords: Vec::new(),
            valid_time: None,
            value_predicate: None,
            limit: None,
        }
    }
}

impl<R> Clone for ResourceFilterBuilder<R> {
    fn clone(&self) -> Self {
        ResourceFilterBuilder {
            ids: self.ids.clone(),
            uids: self.uids.clone(),
            keywords: self.keywords.clone(),
            valid_time: self.valid_time,
            value_predicate: self.value_predicate.clone(),
            limit: self.limit,
        }
    }
}

impl<R> std::fmt::Debug for ResourceFilterBuilder<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceFilterBuilder")
            .field("ids", &self.ids)
            .field("uids", &self.uids)
            .field("keywords", &self.keywords)
            .field("valid_time", &self.valid_time)
            .field("value_predicate", &self.value_predicate)
            .field("limit", &self.limit)
            .finish()
    }
}

impl<R> ResourceFilterBuilder<R> {
    /// Constrain to an explicit id set
    ///
    /// An empty iterator installs the "match nothing" sentinel.
    pub fn with_ids(mut self, ids: impl IntoIterator<Item = ScopedId>) -> Self {
        self.ids = IdSelector::of(ids);
        self
    }

    /// Add one UID pattern (literal or trailing-`*` prefix)
    pub fn with_uid(mut self, pattern: impl Into<String>) -> Self {
        self.uids.push(pattern.into());
        self
    }

    /// Add several UID patterns
    pub fn with_uids<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.uids.extend(patterns.into_iter().map(Into::into));
        self
    }

    /// Add full-text keywords
    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords.extend(keywords.into_iter().map(Into::into));
        self
    }

    /// Constrain the validity period
    pub fn with_valid_time(mut self, temporal: TemporalFilter) -> Self {
        self.valid_time = Some(temporal);
        self
    }

    /// Shorthand for "valid at some point during `range`"
    pub fn valid_during(self, range: TimeRange) -> Self {
        self.with_valid_time(TemporalFilter::intersects(range))
    }

    /// Install an opaque payload predicate
    pub fn with_value_predicate(
        mut self,
        predicate: impl Fn(&R) -> bool + Send + Sync + 'static,
    ) -> Self
    where
        R: 'static,
    {
        self.value_predicate = Some(ValuePredicate::new(predicate));
        self
    }

    /// Cap the number of results
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Validate and freeze the filter
    pub fn build(self) -> Result<ResourceFilter<R>> {
        let uids = if self.uids.is_empty() {
            None
        } else {
            let mut patterns = BTreeSet::new();
            for raw in &self.uids {
                patterns.insert(UidPattern::parse(raw)?);
            }
            Some(patterns)
        };
        let full_text = if self.keywords.is_empty() {
            None
        } else {
            Some(TextFilter::new(&self.keywords)?)
        };
        Ok(ResourceFilter {
            ids: self.ids,
            uids,
            full_text,
            valid_time: self.valid_time,
            value_predicate: self.value_predicate,
            limit: self.limit,
        })
    }
}
