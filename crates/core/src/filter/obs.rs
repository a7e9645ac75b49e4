//! Filter over observation records
//!
//! Observations are point-in-time records, so the temporal constraint here is
//! a plain range over phenomenon time. The nested system sub-filter selects
//! observations by properties of their producing system; the dispatcher
//! resolves it to an explicit system id set before handing the filter to a
//! store, so record-level evaluation only ever sees ids.

use crate::error::Result;
use crate::filter::ids::IdSelector;
use crate::filter::predicate::ValuePredicate;
use crate::filter::resource::{SystemFilter, SystemFilterBuilder};
use crate::filter::temporal::TimeRange;
use crate::filter::{intersect_opt, min_limit};
use crate::resource::ObsRecord;
use crate::scoped_id::ScopedId;

/// Immutable filter over [`ObsRecord`] entries
#[derive(Debug, Clone, Default)]
pub struct ObsFilter {
    ids: IdSelector,
    systems: Option<Box<SystemFilter>>,
    phenomenon_time: Option<TimeRange>,
    value_predicate: Option<ValuePredicate<ObsRecord>>,
    limit: Option<usize>,
}

impl ObsFilter {
    /// Start building a filter
    pub fn builder() -> ObsFilterBuilder {
        ObsFilterBuilder::default()
    }

    /// The filter accepting every observation
    pub fn all() -> Self {
        Self::default()
    }

    /// Observation id constraint
    pub fn ids(&self) -> &IdSelector {
        &self.ids
    }

    /// Related-system sub-filter, if any
    pub fn systems(&self) -> Option<&SystemFilter> {
        self.systems.as_deref()
    }

    /// Phenomenon-time window, if any
    pub fn phenomenon_time(&self) -> Option<TimeRange> {
        self.phenomenon_time
    }

    /// Opaque payload predicate, if any
    pub fn value_predicate(&self) -> Option<&ValuePredicate<ObsRecord>> {
        self.value_predicate.as_ref()
    }

    /// Result-count limit, if any
    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// True when no constraint beyond the limit is present
    pub fn is_unconstrained(&self) -> bool {
        self.ids.is_unconstrained()
            && self.systems.is_none()
            && self.phenomenon_time.is_none()
            && self.value_predicate.is_none()
    }

    /// Evaluate record-local predicates with AND semantics
    ///
    /// Checks the phenomenon-time window, the system id set (when the nested
    /// sub-filter has been reduced to explicit ids) and the value predicate.
    /// The observation id selector is a key-space constraint and is not
    /// evaluated here.
    pub fn test(&self, record: &ObsRecord) -> bool {
        if let Some(window) = self.phenomenon_time {
            if !window.contains(record.phenomenon_time) {
                return false;
            }
        }
        if let Some(systems) = &self.systems {
            if !systems.ids().contains(record.system_id) {
                return false;
            }
        }
        if let Some(predicate) = &self.value_predicate {
            if !predicate.test(record) {
                return false;
            }
        }
        true
    }

    /// Pointwise AND of two filters; sub-filters intersect recursively
    pub fn intersect(&self, other: &Self) -> Result<Self> {
        let ids = self.ids.intersect(&other.ids)?;
        let systems = intersect_opt(self.systems.as_deref(), other.systems.as_deref(), |a, b| {
            a.intersect(b)
        })?
        .map(Box::new);
        let phenomenon_time = intersect_opt(
            self.phenomenon_time.as_ref(),
            other.phenomenon_time.as_ref(),
            |a, b| a.intersect(*b),
        )?;
        let value_predicate = match (&self.value_predicate, &other.value_predicate) {
            (Some(a), Some(b)) => Some(a.and(b)),
            (Some(a), None) => Some(a.clone()),
            (None, Some(b)) => Some(b.clone()),
            (None, None) => None,
        };
        Ok(ObsFilter {
            ids,
            systems,
            phenomenon_time,
            value_predicate,
            limit: min_limit(self.limit, other.limit),
        })
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

    /// Derive a filter identical to this one but with the system sub-filter
    /// replaced
    ///
    /// The dispatcher uses this to substitute a resolved explicit id set for
    /// a descriptive sub-filter.
    pub fn with_resolved_systems(&self, systems: SystemFilter) -> Self {
        let mut derived = self.clone();
        derived.systems = Some(Box::new(systems));
        derived
    }
}

/// Companion builder for [`ObsFilter`]
#[derive(Debug, Clone, Default)]
pub struct ObsFilterBuilder {
    ids: IdSelector,
    systems: Option<SystemFilterBuilder>,
    phenomenon_time: Option<TimeRange>,
    value_predicate: Option<ValuePredicate<ObsRecord>>,
    limit: Option<usize>,
}

impl ObsFilterBuilder {
    /// Constrain to an explicit observation id set
    pub fn with_ids(mut self, ids: impl IntoIterator<Item = ScopedId>) -> Self {
        self.ids = IdSelector::of(ids);
        self
    }

    /// Constrain by properties of the producing system
    ///
    /// The closure receives a fresh system filter builder and returns it
    /// configured; the built sub-filter is installed when this builder
    /// builds. "No system" is expressed as `with_systems(|b| b.with_ids([]))`
    /// (the sentinel-empty id set), never as an absent sub-filter.
    pub fn with_systems<F>(mut self, configure: F) -> Self
    where
        F: FnOnce(SystemFilterBuilder) -> SystemFilterBuilder,
    {
        self.systems = Some(configure(SystemFilter::builder()));
        self
    }

    /// Constrain the phenomenon-time window
    pub fn with_phenomenon_time(mut self, window: TimeRange) -> Self {
        self.phenomenon_time = Some(window);
        self
    }

    /// Install an opaque payload predicate
    pub fn with_value_predicate(
        mut self,
        predicate: impl Fn(&ObsRecord) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.value_predicate = Some(ValuePredicate::new(predicate));
        self
    }

    /// Cap the number of results
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Validate and freeze the filter
    pub fn build(self) -> Result<ObsFilter> {
        let systems = self.systems.map(|b| b.build()).transpose()?.map(Box::new);
        Ok(ObsFilter {
            ids: self.ids,
            systems,
            phenomenon_time: self.phenomenon_time,
            value_predicate: self.value_predicate,
            limit: self.limit,
        })
    }
}
