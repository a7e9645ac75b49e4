//! Temporal ranges and the valid-time predicate
//!
//! [`TimeRange`] is a closed interval used both as data (resource validity
//! periods) and as a query constraint on point times (observation phenomenon
//! time). [`TemporalFilter`] adds the match mode needed for range-valued
//! fields: a query usually wants ranges that *intersect* the window, while
//! retention wants ranges lying entirely *within* it.

use crate::error::{CoreError, Result};
use crate::timestamp::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed time interval `[begin, end]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    begin: Timestamp,
    end: Timestamp,
}

impl TimeRange {
    /// Create a range, rejecting `begin > end`
    pub fn new(begin: Timestamp, end: Timestamp) -> Result<Self> {
        if begin > end {
            return Err(CoreError::InvalidArgument(format!(
                "time range begin {begin} is after end {end}"
            )));
        }
        Ok(TimeRange { begin, end })
    }

    /// The unbounded range
    pub fn all_time() -> Self {
        TimeRange {
            begin: Timestamp::EPOCH,
            end: Timestamp::MAX,
        }
    }

    /// Everything up to and including `t`
    pub fn before(t: Timestamp) -> Self {
        TimeRange {
            begin: Timestamp::EPOCH,
            end: t,
        }
    }

    /// Everything at or after `t`
    pub fn after(t: Timestamp) -> Self {
        TimeRange {
            begin: t,
            end: Timestamp::MAX,
        }
    }

    /// The instantaneous range `[t, t]`
    pub fn at(t: Timestamp) -> Self {
        TimeRange { begin: t, end: t }
    }

    /// Range start
    pub fn begin(&self) -> Timestamp {
        self.begin
    }

    /// Range end
    pub fn end(&self) -> Timestamp {
        self.end
    }

    /// Whether a point time falls inside this range
    pub fn contains(&self, t: Timestamp) -> bool {
        self.begin <= t && t <= self.end
    }

    /// Whether `other` lies entirely inside this range
    pub fn contains_range(&self, other: TimeRange) -> bool {
        self.begin <= other.begin && other.end <= self.end
    }

    /// Whether the two ranges overlap
    pub fn intersects(&self, other: TimeRange) -> bool {
        self.begin <= other.end && other.begin <= self.end
    }

    /// Range intersection; disjoint ranges are a contradiction
    pub fn intersect(&self, other: TimeRange) -> Result<TimeRange> {
        if !self.intersects(other) {
            return Err(CoreError::EmptyIntersection);
        }
        Ok(TimeRange {
            begin: self.begin.max(other.begin),
            end: self.end.min(other.end),
        })
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.begin, self.end)
    }
}

/// How a range-valued field is matched against a query window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemporalMode {
    /// Field range overlaps the window (the usual query semantics)
    Intersects,
    /// Field range lies entirely inside the window (retention semantics)
    Within,
}

/// Query window plus match mode for range-valued temporal fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemporalFilter {
    range: TimeRange,
    mode: TemporalMode,
}

impl TemporalFilter {
    /// Match field ranges overlapping `range`
    pub fn intersects(range: TimeRange) -> Self {
        TemporalFilter {
            range,
            mode: TemporalMode::Intersects,
        }
    }

    /// Match field ranges entirely inside `range`
    pub fn within(range: TimeRange) -> Self {
        TemporalFilter {
            range,
            mode: TemporalMode::Within,
        }
    }

    /// The query window
    pub fn range(&self) -> TimeRange {
        self.range
    }

    /// The match mode
    pub fn mode(&self) -> TemporalMode {
        self.mode
    }

    /// Whether a field range satisfies this predicate
    pub fn matches_range(&self, field: TimeRange) -> bool {
        match self.mode {
            TemporalMode::Intersects => self.range.intersects(field),
            TemporalMode::Within => self.range.contains_range(field),
        }
    }

    /// Pointwise AND of two temporal predicates
    ///
    /// Windows intersect as ranges; the stricter mode survives.
    pub fn intersect(&self, other: &Self) -> Result<Self> {
        let range = self.range.intersect(other.range)?;
        let mode = if self.mode == TemporalMode::Within || other.mode == TemporalMode::Within {
            TemporalMode::Within
        } else {
            TemporalMode::Intersects
        };
        Ok(TemporalFilter { range, mode })
    }
}
