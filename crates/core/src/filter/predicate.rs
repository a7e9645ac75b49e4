//! Opaque value predicate
//!
//! The escape hatch of the algebra: an arbitrary boolean test over the
//! resource payload, for constraints the structured fields cannot express.
//! Wrapped in an `Arc` so filters stay cheaply cloneable.

use std::fmt;
use std::sync::Arc;

/// Arbitrary boolean test over a resource payload
pub struct ValuePredicate<T: ?Sized> {
    test: Arc<dyn Fn(&T) -> bool + Send + Sync>,
}

impl<T: ?Sized + 'static> ValuePredicate<T> {
    /// Wrap a closure
    pub fn new(test: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
        ValuePredicate {
            test: Arc::new(test),
        }
    }

    /// Evaluate against a value
    pub fn test(&self, value: &T) -> bool {
        (self.test)(value)
    }

    /// AND composition of two predicates
    pub fn and(&self, other: &Self) -> Self {
        let a = Arc::clone(&self.test);
        let b = Arc::clone(&other.test);
        ValuePredicate {
            test: Arc::new(move |v| a(v) && b(v)),
        }
    }
}

impl<T: ?Sized> Clone for ValuePredicate<T> {
    fn clone(&self) -> Self {
        ValuePredicate {
            test: Arc::clone(&self.test),
        }
    }
}

impl<T: ?Sized> fmt::Debug for ValuePredicate<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ValuePredicate(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predicate_evaluation() {
        let positive = ValuePredicate::new(|v: &i64| *v > 0);
        assert!(positive.test(&5));
        assert!(!positive.test(&-5));
    }

    #[test]
    fn test_and_composition() {
        let positive = ValuePredicate::new(|v: &i64| *v > 0);
        let small = ValuePredicate::new(|v: &i64| *v < 10);
        let both = positive.and(&small);

        assert!(both.test(&5));
        assert!(!both.test(&50));
        assert!(!both.test(&-1));
    }

    #[test]
    fn test_clone_shares_closure() {
        let counter = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let captured = Arc::clone(&counter);
        let pred = ValuePredicate::new(move |_: &()| {
            captured.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            true
        });

        let cloned = pred.clone();
        pred.test(&());
        cloned.test(&());
        assert_eq!(counter.load(std::sync::atomic::Ordering::SeqCst), 2);
    }
}
