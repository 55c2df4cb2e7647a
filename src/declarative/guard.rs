//! Guard predicates for controlling declarative transitions.
//!
//! Guards are pure boolean functions over the machine's model, evaluated
//! right before a transition commits. Every guard has an identity: a negated
//! guard keeps the identity of the guard it negates, which is how the table
//! builder recognizes two rules as mutually exclusive.

use std::fmt;
use std::ops::Not;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_GUARD_ID: AtomicU64 = AtomicU64::new(0);

/// A predicate over the model `M`.
///
/// # Example
///
/// ```rust
/// use statekit::declarative::Guard;
///
/// struct Order {
///     paid: bool,
///     items: usize,
/// }
///
/// let paid = Guard::new(|order: &Order| order.paid);
/// let unpaid = !paid.clone();
///
/// let order = Order { paid: false, items: 2 };
/// assert!(!paid.check(&order));
/// assert!(unpaid.check(&order));
/// assert!(unpaid.excludes(&paid));
///
/// let shippable = paid.and(Guard::new(|order: &Order| order.items > 0));
/// assert!(!shippable.check(&order));
/// ```
pub struct Guard<M> {
    id: u64,
    negated: bool,
    predicate: Arc<dyn Fn(&M) -> bool + Send + Sync>,
}

impl<M: 'static> Guard<M> {
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&M) -> bool + Send + Sync + 'static,
    {
        Guard {
            id: NEXT_GUARD_ID.fetch_add(1, Ordering::Relaxed),
            negated: false,
            predicate: Arc::new(predicate),
        }
    }

    pub fn check(&self, model: &M) -> bool {
        (self.predicate)(model) != self.negated
    }

    /// The complementary guard. It shares this guard's identity.
    pub fn negate(&self) -> Self {
        Guard {
            id: self.id,
            negated: !self.negated,
            predicate: Arc::clone(&self.predicate),
        }
    }

    /// Passes when both guards pass. The result is a new guard.
    pub fn and(self, other: Guard<M>) -> Self {
        Guard::new(move |model: &M| self.check(model) && other.check(model))
    }

    /// Passes when either guard passes. The result is a new guard.
    pub fn or(self, other: Guard<M>) -> Self {
        Guard::new(move |model: &M| self.check(model) || other.check(model))
    }

    /// Whether the two guards can never pass together.
    pub fn excludes(&self, other: &Guard<M>) -> bool {
        self.id == other.id && self.negated != other.negated
    }

    pub fn is_negated(&self) -> bool {
        self.negated
    }
}

impl<M> Clone for Guard<M> {
    fn clone(&self) -> Self {
        Guard {
            id: self.id,
            negated: self.negated,
            predicate: Arc::clone(&self.predicate),
        }
    }
}

impl<M: 'static> Not for Guard<M> {
    type Output = Guard<M>;

    fn not(self) -> Self::Output {
        self.negate()
    }
}

impl<M> fmt::Debug for Guard<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Guard")
            .field("id", &self.id)
            .field("negated", &self.negated)
            .finish()
    }
}
