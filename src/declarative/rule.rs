//! Builder for declarative transition rules.

use super::guard::Guard;

/// One declared transition: on `trigger`, from any of the source states, to
/// an optional target, if the guard passes.
///
/// A rule without a target keeps the machine in its current state.
///
/// # Example
///
/// ```rust
/// use statekit::declarative::{Guard, Rule};
/// use statekit::state_enum;
///
/// state_enum! {
///     enum Phase {
///         Draft,
///         Review,
///         Published,
///     }
/// }
///
/// struct Post {
///     approvals: u32,
/// }
///
/// let approved = Guard::new(|post: &Post| post.approvals >= 2);
///
/// let rule: Rule<Phase, &str, Post> = Rule::new("approve")
///     .from(Phase::Review)
///     .to(Phase::Published)
///     .when(approved)
///     .otherwise(Phase::Review);
/// ```
pub struct Rule<S, T, M> {
    pub(crate) trigger: T,
    pub(crate) sources: Vec<S>,
    pub(crate) target: Option<S>,
    pub(crate) guard: Option<Guard<M>>,
    pub(crate) alternative: Option<S>,
}

impl<S, T, M: 'static> Rule<S, T, M> {
    pub fn new(trigger: T) -> Self {
        Self {
            trigger,
            sources: Vec::new(),
            target: None,
            guard: None,
            alternative: None,
        }
    }

    /// Add a source state. May be called repeatedly.
    pub fn from(mut self, state: S) -> Self {
        self.sources.push(state);
        self
    }

    pub fn to(mut self, state: S) -> Self {
        self.target = Some(state);
        self
    }

    pub fn when(mut self, guard: Guard<M>) -> Self {
        self.guard = Some(guard);
        self
    }

    pub fn when_not(mut self, guard: Guard<M>) -> Self {
        self.guard = Some(guard.negate());
        self
    }

    /// Target taken when the guard fails.
    pub fn otherwise(mut self, state: S) -> Self {
        self.alternative = Some(state);
        self
    }
}

/// A single `(source, trigger)` branch produced by expanding a rule.
pub(crate) struct Branch<S, M> {
    pub(crate) target: Option<S>,
    pub(crate) guard: Option<Guard<M>>,
}

impl<S: Clone, T, M: 'static> Rule<S, T, M> {
    /// Branches this rule contributes to every one of its sources, in
    /// evaluation order.
    pub(crate) fn branches(&self) -> Vec<Branch<S, M>> {
        let mut branches = vec![Branch {
            target: self.target.clone(),
            guard: self.guard.clone(),
        }];
        if let Some(alternative) = &self.alternative {
            branches.push(Branch {
                target: Some(alternative.clone()),
                guard: self.guard.as_ref().map(Guard::negate),
            });
        }
        branches
    }
}
