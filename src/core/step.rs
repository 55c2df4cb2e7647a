//! The result a state returns from handling one income.

/// What the machine should do after a state handled an income.
///
/// A handler returns exactly one `Step`, so a single handling can request at
/// most one transition, and nothing can follow an abort.
///
/// `N` is whatever the state installs on transition (its `StateSlot::Next`),
/// `I` the income type and `O` the outcome type.
#[derive(Debug)]
pub enum Step<N, I, O> {
    /// Stay in the current state and emit an outcome.
    Continue(O),

    /// Install `next`, emit `outcome`, then replay deferred incomes.
    Transition { next: N, outcome: O },

    /// Install `next`, emit `outcome`, then close the machine.
    Finish { next: N, outcome: O },

    /// Postpone the income until the next transition.
    ///
    /// Carry back the income the handler received, as is. The machine queues
    /// whatever value this holds and replays it verbatim.
    Defer(I),

    /// Install `next`, optionally emit `outcome`, and hand `income` to the
    /// new state ahead of every other deferred income.
    Forward {
        next: N,
        income: I,
        outcome: Option<O>,
    },

    /// Close the machine. Deferred incomes are discarded.
    Abort { reason: String, outcome: Option<O> },
}

impl<N, I, O> Step<N, I, O> {
    pub fn stay(outcome: O) -> Self {
        Self::Continue(outcome)
    }

    pub fn to(next: N, outcome: O) -> Self {
        Self::Transition { next, outcome }
    }

    pub fn finish(next: N, outcome: O) -> Self {
        Self::Finish { next, outcome }
    }

    /// Hand the received income back for replay after the next transition.
    pub fn defer(income: I) -> Self {
        Self::Defer(income)
    }

    pub fn forward(next: N, income: I) -> Self {
        Self::Forward {
            next,
            income,
            outcome: None,
        }
    }

    pub fn forward_with(next: N, income: I, outcome: O) -> Self {
        Self::Forward {
            next,
            income,
            outcome: Some(outcome),
        }
    }

    pub fn abort(reason: impl Into<String>) -> Self {
        Self::Abort {
            reason: reason.into(),
            outcome: None,
        }
    }

    pub fn abort_with(reason: impl Into<String>, outcome: O) -> Self {
        Self::Abort {
            reason: reason.into(),
            outcome: Some(outcome),
        }
    }

    /// Whether this step installs a new state.
    pub fn is_transition(&self) -> bool {
        matches!(
            self,
            Self::Transition { .. } | Self::Finish { .. } | Self::Forward { .. }
        )
    }

    /// Convert the installed state, keeping everything else.
    pub fn map_next<M, F>(self, f: F) -> Step<M, I, O>
    where
        F: FnOnce(N) -> M,
    {
        match self {
            Self::Continue(outcome) => Step::Continue(outcome),
            Self::Transition { next, outcome } => Step::Transition {
                next: f(next),
                outcome,
            },
            Self::Finish { next, outcome } => Step::Finish {
                next: f(next),
                outcome,
            },
            Self::Defer(income) => Step::Defer(income),
            Self::Forward {
                next,
                income,
                outcome,
            } => Step::Forward {
                next: f(next),
                income,
                outcome,
            },
            Self::Abort { reason, outcome } => Step::Abort { reason, outcome },
        }
    }
}
