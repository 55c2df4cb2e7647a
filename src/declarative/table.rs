//! Transition tables and their builder.

use super::error::DeclarationError;
use super::machine::{AsyncDeclarativeMachine, DeclarativeMachine, Declared};
use super::rule::{Branch, Rule};
use crate::core::StateSlot;
use crate::error::{BoxError, StateError};
use futures_util::future::BoxFuture;
use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

type Immediate<M, I, O> = Arc<dyn Fn(&mut M, I) -> Result<O, StateError> + Send + Sync>;
type Suspending<M, I, O> =
    Arc<dyn for<'m> Fn(&'m mut M, I) -> BoxFuture<'m, Result<O, StateError>> + Send + Sync>;
pub(crate) type Returns<M, O> = Arc<dyn Fn(&M) -> O + Send + Sync>;
type FallbackFilter = Arc<dyn Fn(&BoxError) -> bool + Send + Sync>;

/// Work bound to a trigger.
pub(crate) enum Action<M, I, O> {
    Immediate(Immediate<M, I, O>),
    /// Only runs on the suspension-capable engines.
    Suspending(Suspending<M, I, O>),
}

/// What a `(state, trigger)` pair resolves to.
pub(crate) enum Route<S, M, O> {
    /// Run the action, then take the first branch whose guard passes.
    Guarded(Vec<Branch<S, M>>),
    /// Skip the action and answer from the model.
    Idempotent(Returns<M, O>),
}

struct Fallback<S> {
    state: S,
    filter: Option<FallbackFilter>,
}

/// Validated, immutable transition table shared by every machine built
/// from it.
///
/// `S` is the state tag (usually a [`state_enum!`](crate::state_enum) enum),
/// `T` the trigger type, `M` the model the actions and guards work on, `I`
/// the action income and `O` the outcome.
pub struct TransitionTable<S, T, M, I, O> {
    initial: S,
    finals: HashSet<S>,
    fallbacks: Vec<Fallback<S>>,
    actions: HashMap<T, Action<M, I, O>>,
    routes: HashMap<(S, T), Route<S, M, O>>,
}

impl<S, T, M, I, O> TransitionTable<S, T, M, I, O>
where
    S: StateSlot<Next = S> + Clone + Eq + Hash + Debug + Sync + 'static,
    T: Clone + Eq + Hash + Debug + Send + Sync + 'static,
    M: Send + 'static,
    I: 'static,
    O: 'static,
{
    pub fn builder() -> TransitionTableBuilder<S, T, M, I, O> {
        TransitionTableBuilder::new()
    }

    pub fn initial(&self) -> &S {
        &self.initial
    }

    pub fn is_final(&self, state: &S) -> bool {
        self.finals.contains(state)
    }

    /// Triggers accepted in `state`, in no particular order.
    pub fn triggers(&self, state: &S) -> Vec<&T> {
        self.routes
            .keys()
            .filter(|(source, _)| source == state)
            .map(|(_, trigger)| trigger)
            .collect()
    }

    /// A blocking machine over `model`, starting in the initial state.
    pub fn machine(self: &Arc<Self>, model: M) -> DeclarativeMachine<S, T, M, I, O>
    where
        I: Debug,
    {
        DeclarativeMachine::new(self.declared(model))
    }

    /// A suspension-capable machine over `model`, starting in the initial
    /// state. The only way to run tables with suspending actions.
    pub fn async_machine(self: &Arc<Self>, model: M) -> AsyncDeclarativeMachine<S, T, M, I, O>
    where
        I: Debug + Send,
        O: Send,
    {
        AsyncDeclarativeMachine::new(self.declared(model))
    }

    /// The table and `model` as a plain state, for use with any engine.
    pub fn declared(self: &Arc<Self>, model: M) -> Declared<S, T, M, I, O> {
        Declared::new(Arc::clone(self), self.initial.clone(), model)
    }

    pub(crate) fn route(&self, state: &S, trigger: &T) -> Option<&Route<S, M, O>> {
        self.routes.get(&(state.clone(), trigger.clone()))
    }

    pub(crate) fn action(&self, trigger: &T) -> Option<&Action<M, I, O>> {
        self.actions.get(trigger)
    }

    /// First fallback state accepting `error`, in declaration order.
    pub(crate) fn fallback_for(&self, error: &StateError) -> Option<S> {
        let StateError::Failed(source) = error else {
            return None;
        };
        self.fallbacks
            .iter()
            .find(|fallback| fallback.filter.as_ref().map_or(true, |accepts| accepts(source)))
            .map(|fallback| fallback.state.clone())
    }
}

/// Fluent builder for [`TransitionTable`].
///
/// Errors are collected and reported by [`build`](Self::build).
///
/// # Example
///
/// ```rust
/// use statekit::declarative::{Rule, TransitionTable};
/// use statekit::state_enum;
///
/// state_enum! {
///     enum Door {
///         Closed,
///         Opened,
///     }
/// }
///
/// let table = TransitionTable::builder()
///     .initial(Door::Closed)
///     .state(Door::Opened)
///     .action("open", |_: &mut (), _: ()| Ok("Opened"))
///     .action("close", |_: &mut (), _: ()| Ok("Closed"))
///     .rule(Rule::new("open").from(Door::Closed).to(Door::Opened))
///     .rule(Rule::new("close").from(Door::Opened).to(Door::Closed))
///     .build()
///     .unwrap();
///
/// let mut door = table.machine(());
/// assert_eq!(door.fire("open", ()).unwrap(), "Opened");
/// assert!(door.fire("open", ()).unwrap_err().is_invalid_state());
/// ```
pub struct TransitionTableBuilder<S, T, M, I, O> {
    initials: Vec<S>,
    states: Vec<S>,
    finals: Vec<S>,
    fallbacks: Vec<Fallback<S>>,
    actions: Vec<(T, Action<M, I, O>)>,
    rules: Vec<Rule<S, T, M>>,
    idempotent: Vec<(T, S, Returns<M, O>)>,
}

impl<S, T, M, I, O> TransitionTableBuilder<S, T, M, I, O>
where
    S: StateSlot<Next = S> + Clone + Eq + Hash + Debug + Sync + 'static,
    T: Clone + Eq + Hash + Debug + Send + Sync + 'static,
    M: Send + 'static,
    I: 'static,
    O: 'static,
{
    pub fn new() -> Self {
        Self {
            initials: Vec::new(),
            states: Vec::new(),
            finals: Vec::new(),
            fallbacks: Vec::new(),
            actions: Vec::new(),
            rules: Vec::new(),
            idempotent: Vec::new(),
        }
    }

    pub fn initial(mut self, state: S) -> Self {
        self.initials.push(state);
        self
    }

    pub fn state(mut self, state: S) -> Self {
        self.states.push(state);
        self
    }

    /// Declare a state that terminates the machine once entered.
    pub fn final_state(mut self, state: S) -> Self {
        self.finals.push(state);
        self
    }

    /// Declare a state entered whenever an action fails.
    pub fn fallback(mut self, state: S) -> Self {
        self.fallbacks.push(Fallback {
            state,
            filter: None,
        });
        self
    }

    /// Declare a state entered when an action fails with an error accepted
    /// by `filter`.
    pub fn fallback_when<F>(mut self, state: S, filter: F) -> Self
    where
        F: Fn(&BoxError) -> bool + Send + Sync + 'static,
    {
        self.fallbacks.push(Fallback {
            state,
            filter: Some(Arc::new(filter)),
        });
        self
    }

    /// Bind the action run when `trigger` fires.
    pub fn action<F>(mut self, trigger: T, action: F) -> Self
    where
        F: Fn(&mut M, I) -> Result<O, StateError> + Send + Sync + 'static,
    {
        let action: Immediate<M, I, O> = Arc::new(action);
        self.actions.push((trigger, Action::Immediate(action)));
        self
    }

    /// Bind an action that may await before producing its outcome.
    ///
    /// Firing such a trigger on a blocking engine fails with
    /// [`StateError::InvalidState`].
    ///
    /// ```rust
    /// use statekit::declarative::{Rule, TransitionTable};
    /// use statekit::state_enum;
    ///
    /// state_enum! {
    ///     enum Link {
    ///         Down,
    ///         Up,
    ///     }
    /// }
    ///
    /// let table = TransitionTable::builder()
    ///     .initial(Link::Down)
    ///     .state(Link::Up)
    ///     .async_action("dial", |attempts: &mut u32, host: &'static str| {
    ///         Box::pin(async move {
    ///             *attempts += 1;
    ///             Ok(format!("dialed {host}"))
    ///         })
    ///     })
    ///     .rule(Rule::new("dial").from(Link::Down).to(Link::Up))
    ///     .build()
    ///     .unwrap();
    ///
    /// let mut link = table.async_machine(0);
    /// let outcome = futures_util::FutureExt::now_or_never(link.fire("dial", "db")).unwrap();
    /// assert_eq!(outcome.unwrap(), "dialed db");
    /// assert_eq!(*link.model(), 1);
    /// ```
    pub fn async_action<F>(mut self, trigger: T, action: F) -> Self
    where
        F: for<'m> Fn(&'m mut M, I) -> BoxFuture<'m, Result<O, StateError>>
            + Send
            + Sync
            + 'static,
    {
        let action: Suspending<M, I, O> = Arc::new(action);
        self.actions.push((trigger, Action::Suspending(action)));
        self
    }

    pub fn rule(mut self, rule: Rule<S, T, M>) -> Self {
        self.rules.push(rule);
        self
    }

    /// Answer `trigger` in `state` from the model alone, without running the
    /// action or changing state.
    pub fn idempotent<F>(mut self, trigger: T, state: S, returns: F) -> Self
    where
        F: Fn(&M) -> O + Send + Sync + 'static,
    {
        let returns: Returns<M, O> = Arc::new(returns);
        self.idempotent.push((trigger, state, returns));
        self
    }

    pub fn build(self) -> Result<Arc<TransitionTable<S, T, M, I, O>>, DeclarationError> {
        let initial = match self.initials.as_slice() {
            [] => return Err(DeclarationError::MissingInitialState),
            [initial] => initial.clone(),
            [first, second, ..] => {
                return Err(DeclarationError::MultipleInitialStates {
                    first: first.name().to_string(),
                    second: second.name().to_string(),
                })
            }
        };

        if self.rules.is_empty() && self.idempotent.is_empty() {
            return Err(DeclarationError::EmptyTable);
        }

        if let Some(fallback) = self
            .fallbacks
            .iter()
            .find(|fallback| self.finals.contains(&fallback.state))
        {
            return Err(DeclarationError::FinalFallback {
                state: fallback.state.name().to_string(),
            });
        }

        let declared: HashSet<&S> = self
            .initials
            .iter()
            .chain(&self.states)
            .chain(&self.finals)
            .chain(self.fallbacks.iter().map(|fallback| &fallback.state))
            .collect();
        let check_declared = |state: &S| {
            if declared.contains(state) {
                Ok(())
            } else {
                Err(DeclarationError::UndeclaredState {
                    state: state.name().to_string(),
                })
            }
        };

        let mut actions = HashMap::new();
        for (trigger, action) in self.actions {
            if actions.contains_key(&trigger) {
                return Err(DeclarationError::DuplicateAction {
                    trigger: format!("{trigger:?}"),
                });
            }
            actions.insert(trigger, action);
        }

        let mut guarded: HashMap<(S, T), Vec<Branch<S, M>>> = HashMap::new();

        for rule in &self.rules {
            if rule.sources.is_empty() {
                return Err(DeclarationError::RuleWithoutSource {
                    trigger: format!("{:?}", rule.trigger),
                });
            }
            if !actions.contains_key(&rule.trigger) {
                return Err(DeclarationError::MissingAction {
                    trigger: format!("{:?}", rule.trigger),
                });
            }
            for state in rule.target.iter().chain(&rule.alternative) {
                check_declared(state)?;
            }

            for source in &rule.sources {
                check_declared(source)?;
                guarded
                    .entry((source.clone(), rule.trigger.clone()))
                    .or_default()
                    .extend(rule.branches());
            }
        }

        for ((source, trigger), branches) in &guarded {
            if !branches_exclusive(branches) {
                return Err(DeclarationError::AmbiguousRule {
                    state: source.name().to_string(),
                    trigger: format!("{trigger:?}"),
                });
            }
        }

        let mut routes: HashMap<(S, T), Route<S, M, O>> = guarded
            .into_iter()
            .map(|(key, branches)| (key, Route::Guarded(branches)))
            .collect();

        for (trigger, state, returns) in self.idempotent {
            check_declared(&state)?;
            if routes.contains_key(&(state.clone(), trigger.clone())) {
                return Err(DeclarationError::AmbiguousRule {
                    state: state.name().to_string(),
                    trigger: format!("{trigger:?}"),
                });
            }
            routes.insert((state, trigger), Route::Idempotent(returns));
        }

        Ok(Arc::new(TransitionTable {
            initial,
            finals: self.finals.into_iter().collect(),
            fallbacks: self.fallbacks,
            actions,
            routes,
        }))
    }
}

impl<S, T, M, I, O> Default for TransitionTableBuilder<S, T, M, I, O>
where
    S: StateSlot<Next = S> + Clone + Eq + Hash + Debug + Sync + 'static,
    T: Clone + Eq + Hash + Debug + Send + Sync + 'static,
    M: Send + 'static,
    I: 'static,
    O: 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

/// A single branch is always fine. Two branches must be guarded by the same
/// guard with opposite polarity.
fn branches_exclusive<S, M: 'static>(branches: &[Branch<S, M>]) -> bool {
    match branches {
        [] | [_] => true,
        [first, second] => match (&first.guard, &second.guard) {
            (Some(a), Some(b)) => a.excludes(b),
            _ => false,
        },
        _ => false,
    }
}
