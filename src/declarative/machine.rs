//! Running transition tables.

use super::rule::Branch;
use super::table::{Action, Route, TransitionTable};
use crate::core::{AsyncState, State, StateSlot, Step};
use crate::engine::{AsyncUnaryMachine, UnaryMachine};
use crate::error::{Error, StateError, Termination};
use crate::subscriber::{Subscriber, Subscribers, SubscriptionId};
use futures_util::future::BoxFuture;
use std::fmt::{self, Debug};
use std::hash::Hash;
use std::sync::Arc;
use uuid::Uuid;

/// A trigger fired with its income.
#[derive(Clone, PartialEq, Eq)]
pub struct Call<T, I> {
    pub trigger: T,
    pub income: I,
}

impl<T, I> Call<T, I> {
    pub fn new(trigger: T, income: I) -> Self {
        Self { trigger, income }
    }
}

impl<T: Debug, I: Debug> Debug for Call<T, I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({:?})", self.trigger, self.income)
    }
}

/// A model driven by a [`TransitionTable`].
///
/// The table is shared; the phase and the model belong to this instance.
/// `Declared` handles [`Call`]s and implements both [`State`] and
/// [`AsyncState`], so it runs directly on every engine. Suspending actions
/// only run on the suspension-capable ones.
pub struct Declared<S, T, M, I, O> {
    table: Arc<TransitionTable<S, T, M, I, O>>,
    phase: S,
    model: M,
}

impl<S, T, M, I, O> Declared<S, T, M, I, O> {
    pub(crate) fn new(table: Arc<TransitionTable<S, T, M, I, O>>, phase: S, model: M) -> Self {
        Self {
            table,
            phase,
            model,
        }
    }

    pub fn phase(&self) -> &S {
        &self.phase
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn table(&self) -> &Arc<TransitionTable<S, T, M, I, O>> {
        &self.table
    }

    pub fn into_model(self) -> M {
        self.model
    }
}

impl<S, T, M, I, O> StateSlot for Declared<S, T, M, I, O>
where
    S: StateSlot<Next = S> + Clone + Eq + Hash + Debug + Sync + 'static,
    T: Clone + Eq + Hash + Debug + Send + Sync + 'static,
    M: Send + 'static,
    I: 'static,
    O: 'static,
{
    type Next = S;

    fn name(&self) -> &str {
        self.phase.name()
    }

    fn enter(&mut self, next: S) {
        self.phase = next;
    }

    fn recover(&mut self, error: &StateError) -> Option<S> {
        self.table.fallback_for(error)
    }
}

impl<S, T, M, I, O> Declared<S, T, M, I, O>
where
    S: StateSlot<Next = S> + Clone + Eq + Hash + Debug + Sync + 'static,
    T: Clone + Eq + Hash + Debug + Send + Sync + 'static,
    M: Send + 'static,
    I: 'static,
    O: 'static,
{
    fn plan<'t>(
        &self,
        table: &'t TransitionTable<S, T, M, I, O>,
        trigger: &T,
    ) -> Result<Plan<'t, S, M, I, O>, StateError> {
        let branches = match table.route(&self.phase, trigger) {
            None => {
                return Err(StateError::invalid(format!("trigger {trigger:?} is not allowed")));
            }
            Some(Route::Idempotent(returns)) => return Ok(Plan::Answer(returns(&self.model))),
            Some(Route::Guarded(branches)) => branches,
        };

        let action = table
            .action(trigger)
            .ok_or_else(|| StateError::invalid(format!("no action bound to {trigger:?}")))?;
        Ok(Plan::Run { branches, action })
    }

    /// First branch whose guard passes picks the target. When every guard
    /// rejects, the machine stays and the action's outcome still stands.
    fn choose(
        &self,
        table: &TransitionTable<S, T, M, I, O>,
        branches: &[Branch<S, M>],
        outcome: O,
    ) -> Step<S, Call<T, I>, O> {
        let chosen = branches.iter().find(|branch| {
            branch
                .guard
                .as_ref()
                .map_or(true, |guard| guard.check(&self.model))
        });

        match chosen.and_then(|branch| branch.target.clone()) {
            Some(target) if table.is_final(&target) => Step::finish(target, outcome),
            Some(target) => Step::to(target, outcome),
            None => Step::stay(outcome),
        }
    }
}

enum Plan<'t, S, M, I, O> {
    Answer(O),
    Run {
        branches: &'t [Branch<S, M>],
        action: &'t Action<M, I, O>,
    },
}

impl<S, T, M, I, O> State<Call<T, I>, O> for Declared<S, T, M, I, O>
where
    S: StateSlot<Next = S> + Clone + Eq + Hash + Debug + Sync + 'static,
    T: Clone + Eq + Hash + Debug + Send + Sync + 'static,
    M: Send + 'static,
    I: 'static,
    O: 'static,
{
    fn handle(&mut self, call: Call<T, I>) -> Result<Step<S, Call<T, I>, O>, StateError> {
        let Call { trigger, income } = call;
        let table = Arc::clone(&self.table);

        let (branches, action) = match self.plan(&table, &trigger)? {
            Plan::Answer(outcome) => return Ok(Step::stay(outcome)),
            Plan::Run { branches, action } => (branches, action),
        };
        let outcome = match action {
            Action::Immediate(action) => action(&mut self.model, income)?,
            Action::Suspending(_) => {
                return Err(StateError::invalid(format!(
                    "action for {trigger:?} suspends and needs a suspension-capable engine"
                )));
            }
        };

        Ok(self.choose(&table, branches, outcome))
    }
}

impl<S, T, M, I, O> AsyncState<Call<T, I>, O> for Declared<S, T, M, I, O>
where
    S: StateSlot<Next = S> + Clone + Eq + Hash + Debug + Sync + 'static,
    T: Clone + Eq + Hash + Debug + Send + Sync + 'static,
    M: Send + 'static,
    I: Send + 'static,
    O: Send + 'static,
{
    fn handle(
        &mut self,
        call: Call<T, I>,
    ) -> BoxFuture<'_, Result<Step<S, Call<T, I>, O>, StateError>> {
        Box::pin(async move {
            let Call { trigger, income } = call;
            let table = Arc::clone(&self.table);

            let (branches, action) = match self.plan(&table, &trigger)? {
                Plan::Answer(outcome) => return Ok(Step::stay(outcome)),
                Plan::Run { branches, action } => (branches, action),
            };
            let outcome = match action {
                Action::Immediate(action) => action(&mut self.model, income)?,
                Action::Suspending(action) => action(&mut self.model, income).await?,
            };

            Ok(self.choose(&table, branches, outcome))
        })
    }
}

macro_rules! declarative_accessors {
    () => {
        pub fn phase(&self) -> &S {
            self.inner.state().phase()
        }

        pub fn model(&self) -> &M {
            self.inner.state().model()
        }

        pub fn id(&self) -> Uuid {
            self.inner.id()
        }

        pub fn is_terminal(&self) -> bool {
            self.inner.is_terminal()
        }

        pub fn termination(&self) -> Option<&Termination> {
            self.inner.termination()
        }

        pub fn subscribe<Sub>(&mut self, subscriber: Sub) -> SubscriptionId
        where
            Sub: Subscriber + 'static,
        {
            self.inner.subscribe(subscriber)
        }

        pub fn subscribe_shared(&mut self, subscriber: Arc<dyn Subscriber>) -> SubscriptionId {
            self.inner.subscribe_shared(subscriber)
        }

        pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
            self.inner.unsubscribe(id)
        }
    };
}

fn no_outcome(state: &str) -> Error {
    Error::InvalidState {
        state: state.to_string(),
        message: "no outcome produced".to_string(),
    }
}

/// Blocking machine over a transition table.
///
/// Built with [`TransitionTable::machine`] or the [`sdk`](crate::sdk)
/// builder. Each [`fire`](Self::fire) is one full dispatch cycle.
pub struct DeclarativeMachine<S, T, M, I, O> {
    inner: UnaryMachine<Declared<S, T, M, I, O>, Call<T, I>, O>,
}

impl<S, T, M, I, O> DeclarativeMachine<S, T, M, I, O>
where
    S: StateSlot<Next = S> + Clone + Eq + Hash + Debug + Sync + 'static,
    T: Clone + Eq + Hash + Debug + Send + Sync + 'static,
    M: Send + 'static,
    I: Debug + 'static,
    O: 'static,
{
    pub fn new(declared: Declared<S, T, M, I, O>) -> Self {
        Self {
            inner: UnaryMachine::new(declared),
        }
    }

    pub(crate) fn with_subscribers(
        declared: Declared<S, T, M, I, O>,
        subscribers: Subscribers,
        id: Uuid,
    ) -> Self {
        Self {
            inner: UnaryMachine::with_subscribers(declared, subscribers, id),
        }
    }

    /// Fire `trigger` with `income` and return the action's outcome.
    pub fn fire(&mut self, trigger: T, income: I) -> Result<O, Error> {
        match self.inner.handle(Call::new(trigger, income))? {
            Some(outcome) => Ok(outcome),
            None => Err(no_outcome(self.inner.state().name())),
        }
    }

    declarative_accessors!();
}

impl<S, T, M, I, O> Debug for DeclarativeMachine<S, T, M, I, O>
where
    S: StateSlot<Next = S> + Clone + Eq + Hash + Debug + Sync + 'static,
    T: Clone + Eq + Hash + Debug + Send + Sync + 'static,
    M: Debug + Send + 'static,
    I: Debug + 'static,
    O: 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeclarativeMachine")
            .field("id", &self.id())
            .field("phase", self.phase())
            .field("model", self.model())
            .field("termination", &self.termination())
            .finish()
    }
}

/// Suspension-capable machine over a transition table.
///
/// Runs tables whose actions await, as well as plain ones. Built with
/// [`TransitionTable::async_machine`] or the [`sdk`](crate::sdk) builder.
pub struct AsyncDeclarativeMachine<S, T, M, I, O> {
    inner: AsyncUnaryMachine<Declared<S, T, M, I, O>, Call<T, I>, O>,
}

impl<S, T, M, I, O> AsyncDeclarativeMachine<S, T, M, I, O>
where
    S: StateSlot<Next = S> + Clone + Eq + Hash + Debug + Sync + 'static,
    T: Clone + Eq + Hash + Debug + Send + Sync + 'static,
    M: Send + 'static,
    I: Debug + Send + 'static,
    O: Send + 'static,
{
    pub fn new(declared: Declared<S, T, M, I, O>) -> Self {
        Self {
            inner: AsyncUnaryMachine::new(declared),
        }
    }

    pub(crate) fn with_subscribers(
        declared: Declared<S, T, M, I, O>,
        subscribers: Subscribers,
        id: Uuid,
    ) -> Self {
        Self {
            inner: AsyncUnaryMachine::with_subscribers(declared, subscribers, id),
        }
    }

    /// Fire `trigger` with `income` and return the action's outcome.
    pub fn fire(&mut self, trigger: T, income: I) -> BoxFuture<'_, Result<O, Error>> {
        Box::pin(async move {
            match self.inner.handle(Call::new(trigger, income)).await? {
                Some(outcome) => Ok(outcome),
                None => Err(no_outcome(self.inner.state().name())),
            }
        })
    }

    declarative_accessors!();
}

impl<S, T, M, I, O> Debug for AsyncDeclarativeMachine<S, T, M, I, O>
where
    S: StateSlot<Next = S> + Clone + Eq + Hash + Debug + Sync + 'static,
    T: Clone + Eq + Hash + Debug + Send + Sync + 'static,
    M: Debug + Send + 'static,
    I: Debug + Send + 'static,
    O: Send + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncDeclarativeMachine")
            .field("id", &self.id())
            .field("phase", self.phase())
            .field("model", self.model())
            .field("termination", &self.termination())
            .finish()
    }
}
