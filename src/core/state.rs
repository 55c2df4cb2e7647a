//! State traits for blocking and suspension-capable machines.
//!
//! Every engine owns exactly one value implementing [`StateSlot`]. The slot
//! knows its diagnostic name and how to install whatever a transition hands
//! it. [`State`] and [`AsyncState`] add the `handle` capability on top.
//!
//! Two ways of writing states are supported:
//!
//! - a closed set, as an enum with `type Next = Self` (see
//!   [`state_enum!`](crate::state_enum)), matched exhaustively in `handle`;
//! - an open set, as independent types implementing [`DynState`] (or
//!   [`DynAsyncState`]) and driven through [`BoxState`] / [`BoxAsyncState`].

use crate::core::step::Step;
use crate::error::StateError;
use futures_util::future::{ready, BoxFuture};

/// The value occupying a machine's single state slot.
pub trait StateSlot: Send {
    /// What a transition installs into the slot.
    type Next: Send;

    /// Name used in errors, events and logs.
    fn name(&self) -> &str;

    /// Install the next state. Called exactly once per committed transition.
    fn enter(&mut self, next: Self::Next);

    /// Pick a fallback state after a handler failure.
    ///
    /// Only [`StateError::Failed`] errors are offered here. The returned state
    /// is committed, and deferred incomes are replayed against it, before the
    /// error is reported to the caller.
    ///
    /// Default implementation never recovers.
    fn recover(&mut self, error: &StateError) -> Option<Self::Next> {
        let _ = error;
        None
    }
}

/// A state driven by the blocking engines.
///
/// # Example
///
/// ```rust
/// use statekit::core::{State, Step};
/// use statekit::{sdk, state_enum, StateError};
///
/// state_enum! {
///     enum Door {
///         Closed,
///         Opened,
///     }
/// }
///
/// impl State<&'static str, &'static str> for Door {
///     fn handle(&mut self, income: &'static str) -> Result<Step<Door, &'static str, &'static str>, StateError> {
///         match (*self, income) {
///             (Door::Closed, "open") => Ok(Step::to(Door::Opened, "Opened")),
///             (Door::Opened, "close") => Ok(Step::to(Door::Closed, "Closed")),
///             _ => Err(StateError::invalid(format!("can't {income}"))),
///         }
///     }
/// }
///
/// let mut machine = sdk::unary(Door::Closed);
/// assert_eq!(machine.handle("open").unwrap(), Some("Opened"));
/// assert!(machine.handle("open").unwrap_err().is_invalid_state());
/// ```
pub trait State<I, O>: StateSlot {
    fn handle(&mut self, income: I) -> Result<Step<Self::Next, I, O>, StateError>;
}

/// A state driven by the suspension-capable engines.
///
/// `handle` returns a future so that it may wait on external input without
/// blocking other machine instances.
pub trait AsyncState<I, O>: StateSlot {
    fn handle(&mut self, income: I) -> BoxFuture<'_, Result<Step<Self::Next, I, O>, StateError>>;
}

/// Object-safe blocking state, for open state sets.
pub trait DynState<I, O>: Send {
    /// Defaults to the implementing type's name.
    fn name(&self) -> &str {
        short_type_name(std::any::type_name::<Self>())
    }

    fn handle(&mut self, income: I) -> Result<Step<BoxState<I, O>, I, O>, StateError>;

    fn recover(&mut self, error: &StateError) -> Option<BoxState<I, O>> {
        let _ = error;
        None
    }

    fn boxed(self) -> BoxState<I, O>
    where
        Self: Sized + 'static,
    {
        Box::new(self)
    }
}

/// Object-safe suspension-capable state, for open state sets.
pub trait DynAsyncState<I, O>: Send {
    fn name(&self) -> &str {
        short_type_name(std::any::type_name::<Self>())
    }

    fn handle(
        &mut self,
        income: I,
    ) -> BoxFuture<'_, Result<Step<BoxAsyncState<I, O>, I, O>, StateError>>;

    fn recover(&mut self, error: &StateError) -> Option<BoxAsyncState<I, O>> {
        let _ = error;
        None
    }

    fn boxed(self) -> BoxAsyncState<I, O>
    where
        Self: Sized + 'static,
    {
        Box::new(self)
    }
}

pub type BoxState<I, O> = Box<dyn DynState<I, O>>;
pub type BoxAsyncState<I, O> = Box<dyn DynAsyncState<I, O>>;

impl<'a, I, O> StateSlot for Box<dyn DynState<I, O> + 'a> {
    type Next = BoxState<I, O>;

    fn name(&self) -> &str {
        (**self).name()
    }

    fn enter(&mut self, next: Self::Next) {
        *self = next;
    }

    fn recover(&mut self, error: &StateError) -> Option<Self::Next> {
        (**self).recover(error)
    }
}

impl<'a, I, O> State<I, O> for Box<dyn DynState<I, O> + 'a> {
    fn handle(&mut self, income: I) -> Result<Step<Self::Next, I, O>, StateError> {
        (**self).handle(income)
    }
}

impl<'a, I, O> StateSlot for Box<dyn DynAsyncState<I, O> + 'a> {
    type Next = BoxAsyncState<I, O>;

    fn name(&self) -> &str {
        (**self).name()
    }

    fn enter(&mut self, next: Self::Next) {
        *self = next;
    }

    fn recover(&mut self, error: &StateError) -> Option<Self::Next> {
        (**self).recover(error)
    }
}

impl<'a, I, O> AsyncState<I, O> for Box<dyn DynAsyncState<I, O> + 'a> {
    fn handle(&mut self, income: I) -> BoxFuture<'_, Result<Step<Self::Next, I, O>, StateError>> {
        (**self).handle(income)
    }
}

/// Runs a blocking state on the suspension-capable engines.
///
/// The wrapped `handle` completes without suspending. Incomes and outcomes
/// must be `'static` since they travel inside a boxed future.
#[derive(Debug, Clone, PartialEq)]
pub struct Blocking<St>(pub St);

impl<St> Blocking<St> {
    pub fn get_ref(&self) -> &St {
        &self.0
    }

    pub fn into_inner(self) -> St {
        self.0
    }
}

impl<St: StateSlot> StateSlot for Blocking<St> {
    type Next = St::Next;

    fn name(&self) -> &str {
        self.0.name()
    }

    fn enter(&mut self, next: Self::Next) {
        self.0.enter(next);
    }

    fn recover(&mut self, error: &StateError) -> Option<Self::Next> {
        self.0.recover(error)
    }
}

impl<St, I, O> AsyncState<I, O> for Blocking<St>
where
    St: State<I, O>,
    I: Send + 'static,
    O: Send + 'static,
{
    fn handle(&mut self, income: I) -> BoxFuture<'_, Result<Step<Self::Next, I, O>, StateError>> {
        let result = State::handle(&mut self.0, income);
        Box::pin(ready(result))
    }
}

fn short_type_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}
