//! Factory layer: one entry point per execution mode.
//!
//! The free functions build a machine with default settings. [`Builder`]
//! adds subscribers, logging and an explicit machine id before picking the
//! engine.
//!
//! # Example
//!
//! ```rust
//! use statekit::core::{State, Step};
//! use statekit::{sdk, state_enum, StateError};
//!
//! state_enum! {
//!     enum Echo {
//!         Listening,
//!     }
//! }
//!
//! impl State<u32, u32> for Echo {
//!     fn handle(&mut self, income: u32) -> Result<Step<Echo, u32, u32>, StateError> {
//!         Ok(Step::stay(income * 2))
//!     }
//! }
//!
//! let outcomes: Vec<u32> = sdk::Builder::new(Echo::Listening)
//!     .logging()
//!     .streaming()
//!     .run(vec![1, 2, 3])
//!     .collect::<Result<_, _>>()
//!     .unwrap();
//!
//! assert_eq!(outcomes, vec![2, 4, 6]);
//! ```

use crate::core::{AsyncState, State, StateSlot};
use crate::declarative::{AsyncDeclarativeMachine, DeclarativeMachine, Declared};
use crate::engine::{AsyncStreamMachine, AsyncUnaryMachine, StreamMachine, UnaryMachine};
use crate::subscriber::{LoggingSubscriber, Subscriber, Subscribers};
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;
use uuid::Uuid;

/// Blocking machine handling one income per call.
pub fn unary<St, I, O>(initial: St) -> UnaryMachine<St, I, O>
where
    St: State<I, O>,
    I: Debug,
{
    Builder::new(initial).unary()
}

/// Blocking machine over a sequence of incomes.
pub fn streaming<St, I, O>(initial: St) -> StreamMachine<St, I, O>
where
    St: State<I, O>,
    I: Debug,
{
    Builder::new(initial).streaming()
}

/// Suspension-capable machine handling one income per call.
pub fn async_unary<St, I, O>(initial: St) -> AsyncUnaryMachine<St, I, O>
where
    St: AsyncState<I, O>,
    I: Debug + Send,
    O: Send,
{
    Builder::new(initial).async_unary()
}

/// Suspension-capable machine over a stream of incomes.
pub fn async_streaming<St, I, O>(initial: St) -> AsyncStreamMachine<St, I, O>
where
    St: AsyncState<I, O>,
    I: Debug + Send,
    O: Send,
{
    Builder::new(initial).async_streaming()
}

/// Machine configuration shared by every engine.
pub struct Builder<St> {
    initial: St,
    subscribers: Subscribers,
    id: Option<Uuid>,
}

impl<St: StateSlot> Builder<St> {
    pub fn new(initial: St) -> Self {
        Self {
            initial,
            subscribers: Subscribers::new(),
            id: None,
        }
    }

    pub fn subscriber<S>(mut self, subscriber: S) -> Self
    where
        S: Subscriber + 'static,
    {
        self.subscribers.subscribe(subscriber);
        self
    }

    pub fn shared_subscriber(mut self, subscriber: Arc<dyn Subscriber>) -> Self {
        self.subscribers.subscribe_shared(subscriber);
        self
    }

    /// Report every machine event through `tracing`.
    pub fn logging(self) -> Self {
        self.subscriber(LoggingSubscriber::new())
    }

    /// Use a fixed machine id instead of a random one.
    pub fn id(mut self, id: Uuid) -> Self {
        self.id = Some(id);
        self
    }

    fn parts(self) -> (St, Subscribers, Uuid) {
        let id = self.id.unwrap_or_else(Uuid::new_v4);
        (self.initial, self.subscribers, id)
    }

    pub fn unary<I, O>(self) -> UnaryMachine<St, I, O>
    where
        St: State<I, O>,
        I: Debug,
    {
        let (initial, subscribers, id) = self.parts();
        UnaryMachine::with_subscribers(initial, subscribers, id)
    }

    pub fn streaming<I, O>(self) -> StreamMachine<St, I, O>
    where
        St: State<I, O>,
        I: Debug,
    {
        let (initial, subscribers, id) = self.parts();
        StreamMachine::with_subscribers(initial, subscribers, id)
    }

    pub fn async_unary<I, O>(self) -> AsyncUnaryMachine<St, I, O>
    where
        St: AsyncState<I, O>,
        I: Debug + Send,
        O: Send,
    {
        let (initial, subscribers, id) = self.parts();
        AsyncUnaryMachine::with_subscribers(initial, subscribers, id)
    }

    pub fn async_streaming<I, O>(self) -> AsyncStreamMachine<St, I, O>
    where
        St: AsyncState<I, O>,
        I: Debug + Send,
        O: Send,
    {
        let (initial, subscribers, id) = self.parts();
        AsyncStreamMachine::with_subscribers(initial, subscribers, id)
    }
}

impl<S, T, M, I, O> Builder<Declared<S, T, M, I, O>>
where
    S: StateSlot<Next = S> + Clone + Eq + Hash + Debug + Sync + 'static,
    T: Clone + Eq + Hash + Debug + Send + Sync + 'static,
    M: Send + 'static,
    I: Debug + 'static,
    O: 'static,
{
    /// Blocking machine firing triggers against the declared table.
    pub fn declarative(self) -> DeclarativeMachine<S, T, M, I, O> {
        let (initial, subscribers, id) = self.parts();
        DeclarativeMachine::with_subscribers(initial, subscribers, id)
    }

    /// Suspension-capable machine firing triggers against the declared
    /// table. Required for tables with suspending actions.
    pub fn async_declarative(self) -> AsyncDeclarativeMachine<S, T, M, I, O>
    where
        I: Send,
        O: Send,
    {
        let (initial, subscribers, id) = self.parts();
        AsyncDeclarativeMachine::with_subscribers(initial, subscribers, id)
    }
}
