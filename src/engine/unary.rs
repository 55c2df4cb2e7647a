use super::executor::Executor;
use crate::core::{AsyncState, State, StateSlot};
use crate::error::{Error, Termination};
use crate::subscriber::{Subscriber, Subscribers, SubscriptionId};
use futures_util::future::BoxFuture;
use std::fmt::{self, Debug};
use std::marker::PhantomData;
use std::sync::Arc;
use uuid::Uuid;

macro_rules! machine_accessors {
    () => {
        /// The active state.
        pub fn state(&self) -> &St {
            self.executor.state()
        }

        pub fn id(&self) -> Uuid {
            self.executor.id()
        }

        pub fn is_terminal(&self) -> bool {
            self.executor.is_terminal()
        }

        pub fn termination(&self) -> Option<&Termination> {
            self.executor.termination()
        }

        /// Number of deferred incomes waiting for a transition.
        pub fn pending(&self) -> usize {
            self.executor.pending()
        }

        pub fn subscribe<S>(&mut self, subscriber: S) -> SubscriptionId
        where
            S: Subscriber + 'static,
        {
            self.executor.subscribers_mut().subscribe(subscriber)
        }

        pub fn subscribe_shared(&mut self, subscriber: Arc<dyn Subscriber>) -> SubscriptionId {
            self.executor.subscribers_mut().subscribe_shared(subscriber)
        }

        pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
            self.executor.subscribers_mut().unsubscribe(id)
        }
    };
}

pub(crate) use machine_accessors;

/// Blocking engine handling one income per call.
///
/// Each call runs the whole cycle: handling, commit, and replay of deferred
/// incomes against the new state. Outcomes produced during replay belong to
/// the call that triggered it.
pub struct UnaryMachine<St, I, O> {
    executor: Executor<St, I>,
    _outcome: PhantomData<fn() -> O>,
}

impl<St, I, O> UnaryMachine<St, I, O>
where
    St: State<I, O>,
    I: Debug,
{
    pub fn new(initial: St) -> Self {
        Self::with_subscribers(initial, Subscribers::new(), Uuid::new_v4())
    }

    pub(crate) fn with_subscribers(initial: St, subscribers: Subscribers, id: Uuid) -> Self {
        Self {
            executor: Executor::new(initial, subscribers, id),
            _outcome: PhantomData,
        }
    }

    /// Handle one income and return the last outcome of the cycle.
    ///
    /// `None` means the income was deferred (or the state aborted without an
    /// outcome) and nothing was replayed.
    pub fn handle(&mut self, income: I) -> Result<Option<O>, Error> {
        let mut out = Vec::new();
        self.executor.dispatch(income, &mut out)?;
        Ok(out.pop())
    }

    /// Handle one income and return every outcome of the cycle, in
    /// production order.
    pub fn handle_all(&mut self, income: I) -> Result<Vec<O>, Error> {
        let mut out = Vec::new();
        self.executor.dispatch(income, &mut out)?;
        Ok(out)
    }

    machine_accessors!();
}

impl<St, I, O> Debug for UnaryMachine<St, I, O>
where
    St: StateSlot,
    I: Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnaryMachine")
            .field("id", &self.executor.id())
            .field("state", &self.executor.state().name())
            .field("termination", &self.executor.termination())
            .finish()
    }
}

/// Suspension-capable engine handling one income per call.
pub struct AsyncUnaryMachine<St, I, O> {
    executor: Executor<St, I>,
    _outcome: PhantomData<fn() -> O>,
}

impl<St, I, O> AsyncUnaryMachine<St, I, O>
where
    St: AsyncState<I, O>,
    I: Debug + Send,
    O: Send,
{
    pub fn new(initial: St) -> Self {
        Self::with_subscribers(initial, Subscribers::new(), Uuid::new_v4())
    }

    pub(crate) fn with_subscribers(initial: St, subscribers: Subscribers, id: Uuid) -> Self {
        Self {
            executor: Executor::new(initial, subscribers, id),
            _outcome: PhantomData,
        }
    }

    /// Handle one income and return the last outcome of the cycle.
    ///
    /// The returned future is `Send`, so the machine can be moved onto any
    /// executor task. Dropping it before it completes leaves the machine
    /// either untouched or with its last transition committed.
    pub fn handle(&mut self, income: I) -> BoxFuture<'_, Result<Option<O>, Error>> {
        Box::pin(async move {
            let mut out = Vec::new();
            self.executor.dispatch_async(income, &mut out).await?;
            Ok(out.pop())
        })
    }

    pub fn handle_all(&mut self, income: I) -> BoxFuture<'_, Result<Vec<O>, Error>> {
        Box::pin(async move {
            let mut out = Vec::new();
            self.executor.dispatch_async(income, &mut out).await?;
            Ok(out)
        })
    }

    machine_accessors!();
}

impl<St, I, O> Debug for AsyncUnaryMachine<St, I, O>
where
    St: StateSlot,
    I: Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncUnaryMachine")
            .field("id", &self.executor.id())
            .field("state", &self.executor.state().name())
            .field("termination", &self.executor.termination())
            .finish()
    }
}
