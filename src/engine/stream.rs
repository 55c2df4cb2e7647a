use super::executor::Executor;
use super::unary::machine_accessors;
use crate::core::{AsyncState, State, StateSlot};
use crate::error::{BoxError, Error, Termination};
use crate::subscriber::{Subscriber, Subscribers, SubscriptionId};
use futures_util::future::BoxFuture;
use futures_util::stream::{self, Stream, StreamExt};
use std::collections::VecDeque;
use std::convert::Infallible;
use std::fmt::{self, Debug};
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;
use uuid::Uuid;

/// Blocking engine turning a sequence of incomes into a lazy sequence of
/// outcomes.
///
/// Running consumes the machine: a consumed input sequence cannot be
/// replayed, so a fresh run needs a fresh machine.
pub struct StreamMachine<St, I, O> {
    executor: Executor<St, I>,
    _outcome: PhantomData<fn() -> O>,
}

impl<St, I, O> StreamMachine<St, I, O>
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

    /// Feed `incomes` through the machine.
    ///
    /// The returned iterator yields one item per produced outcome and stops
    /// when the input ends, the machine terminates, or handling fails. A
    /// failure is yielded once, after the outcomes produced before it.
    pub fn run<It>(self, incomes: It) -> Run<St, I, O, impl Iterator<Item = Result<I, Error>>>
    where
        It: IntoIterator<Item = I>,
    {
        Run::new(self.executor, incomes.into_iter().map(Ok))
    }

    /// Like [`run`](Self::run) for a fallible income source. The first source
    /// error is yielded as [`Error::Source`] and ends the run.
    pub fn try_run<It, E>(
        self,
        incomes: It,
    ) -> Run<St, I, O, impl Iterator<Item = Result<I, Error>>>
    where
        It: IntoIterator<Item = Result<I, E>>,
        E: Into<BoxError>,
    {
        Run::new(
            self.executor,
            incomes
                .into_iter()
                .map(|income| income.map_err(|error| Error::Source(error.into()))),
        )
    }

    machine_accessors!();
}

impl<St, I, O> Debug for StreamMachine<St, I, O>
where
    St: StateSlot,
    I: Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamMachine")
            .field("id", &self.executor.id())
            .field("state", &self.executor.state().name())
            .finish()
    }
}

/// Lazy outcome sequence produced by [`StreamMachine::run`].
pub struct Run<St, I, O, It> {
    executor: Executor<St, I>,
    incomes: It,
    pending: VecDeque<O>,
    failure: Option<Error>,
    finished: bool,
}

impl<St, I, O, It> Run<St, I, O, It>
where
    St: State<I, O>,
    I: Debug,
    It: Iterator<Item = Result<I, Error>>,
{
    fn new(executor: Executor<St, I>, incomes: It) -> Self {
        Self {
            executor,
            incomes,
            pending: VecDeque::new(),
            failure: None,
            finished: false,
        }
    }

    pub fn state(&self) -> &St {
        self.executor.state()
    }

    pub fn is_terminal(&self) -> bool {
        self.executor.is_terminal()
    }

    pub fn termination(&self) -> Option<&Termination> {
        self.executor.termination()
    }
}

impl<St, I, O, It> Iterator for Run<St, I, O, It>
where
    St: State<I, O>,
    I: Debug,
    It: Iterator<Item = Result<I, Error>>,
{
    type Item = Result<O, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(outcome) = self.pending.pop_front() {
                return Some(Ok(outcome));
            }
            if let Some(error) = self.failure.take() {
                return Some(Err(error));
            }
            if self.finished || self.executor.is_terminal() {
                self.finished = true;
                return None;
            }

            match self.incomes.next() {
                None => {
                    self.finished = true;
                    return None;
                }
                Some(Err(error)) => {
                    self.finished = true;
                    return Some(Err(error));
                }
                Some(Ok(income)) => {
                    let mut out = Vec::new();
                    let result = self.executor.dispatch(income, &mut out);
                    self.pending.extend(out);
                    if let Err(error) = result {
                        self.failure = Some(error);
                        self.finished = true;
                    }
                }
            }
        }
    }
}

/// Suspension-capable engine turning a stream of incomes into a stream of
/// outcomes.
pub struct AsyncStreamMachine<St, I, O> {
    executor: Executor<St, I>,
    _outcome: PhantomData<fn() -> O>,
}

impl<St, I, O> AsyncStreamMachine<St, I, O>
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

    /// Feed `incomes` through the machine, yielding outcomes as they are
    /// produced. Stops under the same conditions as [`StreamMachine::run`].
    ///
    /// The returned stream is `Send` and can be polled from a spawned task.
    pub fn run<S>(self, incomes: S) -> impl Stream<Item = Result<O, Error>>
    where
        S: Stream<Item = I> + Send,
    {
        self.try_run(incomes.map(Ok::<I, Infallible>))
    }

    pub fn try_run<S, E>(self, incomes: S) -> impl Stream<Item = Result<O, Error>>
    where
        S: Stream<Item = Result<I, E>> + Send,
        E: Into<BoxError>,
    {
        let cursor = Cursor {
            executor: self.executor,
            incomes: Box::pin(incomes),
            pending: VecDeque::new(),
            failure: None,
            finished: false,
            _error: PhantomData,
        };

        stream::unfold(cursor, |mut cursor| async move {
            let item = cursor.next().await?;
            Some((item, cursor))
        })
    }

    machine_accessors!();
}

impl<St, I, O> Debug for AsyncStreamMachine<St, I, O>
where
    St: StateSlot,
    I: Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncStreamMachine")
            .field("id", &self.executor.id())
            .field("state", &self.executor.state().name())
            .finish()
    }
}

struct Cursor<St, I, O, S, E> {
    executor: Executor<St, I>,
    incomes: Pin<Box<S>>,
    pending: VecDeque<O>,
    failure: Option<Error>,
    finished: bool,
    _error: PhantomData<fn() -> E>,
}

impl<St, I, O, S, E> Cursor<St, I, O, S, E>
where
    St: AsyncState<I, O>,
    I: Debug + Send,
    O: Send,
    S: Stream<Item = Result<I, E>> + Send,
    E: Into<BoxError>,
{
    fn next(&mut self) -> BoxFuture<'_, Option<Result<O, Error>>> {
        Box::pin(async move { self.advance().await })
    }

    async fn advance(&mut self) -> Option<Result<O, Error>> {
        loop {
            if let Some(outcome) = self.pending.pop_front() {
                return Some(Ok(outcome));
            }
            if let Some(error) = self.failure.take() {
                return Some(Err(error));
            }
            if self.finished || self.executor.is_terminal() {
                self.finished = true;
                return None;
            }

            let income = match self.incomes.next().await {
                None => {
                    self.finished = true;
                    return None;
                }
                Some(Err(error)) => {
                    self.finished = true;
                    return Some(Err(Error::Source(error.into())));
                }
                Some(Ok(income)) => income,
            };

            let mut out = Vec::new();
            let result = self.executor.dispatch_async(income, &mut out).await;
            self.pending.extend(out);
            if let Err(error) = result {
                self.failure = Some(error);
                self.finished = true;
            }
        }
    }
}
