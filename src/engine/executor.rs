//! Dispatch core shared by every engine.
//!
//! The executor owns the active state, the deferred-income queue and the
//! subscriber registry. One `dispatch` call runs a full cycle: handle the
//! income, commit whatever the state asked for, then replay deferred incomes
//! against the newest state until a pass makes no transition.
//!
//! A fallback committed by [`StateSlot::recover`] counts as a state change
//! too: the queue is replayed against the fallback before the handler error
//! is returned.

use crate::core::{AsyncState, State, StateSlot, Step};
use crate::error::{Error, StateError, Termination};
use crate::subscriber::{Event, EventKind, Subscribers};
use std::collections::VecDeque;
use std::fmt::Debug;
use uuid::Uuid;

/// Trigger recorded for transitions committed by a recovery hook.
const FALLBACK_TRIGGER: &str = "fallback";

/// How an income reached the state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Delivery {
    Fresh,
    Recalled,
}

/// Result of one handling, after the step was applied.
enum Settled<I> {
    Stayed,
    Deferred(I),
    Moved { forwarded: Option<I> },
}

pub(crate) struct Executor<St, I> {
    state: St,
    deferred: VecDeque<I>,
    termination: Option<Termination>,
    subscribers: Subscribers,
    id: Uuid,
    started: bool,
    recovered: bool,
}

impl<St, I> Executor<St, I>
where
    St: StateSlot,
    I: Debug,
{
    pub(crate) fn new(state: St, subscribers: Subscribers, id: Uuid) -> Self {
        Self {
            state,
            deferred: VecDeque::new(),
            termination: None,
            subscribers,
            id,
            started: false,
            recovered: false,
        }
    }

    pub(crate) fn state(&self) -> &St {
        &self.state
    }

    pub(crate) fn id(&self) -> Uuid {
        self.id
    }

    pub(crate) fn termination(&self) -> Option<&Termination> {
        self.termination.as_ref()
    }

    pub(crate) fn is_terminal(&self) -> bool {
        self.termination.is_some()
    }

    pub(crate) fn pending(&self) -> usize {
        self.deferred.len()
    }

    pub(crate) fn subscribers_mut(&mut self) -> &mut Subscribers {
        &mut self.subscribers
    }

    /// Run one full handle/commit/drain cycle, pushing outcomes into `out`.
    pub(crate) fn dispatch<O>(&mut self, income: I, out: &mut Vec<O>) -> Result<(), Error>
    where
        St: State<I, O>,
    {
        self.ensure_open()?;
        self.recovered = false;
        match self.cycle(income, out) {
            Err(error) => {
                while std::mem::take(&mut self.recovered) {
                    if let Err(replay) = self.drain(out) {
                        self.replay_lost(&replay);
                    }
                }
                Err(error)
            }
            done => done,
        }
    }

    fn cycle<O>(&mut self, income: I, out: &mut Vec<O>) -> Result<(), Error>
    where
        St: State<I, O>,
    {
        match self.step(income, Delivery::Fresh, out)? {
            Settled::Stayed => Ok(()),
            Settled::Deferred(income) => {
                self.deferred.push_back(income);
                Ok(())
            }
            Settled::Moved { forwarded } => {
                if let Some(income) = forwarded {
                    self.deferred.push_front(income);
                }
                self.drain(out)
            }
        }
    }

    /// Suspension-capable counterpart of [`dispatch`](Self::dispatch).
    pub(crate) async fn dispatch_async<O>(
        &mut self,
        income: I,
        out: &mut Vec<O>,
    ) -> Result<(), Error>
    where
        St: AsyncState<I, O>,
        I: Send,
        O: Send,
    {
        self.ensure_open()?;
        self.recovered = false;
        match self.cycle_async(income, out).await {
            Err(error) => {
                while std::mem::take(&mut self.recovered) {
                    if let Err(replay) = self.drain_async(out).await {
                        self.replay_lost(&replay);
                    }
                }
                Err(error)
            }
            done => done,
        }
    }

    async fn cycle_async<O>(&mut self, income: I, out: &mut Vec<O>) -> Result<(), Error>
    where
        St: AsyncState<I, O>,
        I: Send,
        O: Send,
    {
        match self.step_async(income, Delivery::Fresh, out).await? {
            Settled::Stayed => Ok(()),
            Settled::Deferred(income) => {
                self.deferred.push_back(income);
                Ok(())
            }
            Settled::Moved { forwarded } => {
                if let Some(income) = forwarded {
                    self.deferred.push_front(income);
                }
                self.drain_async(out).await
            }
        }
    }

    /// A replay after a fallback failed while another error is already on
    /// its way to the caller. The `Failed` event has been emitted by then.
    fn replay_lost(&self, error: &Error) {
        tracing::warn!(
            machine = %self.id,
            state = self.state.name(),
            %error,
            "replay after fallback failed"
        );
    }

    fn ensure_open(&self) -> Result<(), Error> {
        match &self.termination {
            Some(reason) => Err(Error::ClosedMachine {
                state: self.state.name().to_string(),
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }

    fn drain<O>(&mut self, out: &mut Vec<O>) -> Result<(), Error>
    where
        St: State<I, O>,
    {
        loop {
            let mut kept = 0;
            let mut moved = false;

            while kept < self.deferred.len() && !self.is_terminal() {
                let Some(income) = self.deferred.remove(kept) else {
                    break;
                };
                match self.step(income, Delivery::Recalled, out)? {
                    Settled::Stayed => {}
                    Settled::Deferred(income) => {
                        self.deferred.insert(kept, income);
                        kept += 1;
                    }
                    Settled::Moved { forwarded } => {
                        if let Some(income) = forwarded {
                            self.deferred.insert(kept, income);
                        }
                        moved = true;
                        break;
                    }
                }
            }

            if !moved || self.is_terminal() {
                return Ok(());
            }
        }
    }

    async fn drain_async<O>(&mut self, out: &mut Vec<O>) -> Result<(), Error>
    where
        St: AsyncState<I, O>,
        I: Send,
        O: Send,
    {
        loop {
            let mut kept = 0;
            let mut moved = false;

            while kept < self.deferred.len() && !self.is_terminal() {
                let Some(income) = self.deferred.remove(kept) else {
                    break;
                };
                match self.step_async(income, Delivery::Recalled, out).await? {
                    Settled::Stayed => {}
                    Settled::Deferred(income) => {
                        self.deferred.insert(kept, income);
                        kept += 1;
                    }
                    Settled::Moved { forwarded } => {
                        if let Some(income) = forwarded {
                            self.deferred.insert(kept, income);
                        }
                        moved = true;
                        break;
                    }
                }
            }

            if !moved || self.is_terminal() {
                return Ok(());
            }
        }
    }

    fn step<O>(
        &mut self,
        income: I,
        delivery: Delivery,
        out: &mut Vec<O>,
    ) -> Result<Settled<I>, Error>
    where
        St: State<I, O>,
    {
        let trigger = self.announce(&income, delivery);
        let result = self.state.handle(income);
        self.settle(result, trigger, out)
    }

    async fn step_async<O>(
        &mut self,
        income: I,
        delivery: Delivery,
        out: &mut Vec<O>,
    ) -> Result<Settled<I>, Error>
    where
        St: AsyncState<I, O>,
        I: Send,
        O: Send,
    {
        let trigger = self.announce(&income, delivery);
        let result = {
            let guard = (delivery == Delivery::Recalled)
                .then(|| InFlight::new(&self.subscribers, self.id, self.state.name()));
            let result = self.state.handle(income).await;
            if let Some(guard) = guard {
                guard.disarm();
            }
            result
        };
        self.settle(result, trigger, out)
    }

    /// Emit the delivery events and capture the trigger for a possible
    /// transition record.
    fn announce(&mut self, income: &I, delivery: Delivery) -> Option<String> {
        if !self.started {
            self.started = true;
            self.emit(EventKind::Started);
        }
        if delivery == Delivery::Recalled {
            tracing::trace!(machine = %self.id, state = self.state.name(), ?income, "replaying deferred income");
            self.emit(EventKind::Recalled);
        }
        self.emit(EventKind::Entered);

        (!self.subscribers.is_empty()).then(|| format!("{income:?}"))
    }

    fn settle<O>(
        &mut self,
        result: Result<Step<St::Next, I, O>, StateError>,
        trigger: Option<String>,
        out: &mut Vec<O>,
    ) -> Result<Settled<I>, Error> {
        let step = match result {
            Ok(step) => step,
            Err(error) => return Err(self.fail(error)),
        };

        match step {
            Step::Continue(outcome) => {
                self.produce(outcome, out);
                Ok(Settled::Stayed)
            }
            Step::Transition { next, outcome } => {
                self.produce(outcome, out);
                self.commit(next, trigger);
                Ok(Settled::Moved { forwarded: None })
            }
            Step::Finish { next, outcome } => {
                self.produce(outcome, out);
                self.commit(next, trigger);
                let reached = self.state.name().to_string();
                self.terminate(Termination::Finished(reached));
                Ok(Settled::Moved { forwarded: None })
            }
            Step::Defer(income) => {
                tracing::debug!(machine = %self.id, state = self.state.name(), "income deferred");
                self.emit(EventKind::Deferred);
                Ok(Settled::Deferred(income))
            }
            Step::Forward {
                next,
                income,
                outcome,
            } => {
                if let Some(outcome) = outcome {
                    self.produce(outcome, out);
                }
                self.commit(next, trigger);
                Ok(Settled::Moved {
                    forwarded: Some(income),
                })
            }
            Step::Abort { reason, outcome } => {
                if let Some(outcome) = outcome {
                    self.produce(outcome, out);
                }
                self.terminate(Termination::Aborted(reason));
                Ok(Settled::Stayed)
            }
        }
    }

    fn fail(&mut self, error: StateError) -> Error {
        let state = self.state.name().to_string();
        self.emit(EventKind::Failed {
            error: error.to_string(),
        });

        if error.is_failure() {
            if let Some(fallback) = self.state.recover(&error) {
                self.commit(fallback, Some(FALLBACK_TRIGGER.to_string()));
                self.recovered = true;
            }
        }

        Error::from_state(&state, error)
    }

    fn produce<O>(&self, outcome: O, out: &mut Vec<O>) {
        self.emit(EventKind::Outcome);
        out.push(outcome);
    }

    fn commit(&mut self, next: St::Next, trigger: Option<String>) {
        let from = self.state.name().to_string();
        self.state.enter(next);
        tracing::debug!(
            machine = %self.id,
            from = from.as_str(),
            to = self.state.name(),
            "state transition committed"
        );

        if !self.subscribers.is_empty() {
            let to = self.state.name().to_string();
            let event = Event::new(self.id, from, EventKind::Transitioned { to, trigger });
            self.subscribers.notify(&event);
        }
    }

    fn terminate(&mut self, reason: Termination) {
        let discarded = self.deferred.len();
        self.deferred.clear();
        if discarded > 0 {
            tracing::warn!(machine = %self.id, discarded, "deferred incomes discarded on termination");
        }
        tracing::debug!(machine = %self.id, state = self.state.name(), %reason, "machine terminated");

        self.emit(EventKind::Terminated {
            reason: reason.clone(),
            discarded,
        });
        self.termination = Some(reason);
    }

    fn emit(&self, kind: EventKind) {
        if !self.subscribers.is_empty() {
            let event = Event::new(self.id, self.state.name(), kind);
            self.subscribers.notify(&event);
        }
    }
}

/// Reports a recalled income whose handler future was dropped before it
/// completed. The income has already left the queue at that point.
struct InFlight<'a> {
    subscribers: &'a Subscribers,
    machine: Uuid,
    state: String,
    armed: bool,
}

impl<'a> InFlight<'a> {
    fn new(subscribers: &'a Subscribers, machine: Uuid, state: &str) -> Self {
        Self {
            subscribers,
            machine,
            state: state.to_string(),
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        tracing::warn!(
            machine = %self.machine,
            state = self.state.as_str(),
            "replay cancelled, deferred income discarded"
        );
        if !self.subscribers.is_empty() {
            let event = Event::new(
                self.machine,
                self.state.as_str(),
                EventKind::Discarded { count: 1 },
            );
            self.subscribers.notify(&event);
        }
    }
}
