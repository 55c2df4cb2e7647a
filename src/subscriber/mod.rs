//! Observer channel for machine lifecycle events.
//!
//! Subscribers are notified synchronously, in registration order, from
//! inside the engine call that produced the event. The same subscriber may be
//! registered more than once; each registration gets its own
//! [`SubscriptionId`].

mod history;
mod logging;

pub use history::{History, TransitionLog, TransitionRecord};
pub use logging::LoggingSubscriber;

use crate::error::Termination;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Something that happened to a machine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Identity of the machine that emitted the event.
    pub machine: Uuid,
    /// The active state when the event happened. For transitions this is the
    /// source state.
    pub state: String,
    pub kind: EventKind,
    pub at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum EventKind {
    /// The first income reached the initial state.
    Started,
    /// An income was delivered to the state.
    Entered,
    /// The income was postponed.
    Deferred,
    /// A deferred income is being replayed.
    Recalled,
    /// The state produced an outcome.
    Outcome,
    /// The state failed to handle the income.
    Failed { error: String },
    /// A new state was committed.
    Transitioned { to: String, trigger: Option<String> },
    /// The machine stopped accepting incomes.
    Terminated {
        reason: Termination,
        discarded: usize,
    },
    /// Deferred incomes were dropped without being handled.
    Discarded { count: usize },
}

impl Event {
    pub fn new(machine: Uuid, state: impl Into<String>, kind: EventKind) -> Self {
        Self {
            machine,
            state: state.into(),
            kind,
            at: Utc::now(),
        }
    }

    /// `(previous, next, trigger)` for transition events.
    pub fn transition(&self) -> Option<(&str, &str, Option<&str>)> {
        match &self.kind {
            EventKind::Transitioned { to, trigger } => {
                Some((self.state.as_str(), to.as_str(), trigger.as_deref()))
            }
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.kind, EventKind::Terminated { .. })
    }
}

/// Receives machine events.
///
/// Any `Fn(&Event) + Send + Sync` closure is a subscriber.
pub trait Subscriber: Send + Sync {
    fn notify(&self, event: &Event);
}

impl<F> Subscriber for F
where
    F: Fn(&Event) + Send + Sync,
{
    fn notify(&self, event: &Event) {
        self(event)
    }
}

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Ordered subscriber registry owned by one machine.
#[derive(Clone, Default)]
pub struct Subscribers {
    next_id: u64,
    entries: Vec<(SubscriptionId, Arc<dyn Subscriber>)>,
}

impl Subscribers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<S>(&mut self, subscriber: S) -> SubscriptionId
    where
        S: Subscriber + 'static,
    {
        self.subscribe_shared(Arc::new(subscriber))
    }

    /// Register a subscriber the caller keeps a handle to.
    pub fn subscribe_shared(&mut self, subscriber: Arc<dyn Subscriber>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, subscriber));
        id
    }

    /// Returns `false` if the id was not registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry, _)| *entry != id);
        self.entries.len() != before
    }

    pub fn notify(&self, event: &Event) {
        for (_, subscriber) in &self.entries {
            subscriber.notify(event);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for Subscribers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscribers")
            .field("len", &self.entries.len())
            .finish()
    }
}
