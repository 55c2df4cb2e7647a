//! State transition history tracking.
//!
//! [`TransitionLog`] is an immutable record of committed transitions.
//! [`History`] is a subscriber that builds one while a machine runs.

use super::{Event, EventKind, Subscriber};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use uuid::Uuid;

/// Record of a single committed transition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
    /// The machine that transitioned
    pub machine: Uuid,
    /// Name of the state being left
    pub from: String,
    /// Name of the state being entered
    pub to: String,
    /// Debug rendering of the income that caused the transition, if any
    pub trigger: Option<String>,
    /// When the transition was committed
    pub timestamp: DateTime<Utc>,
}

impl TransitionRecord {
    /// Extract the record carried by a transition event.
    pub fn from_event(event: &Event) -> Option<Self> {
        match &event.kind {
            EventKind::Transitioned { to, trigger } => Some(Self {
                machine: event.machine,
                from: event.state.clone(),
                to: to.clone(),
                trigger: trigger.clone(),
                timestamp: event.at,
            }),
            _ => None,
        }
    }
}

/// Ordered log of transitions.
///
/// The log is immutable: `record` returns a new log with the transition
/// appended.
///
/// # Example
///
/// ```rust
/// use statekit::subscriber::{TransitionLog, TransitionRecord};
/// use chrono::Utc;
/// use uuid::Uuid;
///
/// let record = |from: &str, to: &str| TransitionRecord {
///     machine: Uuid::nil(),
///     from: from.to_string(),
///     to: to.to_string(),
///     trigger: None,
///     timestamp: Utc::now(),
/// };
///
/// let log = TransitionLog::new()
///     .record(record("Start", "Middle"))
///     .record(record("Middle", "End"));
///
/// assert_eq!(log.get_path(), vec!["Start", "Middle", "End"]);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionLog {
    transitions: Vec<TransitionRecord>,
}

impl TransitionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a transition, returning a new log. The receiver is unchanged.
    pub fn record(&self, transition: TransitionRecord) -> Self {
        let mut transitions = self.transitions.clone();
        transitions.push(transition);
        Self { transitions }
    }

    /// Append in place, for owners that hold the log behind a lock.
    pub(crate) fn push(&mut self, transition: TransitionRecord) {
        self.transitions.push(transition);
    }

    /// Names of the states traversed: the first source, then every target.
    pub fn get_path(&self) -> Vec<&str> {
        let mut path = Vec::new();
        if let Some(first) = self.transitions.first() {
            path.push(first.from.as_str());
        }
        for transition in &self.transitions {
            path.push(transition.to.as_str());
        }
        path
    }

    /// Time between the first and last transition.
    ///
    /// Returns `None` if there are no transitions.
    pub fn duration(&self) -> Option<Duration> {
        if let (Some(first), Some(last)) = (self.transitions.first(), self.transitions.last()) {
            let duration = last.timestamp.signed_duration_since(first.timestamp);
            duration.to_std().ok()
        } else {
            None
        }
    }

    pub fn transitions(&self) -> &[TransitionRecord] {
        &self.transitions
    }

    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }
}

/// Subscriber that keeps a [`TransitionLog`] of every transition it sees.
///
/// Register it with `subscribe_shared` to keep a handle for inspection.
#[derive(Debug, Default)]
pub struct History {
    log: Mutex<TransitionLog>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the log recorded so far.
    pub fn snapshot(&self) -> TransitionLog {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.log.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Subscriber for History {
    fn notify(&self, event: &Event) {
        if let Some(record) = TransitionRecord::from_event(event) {
            self.log
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(record);
        }
    }
}
