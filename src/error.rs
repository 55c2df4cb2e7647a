//! Error types shared by every engine.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Boxed error used for handler failures and income sources.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failure returned by a state's `handle`.
///
/// The engine attaches the name of the failing state before surfacing it
/// as an [`Error`].
#[derive(Debug, Error)]
pub enum StateError {
    /// The income is not acceptable in the current state.
    #[error("{0}")]
    Invalid(String),

    /// The handler itself failed.
    #[error(transparent)]
    Failed(BoxError),
}

impl StateError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }

    pub fn failed<E>(error: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self::Failed(error.into())
    }

    /// Whether this error should be offered to a state's recovery hook.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Errors surfaced by the execution engines.
#[derive(Debug, Error)]
pub enum Error {
    #[error("state '{state}' cannot handle income: {message}")]
    InvalidState { state: String, message: String },

    #[error("state machine is closed at '{state}': {reason}")]
    ClosedMachine { state: String, reason: Termination },

    #[error("state '{state}' failed: {source}")]
    Handler {
        state: String,
        #[source]
        source: BoxError,
    },

    #[error("income source failed: {0}")]
    Source(#[source] BoxError),
}

impl Error {
    pub(crate) fn from_state(state: &str, error: StateError) -> Self {
        match error {
            StateError::Invalid(message) => Self::InvalidState {
                state: state.to_string(),
                message,
            },
            StateError::Failed(source) => Self::Handler {
                state: state.to_string(),
                source,
            },
        }
    }

    pub fn is_invalid_state(&self) -> bool {
        matches!(self, Self::InvalidState { .. })
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Self::ClosedMachine { .. })
    }
}

/// Why a machine stopped accepting incomes. Terminal is irreversible.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Termination {
    /// A state returned `Step::Abort`.
    Aborted(String),

    /// A state returned `Step::Finish` and the named state was entered.
    Finished(String),
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Aborted(reason) => write!(f, "aborted: {reason}"),
            Self::Finished(state) => write!(f, "final state '{state}' reached"),
        }
    }
}
