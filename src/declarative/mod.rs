//! Declarative transition tables.
//!
//! A [`TransitionTable`] maps `(state, trigger)` pairs to actions and target
//! states. Tables are validated once by [`TransitionTableBuilder::build`] and
//! then shared by any number of machine instances, each with its own model.
//!
//! Firing a trigger:
//! 1. an idempotent entry for the current state answers from the model;
//! 2. otherwise the trigger's action runs on the model and produces the
//!    outcome;
//! 3. the rules' guards are checked in declaration order, and the first one
//!    passing picks the target; when none passes the machine stays and the
//!    outcome is still returned;
//! 4. if the action fails, the first matching fallback state is entered and
//!    the error is still returned.
//!
//! Actions bound with [`TransitionTableBuilder::async_action`] may await.
//! Tables using them run on [`AsyncDeclarativeMachine`].

mod error;
mod guard;
mod machine;
mod rule;
mod table;

pub use error::DeclarationError;
pub use guard::Guard;
pub use machine::{AsyncDeclarativeMachine, Call, DeclarativeMachine, Declared};
pub use rule::Rule;
pub use table::{TransitionTable, TransitionTableBuilder};
