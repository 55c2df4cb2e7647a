//! Statekit: a generic finite state machine runtime
//!
//! A machine owns one active state. Each income is handed to that state,
//! which answers with a [`Step`](core::Step): stay and emit an outcome, move
//! to another state, postpone the income until the next transition, or stop
//! the machine for good.
//!
//! # Core Concepts
//!
//! - **State**: any value implementing [`core::State`] (blocking) or
//!   [`core::AsyncState`] (suspension-capable)
//! - **Engines**: single-income and streaming machines, in blocking and
//!   suspension-capable flavors, sharing one dispatch core
//! - **Defer/Recall**: postponed incomes are replayed, in arrival order,
//!   right after the next committed transition
//! - **Declarative tables**: validated transition tables with guards,
//!   idempotent entries and fallback states
//! - **Subscribers**: observers of every lifecycle event, including an
//!   in-memory transition history and a `tracing` logger
//!
//! # Example
//!
//! ```rust
//! use statekit::core::{State, Step};
//! use statekit::{sdk, state_enum, StateError};
//!
//! state_enum! {
//!     enum Job {
//!         Processing,
//!         Done,
//!     }
//! }
//!
//! impl State<&'static str, String> for Job {
//!     fn handle(&mut self, income: &'static str) -> Result<Step<Job, &'static str, String>, StateError> {
//!         match (*self, income) {
//!             (Job::Processing, "pause") => Ok(Step::defer(income)),
//!             (Job::Processing, "finish") => Ok(Step::to(Job::Done, "finished".to_string())),
//!             (Job::Done, other) => Ok(Step::stay(format!("{other} after done"))),
//!             (_, other) => Err(StateError::invalid(format!("unexpected {other}"))),
//!         }
//!     }
//! }
//!
//! let mut machine = sdk::unary(Job::Processing);
//! assert_eq!(machine.handle("pause").unwrap(), None);
//! assert_eq!(
//!     machine.handle_all("finish").unwrap(),
//!     vec!["finished".to_string(), "pause after done".to_string()]
//! );
//! ```

pub mod core;
pub mod declarative;
pub mod engine;
pub mod error;
pub mod sdk;
pub mod subscriber;

// Re-export commonly used types
pub use self::core::{AsyncState, Blocking, State, StateSlot, Step};
pub use declarative::{Call, DeclarationError, Guard, Rule, TransitionTable};
pub use engine::{AsyncStreamMachine, AsyncUnaryMachine, StreamMachine, UnaryMachine};
pub use error::{BoxError, Error, StateError, Termination};
pub use subscriber::{Event, EventKind, Subscriber, SubscriptionId};
