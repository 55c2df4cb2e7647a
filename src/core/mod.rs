//! Core state machine contract.
//!
//! This module contains the pieces every engine is built on:
//! - the `StateSlot`, `State` and `AsyncState` traits
//! - their object-safe counterparts for open state sets
//! - the `Step` a state returns from handling an income

mod macros;
mod state;
mod step;

pub use state::{
    AsyncState, Blocking, BoxAsyncState, BoxState, DynAsyncState, DynState, State, StateSlot,
};
pub use step::Step;
