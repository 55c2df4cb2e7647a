//! Execution engines.
//!
//! Four engines share one dispatch core:
//!
//! | | blocking | suspension-capable |
//! |---|---|---|
//! | one income per call | [`UnaryMachine`] | [`AsyncUnaryMachine`] |
//! | sequence of incomes | [`StreamMachine`] | [`AsyncStreamMachine`] |
//!
//! Within one machine an income is never delivered before the previous
//! income's whole transition and replay cycle has finished.

mod executor;
mod stream;
mod unary;

pub use stream::{AsyncStreamMachine, Run, StreamMachine};
pub use unary::{AsyncUnaryMachine, UnaryMachine};
