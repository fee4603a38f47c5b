//! A pure, side-effect-free CANopen master-side protocol engine.
//!
//! This crate translates application intents ("read object 0x1017:0",
//! "configure PDO 1", "change node state") into outgoing CAN frames,
//! ingests incoming CAN frames and classifies them against a node-local
//! object dictionary, and keeps a small cache of the most recently
//! observed object values with their timestamps.
//!
//! It does not open sockets, spawn threads, or manage time — every
//! [`frame::Timestamp`] comes from whatever drives the [`state_machine`]
//! with frames. Wiring this engine to an actual bus is the job of an
//! external driver; see the `socketcan` feature for a minimal adapter.
//!
//! The [`state_machine::StateMachine`] is the entry point for most uses: one
//! instance per remote node, fed frames via
//! [`state_machine::StateMachine::process`]. [`facade::Node`] wraps it with
//! typed accessors keyed by compile-time object descriptors, for
//! applications that know their object dictionary layout ahead of time.

pub mod dictionary;
pub mod emergency;
pub mod error;
pub mod facade;
pub mod frame;
pub mod nmt;
pub mod pdo;
pub mod sdo;
pub mod state_machine;

#[cfg(feature = "socketcan")]
pub mod socketcan_adapter;

pub use error::CanOpenError;
pub use frame::{Frame, Timestamp};
pub use state_machine::{StateMachine, Update, UpdateMode};
