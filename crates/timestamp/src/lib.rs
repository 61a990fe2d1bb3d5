//! Lamport-clock ordering for ring operations.
//!
//! This crate layers logical time over the core `put`/`get` contract without
//! touching the ring protocol:
//! - Every node carries a Lamport clock
//! - Operations travel as clock-stamped envelopes
//! - Each node keeps an event log of what it issued and a history of the
//!   writes it received

pub mod clock;
pub mod error;
pub mod event;
pub mod ring;

pub use clock::{Clock, LamportClock};
pub use error::{Result, TimestampError};
pub use event::{Envelope, Operation};
pub use ring::TimestampedRing;
