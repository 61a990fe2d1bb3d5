//! Logical clock abstractions.
//!
//! A clock orders events without synchronized real time. Local events
//! `tick`; receiving a stamped message `observe`s the sender's time so the
//! receiver's next event is ordered after it.

pub mod lamport;

pub use lamport::LamportClock;

/// Trait for logical clocks.
///
/// # Thread Safety
///
/// Implementations must be thread-safe (Send + Sync): a clock is shared by
/// every caller issuing operations through its node.
pub trait Clock: Send + Sync + 'static {
    /// Current value without advancing.
    fn now(&self) -> u64;

    /// Advance for a local event and return the new value.
    fn tick(&self) -> u64;

    /// Merge a received timestamp and return the new value.
    fn observe(&self, received: u64) -> u64;
}
