//! Statistics of a cache replication receiver.
//!
//! The core is [`rate::SlidingRate`], a cheap, thread-safe estimator of how many events
//! per unit of time happened recently. [`receiver::ReceiverStats`] keeps one of them
//! per kind of replicated event, next to lifetime counters.

pub mod clock;
pub mod config;
pub mod error;
pub mod interrupt;
pub mod rate;
pub mod receiver;
pub mod report;
pub mod simulate;
pub mod time_unit;
