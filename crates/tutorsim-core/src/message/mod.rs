//! Message routing between actors.

pub mod bus;
pub mod envelope;

pub use bus::{BusError, BusSender, EventBus};
