//! # Runway capacity.
//!
//! [`RunwayPool`] hands out [`RunwaySlot`]s; a flight holds exactly one while active.

mod pool;

pub use pool::{Claim, RunwayPool, RunwaySlot, SlotWaiter};
