//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to runtime events emitted by the admission path, flight
//! tasks, the snapshot publisher and the tower itself.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `admission`, `FlightActor`, `Publisher`, `Tower`,
//!   `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: `Tower::subscriber_listener()` (fans out to `SubscriberSet`)
//!   and `Registry` (its own listener for task cleanup).

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
