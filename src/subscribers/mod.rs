//! # Event subscribers for the tower runtime.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out
//! and built-in implementations for handling runtime events broadcast through
//! the [`Bus`](crate::events::Bus).
//!
//! ## Architecture
//! ```text
//! Event flow:
//!   FlightActor ── publish(Event) ──► Bus ──► subscriber_listener ──► SubscriberSet
//!                                                                     ┌────┴────┬────────┐
//!                                                                     ▼         ▼        ▼
//!                                                                 LogWriter  Metrics  Custom
//! ```

mod set;
mod subscriber;

#[cfg(feature = "logging")]
mod embedded;

pub use set::SubscriberSet;
pub use subscriber::Subscribe;

#[cfg(feature = "logging")]
pub use embedded::LogWriter;
