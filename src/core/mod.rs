//! Runtime core: admission, flight tasks, publishing and lifecycle.
//!
//! The public API from this module is [`Tower`] (with its [`TowerBuilder`]),
//! [`TowerConfig`] and the [`Publisher`].
//!
//! Internal modules:
//! - [`admission`]: reads one request per connection and admits or rejects it;
//! - [`actor`]: drives one flight through pending → active → completed;
//! - [`registry`]: tracks running flight tasks and drains them on shutdown;
//! - [`publisher`]: pushes periodic snapshots to the observer;
//! - [`shutdown`]: cross-platform shutdown signal handling;
//! - [`tower`]: wires everything together.

mod actor;
mod admission;
mod builder;
mod config;
mod publisher;
mod registry;
mod shutdown;
mod tower;

pub use builder::TowerBuilder;
pub use config::TowerConfig;
pub use publisher::Publisher;
pub use tower::Tower;
