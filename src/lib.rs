//! # towerctl
//!
//! **towerctl** is the core of an airport control tower: it admits landing and
//! takeoff requests over TCP, schedules them onto a fixed pool of runways and
//! pushes periodic state snapshots to an observer.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   requester         requester         requester
//!   (1 JSON req)      (1 JSON req)      (1 JSON req)
//!        │                 │                 │
//!        ▼                 ▼                 ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Tower (runtime orchestrator)                                     │
//! │  - admission listener (one reply per connection)                  │
//! │  - Ledger (pending / active / completed records + stats)          │
//! │  - RunwayPool (capacity slots, FIFO waiters)                      │
//! │  - Registry (running flight tasks by ticket)                      │
//! │  - Bus + SubscriberSet (runtime events)                           │
//! └──────┬──────────────────┬──────────────────┬───────────────┬──────┘
//!        ▼                  ▼                  ▼               │
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐   │
//!     │ FlightActor  │   │ FlightActor  │   │ FlightActor  │   │
//!     │ (wait, hold, │   │              │   │              │   │
//!     │  complete)   │   │              │   │              │   │
//!     └┬─────────────┘   └┬─────────────┘   └┬─────────────┘   │
//!      │ RunwayClaimed    │ FlightCompleted  │ FlightFailed    │
//!      ▼                  ▼                  ▼                 ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                        Bus (broadcast channel)                    │
//! └──────────────┬───────────────────────────────────┬────────────────┘
//!                ▼                                   ▼
//!        subscriber_listener                 Registry listener
//!                ▼                           (joins finished tasks)
//!          SubscriberSet
//!          (per-sub queues) ──► LogWriter / custom subscribers
//!
//! Publisher (every snapshot_period):
//!   Ledger + RunwayPool ──► Snapshot ──► [u32 BE length][JSON] ──► observer
//!                                          on success: drain delivered completed records
//! ```
//!
//! ### Flight lifecycle
//! ```text
//! request ──► pending ──(slot granted or handed off)──► active ──(hold elapsed)──► completed
//!                                                                                   │
//!                                               delivered in a snapshot ──► removed ┘
//! ```
//!
//! ## Features
//! | Area              | Description                                              | Key types                                   |
//! |-------------------|----------------------------------------------------------|---------------------------------------------|
//! | **Runtime**       | Admission, scheduling, publishing, graceful shutdown.    | [`Tower`], [`TowerBuilder`]                 |
//! | **Wire formats**  | Request, reply and snapshot encodings.                   | [`FlightRequest`], [`Reply`], [`Snapshot`]  |
//! | **State**         | Flight records, runway pool.                             | [`Ledger`], [`RunwayPool`]                  |
//! | **Subscriber API**| Hook into runtime events.                                | [`Subscribe`], [`Event`]                    |
//! | **Errors**        | Typed errors for every boundary.                         | [`AdmissionError`], [`RuntimeError`]        |
//! | **Configuration** | Defaults plus `TOWER_*` environment overrides.           | [`TowerConfig`]                             |
//!
//! ## Optional features
//! - `logging` (default): exports the built-in [`LogWriter`] that renders events through `tracing`.
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use towerctl::{Subscribe, Tower, TowerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cfg = TowerConfig::from_env()?;
//!
//!     #[cfg(feature = "logging")]
//!     let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(towerctl::LogWriter::new())];
//!     #[cfg(not(feature = "logging"))]
//!     let subs: Vec<Arc<dyn Subscribe>> = Vec::new();
//!
//!     let tower = Tower::builder(cfg).with_subscribers(subs).build();
//!     tower.run().await?;
//!     Ok(())
//! }
//! ```
mod core;
mod error;
mod events;
mod ledger;
mod protocol;
mod runway;
mod subscribers;

// ---- Public re-exports ----

pub use self::core::{Publisher, Tower, TowerBuilder, TowerConfig};
pub use error::{AdmissionError, ConfigError, FlightError, PublishError, RuntimeError};
pub use events::{Bus, Event, EventKind};
pub use ledger::{FlightState, Ledger, LedgerView, OperationKind, OperationRecord, Stats};
pub use protocol::{
    FlightRequest, MAX_FRAME_BYTES, RecordView, Reply, Snapshot, StatsView, UNKNOWN_CARRIER,
    snapshot_codec,
};
pub use runway::{Claim, RunwayPool, RunwaySlot, SlotWaiter};
pub use subscribers::{Subscribe, SubscriberSet};

// Built-in logger subscriber.
// Enable with: `--features logging` (on by default)
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
