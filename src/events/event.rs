//! # Runtime events emitted by the tower.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Flight events**: admission outcome and scheduler lifecycle
//! - **Publishing events**: snapshot push outcome
//! - **Shutdown events**: orderly teardown progress
//! - **Subscriber events**: health of the subscriber workers
//!
//! The [`Event`] struct carries additional metadata such as timestamps, flight id,
//! runway label, reasons and durations.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use towerctl::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::RunwayClaimed)
//!     .with_flight("IB1234")
//!     .with_runway(2)
//!     .with_wait(Duration::from_millis(1500));
//!
//! assert_eq!(ev.kind, EventKind::RunwayClaimed);
//! assert_eq!(ev.flight.as_deref(), Some("IB1234"));
//! assert_eq!(ev.runway, Some(2));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::ledger::OperationKind;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `flight`: subscriber name
    /// - `reason`: panic info/message
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `flight`: subscriber name
    /// - `reason`: reason string (e.g., "full", "closed")
    SubscriberOverflow,

    // === Shutdown events ===
    /// Shutdown requested (OS signal or explicit trigger).
    ShutdownRequested,

    /// All flight tasks stopped within the configured grace period.
    AllStoppedWithin,

    /// Grace period exceeded; some flight tasks did not stop in time.
    GraceExceeded,

    // === Flight events ===
    /// Flight admitted and granted a runway slot at admission time.
    ///
    /// Sets:
    /// - `flight`: flight id
    /// - `operation`: landing or takeoff
    /// - `runway`: label promised in the reply
    FlightAdmitted,

    /// Flight admitted without a free runway; waiting in the queue.
    ///
    /// Sets:
    /// - `flight`: flight id
    /// - `operation`: landing or takeoff
    FlightQueued,

    /// Request turned away at admission.
    ///
    /// Sets:
    /// - `flight`: flight id, when one was decoded
    /// - `reason`: rejection reason
    FlightRejected,

    /// Flight moved pending → active and holds a runway slot.
    ///
    /// Sets:
    /// - `flight`: flight id
    /// - `operation`: landing or takeoff
    /// - `runway`: label assigned
    /// - `wait_ms`: time spent pending
    RunwayClaimed,

    /// Flight moved active → completed and released its slot.
    ///
    /// Sets:
    /// - `flight`: flight id
    /// - `operation`: landing or takeoff
    /// - `runway`: label held
    /// - `wait_ms`, `service_ms`: derived durations
    FlightCompleted,

    /// Flight task failed and was abandoned.
    ///
    /// Sets:
    /// - `flight`: flight id
    /// - `reason`: failure message
    FlightFailed,

    /// Flight task was cancelled by shutdown and dropped from the ledger.
    ///
    /// Sets:
    /// - `flight`: flight id
    /// - `operation`: landing or takeoff
    FlightCanceled,

    // === Publishing events ===
    /// Snapshot delivered to the observer.
    ///
    /// Sets:
    /// - `delivered`: number of completed records drained
    SnapshotPublished,

    /// Snapshot could not be delivered this tick.
    ///
    /// Sets:
    /// - `reason`: failure message
    SnapshotFailed,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Flight id (or subscriber name for subscriber events).
    pub flight: Option<Arc<str>>,
    /// Internal task ticket of the flight (unique even when ids are reused).
    pub ticket: Option<u64>,
    /// Requested operation.
    pub operation: Option<OperationKind>,
    /// Runway label.
    pub runway: Option<u32>,
    /// Time spent pending in milliseconds (compact).
    pub wait_ms: Option<u32>,
    /// Time spent holding a runway in milliseconds (compact).
    pub service_ms: Option<u32>,
    /// Number of completed records drained by a publish.
    pub delivered: Option<u32>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            flight: None,
            ticket: None,
            operation: None,
            runway: None,
            wait_ms: None,
            service_ms: None,
            delivered: None,
            reason: None,
        }
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a flight id.
    #[inline]
    pub fn with_flight(mut self, flight: impl Into<Arc<str>>) -> Self {
        self.flight = Some(flight.into());
        self
    }

    /// Attaches the flight's task ticket.
    #[inline]
    pub fn with_ticket(mut self, ticket: u64) -> Self {
        self.ticket = Some(ticket);
        self
    }

    /// Attaches the requested operation.
    #[inline]
    pub fn with_operation(mut self, op: OperationKind) -> Self {
        self.operation = Some(op);
        self
    }

    /// Attaches a runway label.
    #[inline]
    pub fn with_runway(mut self, runway: u32) -> Self {
        self.runway = Some(runway);
        self
    }

    /// Attaches the pending duration (stored as milliseconds).
    #[inline]
    pub fn with_wait(mut self, d: Duration) -> Self {
        self.wait_ms = Some(compact_ms(d));
        self
    }

    /// Attaches the service duration (stored as milliseconds).
    #[inline]
    pub fn with_service(mut self, d: Duration) -> Self {
        self.service_ms = Some(compact_ms(d));
        self
    }

    /// Attaches the number of delivered completed records.
    #[inline]
    pub fn with_delivered(mut self, n: usize) -> Self {
        self.delivered = Some(n.min(u32::MAX as usize) as u32);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_flight(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_flight(subscriber)
            .with_reason(info)
    }

    /// True for events that end a flight task.
    #[inline]
    pub fn is_flight_terminal(&self) -> bool {
        matches!(
            self.kind,
            EventKind::FlightCompleted | EventKind::FlightFailed | EventKind::FlightCanceled
        )
    }
}

fn compact_ms(d: Duration) -> u32 {
    d.as_millis().min(u128::from(u32::MAX)) as u32
}
