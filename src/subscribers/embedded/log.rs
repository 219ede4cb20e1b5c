//! # LogWriter: event renderer over `tracing`
//!
//! A subscriber that renders incoming [`Event`]s as structured `tracing` records.
//! Installing a `tracing` subscriber (see the `towerctl` binary) decides where they go.
//!
//! ## Example output
//! ```text
//! INFO towerctl::log: flight authorized flight="IB1234" op=landing runway=1
//! INFO towerctl::log: flight queued flight="AA2001" op=takeoff
//! INFO towerctl::log: runway claimed flight="AA2001" runway=2 wait_ms=1830
//! INFO towerctl::log: flight completed flight="IB1234" runway=1 wait_ms=0 service_ms=3001
//! WARN towerctl::log: snapshot not delivered reason="observer unreachable ..."
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let flight = e.flight.as_deref().unwrap_or("-");
        let op = e.operation.map(|o| o.as_str()).unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("");

        match e.kind {
            EventKind::FlightAdmitted => {
                tracing::info!(target: "towerctl::log", flight, op, runway = ?e.runway, "flight authorized");
            }
            EventKind::FlightQueued => {
                tracing::info!(target: "towerctl::log", flight, op, "flight queued");
            }
            EventKind::FlightRejected => {
                tracing::info!(target: "towerctl::log", flight, reason, "request rejected");
            }
            EventKind::RunwayClaimed => {
                tracing::info!(target: "towerctl::log", flight, op, runway = ?e.runway, wait_ms = ?e.wait_ms, "runway claimed");
            }
            EventKind::FlightCompleted => {
                tracing::info!(
                    target: "towerctl::log",
                    flight,
                    op,
                    runway = ?e.runway,
                    wait_ms = ?e.wait_ms,
                    service_ms = ?e.service_ms,
                    "flight completed"
                );
            }
            EventKind::FlightFailed => {
                tracing::error!(target: "towerctl::log", flight, reason, "flight failed");
            }
            EventKind::FlightCanceled => {
                tracing::info!(target: "towerctl::log", flight, op, "flight canceled");
            }
            EventKind::SnapshotPublished => {
                tracing::debug!(target: "towerctl::log", delivered = ?e.delivered, "snapshot published");
            }
            EventKind::SnapshotFailed => {
                tracing::warn!(target: "towerctl::log", reason, "snapshot not delivered");
            }
            EventKind::ShutdownRequested => {
                tracing::info!(target: "towerctl::log", "shutdown requested");
            }
            EventKind::AllStoppedWithin => {
                tracing::info!(target: "towerctl::log", "all flights stopped within grace");
            }
            EventKind::GraceExceeded => {
                tracing::warn!(target: "towerctl::log", "grace exceeded");
            }
            EventKind::SubscriberOverflow => {
                tracing::warn!(target: "towerctl::log", subscriber = flight, reason, "subscriber overflow");
            }
            EventKind::SubscriberPanicked => {
                tracing::error!(target: "towerctl::log", subscriber = flight, reason, "subscriber panicked");
            }
        }
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
