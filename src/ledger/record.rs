//! # Operation records: one per admitted flight.
//!
//! A record is created `Pending` by admission and then moved strictly forward
//! by the flight's scheduler task:
//!
//! ```text
//! Pending ──activate()──► Active ──complete()──► Completed
//! ```
//!
//! Identity fields (`id`, `kind`, `carrier`) never change after creation.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Operation requested by a flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    /// Landing; holds the runway longer.
    #[serde(alias = "aterrizaje")]
    Landing,
    /// Takeoff.
    #[serde(alias = "despegue")]
    Takeoff,
}

impl OperationKind {
    /// Canonical wire literal.
    pub fn as_str(self) -> &'static str {
        match self {
            OperationKind::Landing => "landing",
            OperationKind::Takeoff => "takeoff",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = ();

    /// Accepts the canonical literals and the legacy `aterrizaje` / `despegue`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "landing" | "aterrizaje" => Ok(OperationKind::Landing),
            "takeoff" | "despegue" => Ok(OperationKind::Takeoff),
            _ => Err(()),
        }
    }
}

/// Lifecycle state of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlightState {
    /// Admitted, waiting for a runway slot.
    Pending,
    /// Holding a runway slot.
    Active,
    /// Operation finished; slot released.
    Completed,
}

/// Ledger entry for one flight.
#[derive(Debug, Clone)]
pub struct OperationRecord {
    id: Arc<str>,
    kind: OperationKind,
    carrier: Arc<str>,
    state: FlightState,
    requested_at: Instant,
    started_at: Option<Instant>,
    ended_at: Option<Instant>,
    runway: Option<u32>,
}

impl OperationRecord {
    /// Creates a pending record stamped with `requested_at`.
    pub fn pending(
        id: impl Into<Arc<str>>,
        kind: OperationKind,
        carrier: impl Into<Arc<str>>,
        requested_at: Instant,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            carrier: carrier.into(),
            state: FlightState::Pending,
            requested_at,
            started_at: None,
            ended_at: None,
            runway: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn id_arc(&self) -> Arc<str> {
        Arc::clone(&self.id)
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn carrier(&self) -> &str {
        &self.carrier
    }

    pub fn state(&self) -> FlightState {
        self.state
    }

    pub fn requested_at(&self) -> Instant {
        self.requested_at
    }

    pub fn started_at(&self) -> Option<Instant> {
        self.started_at
    }

    pub fn ended_at(&self) -> Option<Instant> {
        self.ended_at
    }

    /// Runway label; set once the record is active.
    pub fn runway(&self) -> Option<u32> {
        self.runway
    }

    /// `started_at - requested_at`, once active.
    pub fn wait_duration(&self) -> Option<Duration> {
        self.started_at
            .map(|s| s.saturating_duration_since(self.requested_at))
    }

    /// `ended_at - started_at`, once completed.
    pub fn service_duration(&self) -> Option<Duration> {
        match (self.started_at, self.ended_at) {
            (Some(s), Some(e)) => Some(e.saturating_duration_since(s)),
            _ => None,
        }
    }

    /// Pending → Active. Timestamps never go backwards.
    pub(crate) fn mark_active(&mut self, runway: u32, now: Instant) {
        debug_assert_eq!(self.state, FlightState::Pending);
        self.state = FlightState::Active;
        self.started_at = Some(now.max(self.requested_at));
        self.runway = Some(runway);
    }

    /// Active → Completed.
    pub(crate) fn mark_completed(&mut self, now: Instant) {
        debug_assert_eq!(self.state, FlightState::Active);
        let started = self.started_at.unwrap_or(self.requested_at);
        self.state = FlightState::Completed;
        self.ended_at = Some(now.max(started));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parses_canonical_and_legacy_literals() {
        assert_eq!("landing".parse(), Ok(OperationKind::Landing));
        assert_eq!("despegue".parse(), Ok(OperationKind::Takeoff));
        assert!("taxi".parse::<OperationKind>().is_err());
        assert!("Landing".parse::<OperationKind>().is_err());
    }

    #[test]
    fn test_durations_follow_transitions() {
        let t0 = Instant::now();
        let mut rec = OperationRecord::pending("IB1234", OperationKind::Landing, "IB", t0);
        assert_eq!(rec.wait_duration(), None);
        assert_eq!(rec.runway(), None);

        rec.mark_active(1, t0 + Duration::from_millis(400));
        assert_eq!(rec.state(), FlightState::Active);
        assert_eq!(rec.wait_duration(), Some(Duration::from_millis(400)));
        assert_eq!(rec.service_duration(), None);

        rec.mark_completed(t0 + Duration::from_millis(1400));
        assert_eq!(rec.state(), FlightState::Completed);
        assert_eq!(rec.service_duration(), Some(Duration::from_secs(1)));
        assert!(rec.requested_at() <= rec.started_at().unwrap());
        assert!(rec.started_at().unwrap() <= rec.ended_at().unwrap());
    }

    #[test]
    fn test_timestamps_are_clamped_forward() {
        let t0 = Instant::now() + Duration::from_secs(1);
        let mut rec = OperationRecord::pending("AA1", OperationKind::Takeoff, "AA", t0);
        rec.mark_active(2, t0 - Duration::from_millis(10));
        assert_eq!(rec.started_at(), Some(t0));
    }
}
