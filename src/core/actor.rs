//! # FlightActor: one flight's runway lifecycle.
//!
//! Owns the `pending → active → completed` transition of a single record:
//! - waits for a runway slot (unless admission already granted one),
//! - activates the record and holds the slot for the operation duration,
//! - completes the record and releases the slot.
//!
//! ## Event flow
//! ```text
//! [queued: wait for hand-off] → RunwayClaimed → [hold runway] → FlightCompleted
//!                                                             → FlightCanceled (shutdown)
//!                                                             → FlightFailed (any other error)
//! ```
//!
//! ## Architecture
//! ```text
//! admission ──► Registry::spawn ──► FlightActor::run()
//!
//!   ├─► Start::Granted(slot, label) ─────────────┐
//!   ├─► Start::Queued(waiter) ─► wait (cancellable)
//!   │                                            ▼
//!   ├─► ledger.activate(id, label)   (fails → FlightFailed)
//!   ├─► publish RunwayClaimed
//!   ├─► sleep(operation duration)    (cancellable)
//!   ├─► ledger.complete(id)          (any error above → ledger.abandon(id))
//!   └─► drop(slot) → next queued flight
//! ```
//!
//! ## Rules
//! - The [`RunwaySlot`] is an RAII guard: it is released on **every** exit path.
//! - A failing flight leaves the ledger before its slot is released, so the next
//!   holder never sees it as active.
//! - Every failure is reported through one terminal event; it never stalls silently.
//! - Cancellation is observed while waiting for a slot and while holding one.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::{select, time};
use tokio_util::sync::CancellationToken;

use crate::{
    error::FlightError,
    events::{Bus, Event, EventKind},
    ledger::{Ledger, OperationKind, OperationRecord},
    runway::{RunwayPool, RunwaySlot, SlotWaiter},
};

/// How the actor obtains its runway slot.
pub enum Start {
    /// Slot granted at admission; the reply already promised `runway`.
    Granted { slot: RunwaySlot, runway: u32 },
    /// Flight is queued; the slot arrives through the waiter.
    Queued(SlotWaiter),
}

/// Drives one flight from pending to completed.
pub struct FlightActor {
    /// Flight id (ledger key).
    pub flight: Arc<str>,
    /// Requested operation.
    pub kind: OperationKind,
    /// How long the runway is held.
    pub hold: Duration,
    /// Slot source.
    pub start: Start,
    /// Shared record store.
    pub ledger: Arc<Ledger>,
    /// Shared runway pool (for labels of queued flights).
    pub pool: Arc<RunwayPool>,
    /// Internal event bus.
    pub bus: Bus,
}

impl FlightActor {
    /// Runs the flight to completion, failure or cancellation.
    ///
    /// Publishes exactly one terminal event (`FlightCompleted`, `FlightCanceled`
    /// or `FlightFailed`) tagged with `ticket`.
    pub async fn run(self, ticket: u64, token: CancellationToken) {
        let flight = Arc::clone(&self.flight);
        let ledger = Arc::clone(&self.ledger);
        let bus = self.bus.clone();
        let kind = self.kind;

        match self.drive(ticket, &token).await {
            Ok(done) => {
                let mut ev = Event::new(EventKind::FlightCompleted)
                    .with_flight(Arc::clone(&flight))
                    .with_ticket(ticket)
                    .with_operation(kind);
                if let Some(r) = done.runway() {
                    ev = ev.with_runway(r);
                }
                if let Some(w) = done.wait_duration() {
                    ev = ev.with_wait(w);
                }
                if let Some(s) = done.service_duration() {
                    ev = ev.with_service(s);
                }
                bus.publish(ev);
            }
            Err(FlightError::Canceled) => {
                ledger.abandon(&flight);
                bus.publish(
                    Event::new(EventKind::FlightCanceled)
                        .with_flight(flight)
                        .with_ticket(ticket)
                        .with_operation(kind),
                );
            }
            Err(err) => {
                // Still pending if the wait failed; abandon is a no-op otherwise.
                ledger.abandon(&flight);
                tracing::debug!(flight = %flight, label = err.as_label(), "flight aborted");
                bus.publish(
                    Event::new(EventKind::FlightFailed)
                        .with_flight(flight)
                        .with_ticket(ticket)
                        .with_operation(kind)
                        .with_reason(err.to_string()),
                );
            }
        }
    }

    async fn drive(
        self,
        ticket: u64,
        token: &CancellationToken,
    ) -> Result<OperationRecord, FlightError> {
        let FlightActor {
            flight,
            kind,
            hold,
            start,
            ledger,
            pool,
            bus,
        } = self;

        let (slot, runway) = match start {
            Start::Granted { slot, runway } => (slot, runway),
            Start::Queued(waiter) => {
                let slot = select! {
                    res = waiter.wait() => res?,
                    _ = token.cancelled() => return Err(FlightError::Canceled),
                };
                let runway = ledger.next_runway_label(pool.capacity());
                (slot, runway)
            }
        };

        let held = async {
            let active = ledger.activate(&flight, runway, Instant::now())?;
            let mut claimed = Event::new(EventKind::RunwayClaimed)
                .with_flight(Arc::clone(&flight))
                .with_ticket(ticket)
                .with_operation(kind)
                .with_runway(runway);
            if let Some(w) = active.wait_duration() {
                claimed = claimed.with_wait(w);
            }
            bus.publish(claimed);

            select! {
                _ = time::sleep(hold) => {}
                _ = token.cancelled() => return Err(FlightError::Canceled),
            }
            ledger.complete(&flight, Instant::now())
        }
        .await;

        if held.is_err() {
            ledger.abandon(&flight);
        }
        drop(slot);
        held
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::FlightState;
    use crate::runway::Claim;

    struct Fixture {
        ledger: Arc<Ledger>,
        pool: Arc<RunwayPool>,
        bus: Bus,
    }

    impl Fixture {
        fn new(capacity: u32) -> Self {
            Self {
                ledger: Arc::new(Ledger::new()),
                pool: RunwayPool::new(capacity),
                bus: Bus::new(64),
            }
        }

        fn actor(&self, id: &str, kind: OperationKind, hold: Duration) -> FlightActor {
            self.ledger
                .register(OperationRecord::pending(id, kind, "IB", Instant::now()))
                .unwrap();
            let start = match self.pool.claim(id).unwrap() {
                Claim::Granted(slot) => Start::Granted {
                    runway: self.ledger.next_runway_label(self.pool.capacity()),
                    slot,
                },
                Claim::Queued(w) => Start::Queued(w),
            };
            FlightActor {
                flight: Arc::from(id),
                kind,
                hold,
                start,
                ledger: Arc::clone(&self.ledger),
                pool: Arc::clone(&self.pool),
                bus: self.bus.clone(),
            }
        }
    }

    #[tokio::test]
    async fn test_granted_flight_completes_and_releases() {
        let fx = Fixture::new(1);
        let mut rx = fx.bus.subscribe();
        let actor = fx.actor("IB1", OperationKind::Takeoff, Duration::from_millis(20));

        actor.run(1, CancellationToken::new()).await;

        assert_eq!(fx.ledger.state_of("IB1"), Some(FlightState::Completed));
        assert_eq!(fx.pool.in_use(), 0);
        assert_eq!(rx.recv().await.unwrap().kind, EventKind::RunwayClaimed);
        let done = rx.recv().await.unwrap();
        assert_eq!(done.kind, EventKind::FlightCompleted);
        assert_eq!(done.ticket, Some(1));
        assert_eq!(done.runway, Some(1));
    }

    #[tokio::test]
    async fn test_queued_flight_runs_after_release() {
        let fx = Fixture::new(1);
        let first = fx.actor("A", OperationKind::Takeoff, Duration::from_millis(50));
        let second = fx.actor("B", OperationKind::Landing, Duration::from_millis(10));
        assert_eq!(fx.ledger.state_of("B"), Some(FlightState::Pending));

        let token = CancellationToken::new();
        let h2 = tokio::spawn(second.run(2, token.clone()));
        let h1 = tokio::spawn(first.run(1, token.clone()));
        h1.await.unwrap();
        h2.await.unwrap();

        let a = fx.ledger.get("A").unwrap();
        let b = fx.ledger.get("B").unwrap();
        assert_eq!(b.state(), FlightState::Completed);
        assert!(b.started_at().unwrap() >= a.ended_at().unwrap());
        // Single runway: the round-robin label is always 1.
        assert_eq!(b.runway(), Some(1));
        assert_eq!(fx.ledger.stats().operations_completed, 2);
    }

    #[tokio::test]
    async fn test_missing_record_fails_and_releases_slot() {
        let fx = Fixture::new(1);
        let mut rx = fx.bus.subscribe();
        let actor = fx.actor("GONE", OperationKind::Landing, Duration::from_millis(10));
        fx.ledger.withdraw("GONE");

        actor.run(7, CancellationToken::new()).await;

        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::FlightFailed);
        assert_eq!(ev.ticket, Some(7));
        assert_eq!(fx.pool.in_use(), 0);
    }

    #[tokio::test]
    async fn test_cancel_while_holding_runway() {
        let fx = Fixture::new(1);
        let mut rx = fx.bus.subscribe();
        let actor = fx.actor("LONG", OperationKind::Landing, Duration::from_secs(30));
        let token = CancellationToken::new();
        let h = tokio::spawn(actor.run(1, token.clone()));

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(fx.ledger.state_of("LONG"), Some(FlightState::Active));
        token.cancel();
        h.await.unwrap();

        assert_eq!(fx.ledger.state_of("LONG"), None);
        assert_eq!(fx.pool.in_use(), 0);
        assert_eq!(rx.recv().await.unwrap().kind, EventKind::RunwayClaimed);
        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::FlightCanceled);
        assert_eq!(ev.ticket, Some(1));
        assert!(ev.reason.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_canceled_flight_leaves_ledger_before_handoff() {
        for round in 0..200 {
            let fx = Fixture::new(1);
            let id = format!("H{round}");
            let holder = fx.actor(&id, OperationKind::Landing, Duration::from_secs(30));
            let Claim::Queued(waiter) = fx.pool.claim("NEXT").unwrap() else {
                panic!("single runway already held");
            };
            let ledger = Arc::clone(&fx.ledger);
            let next = tokio::spawn(async move {
                let _slot = waiter.wait().await.unwrap();
                ledger.active_len()
            });

            let token = CancellationToken::new();
            let h = tokio::spawn(holder.run(1, token.clone()));
            tokio::time::timeout(Duration::from_secs(2), async {
                while fx.ledger.state_of(&id) != Some(FlightState::Active) {
                    tokio::time::sleep(Duration::from_millis(1)).await;
                }
            })
            .await
            .unwrap();
            token.cancel();
            h.await.unwrap();

            assert_eq!(next.await.unwrap(), 0, "round {round}");
        }
    }

    #[tokio::test]
    async fn test_cancel_while_queued() {
        let fx = Fixture::new(1);
        let _blocker = fx.actor("HOLD", OperationKind::Landing, Duration::from_secs(30));
        let waiting = fx.actor("WAIT", OperationKind::Takeoff, Duration::from_millis(10));
        let token = CancellationToken::new();
        token.cancel();

        let mut rx = fx.bus.subscribe();
        waiting.run(2, token).await;
        assert_eq!(fx.ledger.state_of("WAIT"), None);
        assert_eq!(fx.pool.in_use(), 1);
        assert_eq!(rx.recv().await.unwrap().kind, EventKind::FlightCanceled);
    }
}
