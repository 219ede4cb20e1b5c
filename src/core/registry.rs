//! # Flight registry - event-driven tracker of running flight tasks.
//!
//! The registry owns one handle (join + cancel token) per admitted flight and
//! subscribes to the [`Bus`] to clean up after itself:
//! - `spawn(actor)` → registers and starts the flight task under a fresh ticket
//! - `FlightCompleted` / `FlightCanceled` / `FlightFailed` (by ticket) → join and drop the handle
//! - `drain(grace)` → cancel everything and wait, reporting stuck flights
//!
//! ## Architecture
//! ```text
//! admission ──► Registry::spawn(actor) ──► tokio::spawn(actor.run(ticket, child_token))
//!
//! Bus → Registry listener
//!         ├─► FlightCompleted(ticket) → cleanup(ticket)
//!         ├─► FlightCanceled(ticket)  → cleanup(ticket)
//!         └─► FlightFailed(ticket)    → cleanup(ticket)
//! ```
//!
//! ## Rules
//! - Handles are keyed by ticket, not flight id (ids may be reused after publishing).
//! - A handle is inserted before its task can emit a terminal event.
//! - A panicking flight task is reported as `FlightFailed(actor_panic)` and dropped from the ledger.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::AdmissionError;
use crate::events::{Bus, Event, EventKind};
use crate::ledger::Ledger;

use super::actor::FlightActor;

/// Handle to a running flight task.
struct Handle {
    flight: Arc<str>,
    join: JoinHandle<()>,
    cancel: CancellationToken,
}

/// Event-driven registry of running flight tasks.
pub struct Registry {
    tasks: RwLock<HashMap<u64, Handle>>,
    next_ticket: AtomicU64,
    bus: Bus,
    ledger: Arc<Ledger>,
    runtime_token: CancellationToken,
}

impl Registry {
    pub fn new(bus: Bus, ledger: Arc<Ledger>, runtime_token: CancellationToken) -> Arc<Self> {
        Arc::new(Self {
            tasks: RwLock::new(HashMap::new()),
            next_ticket: AtomicU64::new(1),
            bus,
            ledger,
            runtime_token,
        })
    }

    /// Spawns the listener that joins finished flight tasks.
    ///
    /// Call once during tower init.
    pub fn spawn_listener(self: Arc<Self>) {
        let mut rx = self.bus.subscribe();
        let rt = self.runtime_token.clone();
        let me = self;

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = rt.cancelled() => break,
                    msg = rx.recv() => match msg {
                        Ok(ev) => me.handle_event(&ev).await,
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(n)) => {
                            tracing::warn!(skipped = n, "registry listener lagged");
                            me.reap_finished().await;
                        }
                    }
                }
            }
        });
    }

    async fn handle_event(&self, event: &Event) {
        if !event.is_flight_terminal() {
            return;
        }
        if let Some(ticket) = event.ticket {
            self.cleanup(ticket).await;
        }
    }

    /// Registers and starts a flight task; returns its ticket.
    ///
    /// Fails with [`AdmissionError::Closed`] once the tower is shutting down.
    pub async fn spawn(&self, actor: FlightActor) -> Result<u64, AdmissionError> {
        let mut tasks = self.tasks.write().await;
        if self.runtime_token.is_cancelled() {
            return Err(AdmissionError::Closed);
        }

        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let flight = Arc::clone(&actor.flight);
        let cancel = self.runtime_token.child_token();
        let join = tokio::spawn(actor.run(ticket, cancel.clone()));

        tasks.insert(
            ticket,
            Handle {
                flight,
                join,
                cancel,
            },
        );
        Ok(ticket)
    }

    /// Flight ids of running tasks, sorted.
    pub async fn list(&self) -> Vec<String> {
        let tasks = self.tasks.read().await;
        let mut names: Vec<String> = tasks.values().map(|h| h.flight.to_string()).collect();
        names.sort_unstable();
        names
    }

    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tasks.read().await.is_empty()
    }

    /// Cancels every flight task and waits up to `grace` for them to stop.
    ///
    /// Returns the flight ids that were still running when the grace elapsed.
    pub async fn drain(&self, grace: Duration) -> Result<(), Vec<String>> {
        let handles: Vec<(u64, Handle)> = {
            let mut tasks = self.tasks.write().await;
            tasks.drain().collect()
        };
        for (_, h) in &handles {
            h.cancel.cancel();
        }

        let deadline = tokio::time::Instant::now() + grace;
        let mut stuck = Vec::new();
        for (_, h) in handles {
            let Handle {
                flight, mut join, ..
            } = h;
            match tokio::time::timeout_at(deadline, &mut join).await {
                Ok(res) => self.report_join(&flight, res),
                Err(_) => {
                    join.abort();
                    stuck.push(flight.to_string());
                }
            }
        }

        if stuck.is_empty() {
            Ok(())
        } else {
            stuck.sort_unstable();
            Err(stuck)
        }
    }

    async fn cleanup(&self, ticket: u64) {
        let handle = self.tasks.write().await.remove(&ticket);
        if let Some(h) = handle {
            let res = h.join.await;
            self.report_join(&h.flight, res);
        }
    }

    /// Joins tasks that already finished (recovery after a lagged listener).
    async fn reap_finished(&self) {
        let finished: Vec<Handle> = {
            let mut tasks = self.tasks.write().await;
            let done: Vec<u64> = tasks
                .iter()
                .filter(|(_, h)| h.join.is_finished())
                .map(|(t, _)| *t)
                .collect();
            done.into_iter().filter_map(|t| tasks.remove(&t)).collect()
        };
        for h in finished {
            let res = h.join.await;
            self.report_join(&h.flight, res);
        }
    }

    fn report_join(&self, flight: &Arc<str>, res: Result<(), tokio::task::JoinError>) {
        let Err(err) = res else { return };
        if err.is_cancelled() {
            return;
        }
        self.ledger.abandon(flight);
        self.bus.publish(
            Event::new(EventKind::FlightFailed)
                .with_flight(Arc::clone(flight))
                .with_reason("actor_panic"),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::actor::Start;
    use crate::ledger::{FlightState, OperationKind, OperationRecord};
    use crate::runway::{Claim, RunwayPool};
    use std::time::Instant;

    fn actor(
        ledger: &Arc<Ledger>,
        pool: &Arc<RunwayPool>,
        bus: &Bus,
        id: &str,
        hold: Duration,
    ) -> FlightActor {
        ledger
            .register(OperationRecord::pending(
                id,
                OperationKind::Takeoff,
                "AA",
                Instant::now(),
            ))
            .unwrap();
        let start = match pool.claim(id).unwrap() {
            Claim::Granted(slot) => Start::Granted { slot, runway: 1 },
            Claim::Queued(w) => Start::Queued(w),
        };
        FlightActor {
            flight: Arc::from(id),
            kind: OperationKind::Takeoff,
            hold,
            start,
            ledger: Arc::clone(ledger),
            pool: Arc::clone(pool),
            bus: bus.clone(),
        }
    }

    #[tokio::test]
    async fn test_finished_flights_are_cleaned_up() {
        let bus = Bus::new(64);
        let ledger = Arc::new(Ledger::new());
        let pool = RunwayPool::new(2);
        let token = CancellationToken::new();
        let registry = Registry::new(bus.clone(), Arc::clone(&ledger), token.clone());
        Arc::clone(&registry).spawn_listener();

        let t1 = registry
            .spawn(actor(&ledger, &pool, &bus, "AA1", Duration::from_millis(10)))
            .await
            .unwrap();
        let t2 = registry
            .spawn(actor(&ledger, &pool, &bus, "AA2", Duration::from_millis(10)))
            .await
            .unwrap();
        assert_ne!(t1, t2);

        tokio::time::timeout(Duration::from_secs(2), async {
            while !registry.is_empty().await {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        assert_eq!(ledger.state_of("AA1"), Some(FlightState::Completed));
        token.cancel();
    }

    #[tokio::test]
    async fn test_drain_cancels_in_flight_operations() {
        let bus = Bus::new(64);
        let ledger = Arc::new(Ledger::new());
        let pool = RunwayPool::new(1);
        let token = CancellationToken::new();
        let registry = Registry::new(bus.clone(), Arc::clone(&ledger), token.clone());

        registry
            .spawn(actor(&ledger, &pool, &bus, "LH1", Duration::from_secs(60)))
            .await
            .unwrap();
        registry
            .spawn(actor(&ledger, &pool, &bus, "LH2", Duration::from_secs(60)))
            .await
            .unwrap();
        assert_eq!(registry.list().await, vec!["LH1", "LH2"]);

        token.cancel();
        assert!(registry.drain(Duration::from_secs(2)).await.is_ok());
        assert_eq!(pool.in_use(), 0);
        assert_eq!(ledger.pending_len() + ledger.active_len(), 0);

        let late = actor(&ledger, &pool, &bus, "LH3", Duration::from_millis(1));
        assert_eq!(registry.spawn(late).await.unwrap_err(), AdmissionError::Closed);
    }
}
