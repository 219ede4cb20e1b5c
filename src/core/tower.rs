//! # Tower: admission listener, flight tasks, snapshot publisher, shutdown.
//!
//! The [`Tower`] owns the event bus, the [`SubscriberSet`], the ledger, the
//! runway pool and the flight registry. It serves admission connections,
//! runs the snapshot publisher and performs a graceful shutdown.
//!
//! ## High-level architecture
//! ```text
//! Tower::run()
//!   ├─ TcpListener::bind(listen_addr)          (Bind error on failure)
//!   └─ serve(listener, os signal)
//!
//! serve():
//!   ├─ Publisher::run(child token)            (one frame per snapshot_period)
//!   └─ loop accept ──► handle_connection ──► Tower::admit ──► Registry::spawn(FlightActor)
//!
//! Event flow:
//!   admission / FlightActor / Publisher ── publish(Event) ──► Bus ──┬─► subscriber_listener ──► SubscriberSet
//!                                                                   └─► Registry listener (task cleanup)
//!
//! Shutdown path:
//!   shutdown future completes
//!         └─► Bus.publish(ShutdownRequested)
//!         └─► runtime_token.cancel()   → new requests get `error`, flight tasks are cancelled
//!         └─► RunwayPool::close()      → queued flights stop waiting
//!         └─► Registry::drain(grace):
//!                ├─ Ok          → Bus.publish(AllStoppedWithin)
//!                └─ Err(stuck)  → Bus.publish(GraceExceeded) + RuntimeError::GraceExceeded
//! ```
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use towerctl::{Subscribe, Tower, TowerConfig};
//! #[cfg(feature = "logging")]
//! use towerctl::LogWriter;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cfg = TowerConfig::default();
//!
//!     let mut subs: Vec<Arc<dyn Subscribe>> = Vec::new();
//!     #[cfg(feature = "logging")]
//!     subs.push(Arc::new(LogWriter::new()));
//!
//!     let tower = Tower::builder(cfg).with_subscribers(subs).build();
//!     tower.run().await?;
//!     Ok(())
//! }
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::core::{TowerConfig, admission, builder::TowerBuilder, publisher::Publisher, shutdown};
use crate::error::RuntimeError;
use crate::events::{Bus, Event, EventKind};
use crate::ledger::Ledger;
use crate::protocol::Snapshot;
use crate::runway::RunwayPool;
use crate::subscribers::SubscriberSet;

use super::registry::Registry;

const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// Coordinates admission, flight tasks, snapshot publishing and graceful shutdown.
pub struct Tower {
    pub(crate) cfg: TowerConfig,
    pub(crate) bus: Bus,
    pub(crate) subs: Arc<SubscriberSet>,
    pub(crate) ledger: Arc<Ledger>,
    pub(crate) pool: Arc<RunwayPool>,
    pub(crate) registry: Arc<Registry>,
    pub(crate) runtime_token: CancellationToken,
}

impl Tower {
    /// Creates a builder for a tower with the given configuration.
    pub fn builder(cfg: TowerConfig) -> TowerBuilder {
        TowerBuilder::new(cfg)
    }

    pub(crate) fn new_internal(
        cfg: TowerConfig,
        bus: Bus,
        subs: Arc<SubscriberSet>,
        ledger: Arc<Ledger>,
        pool: Arc<RunwayPool>,
        registry: Arc<Registry>,
        runtime_token: CancellationToken,
    ) -> Self {
        Self {
            cfg,
            bus,
            subs,
            ledger,
            pool,
            registry,
            runtime_token,
        }
    }

    pub fn config(&self) -> &TowerConfig {
        &self.cfg
    }

    /// Event bus shared with every component.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    pub fn pool(&self) -> &Arc<RunwayPool> {
        &self.pool
    }

    /// Number of flight tasks still running.
    pub async fn running(&self) -> usize {
        self.registry.len().await
    }

    /// Current state as the observer would see it (nothing is drained).
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::from_view(
            &self.ledger.view(),
            self.ledger.epoch(),
            self.pool.capacity(),
            self.pool.in_use(),
            Snapshot::local_timestamp(),
        )
    }

    /// Binds `listen_addr` and serves until SIGINT/SIGTERM/SIGQUIT.
    pub async fn run(self: &Arc<Self>) -> Result<(), RuntimeError> {
        let listener = TcpListener::bind(&self.cfg.listen_addr)
            .await
            .map_err(|source| RuntimeError::Bind {
                addr: self.cfg.listen_addr.clone(),
                source,
            })?;
        tracing::info!(
            addr = %self.cfg.listen_addr,
            observer = %self.cfg.observer_addr,
            runways = self.pool.capacity(),
            "tower listening"
        );

        self.serve(listener, async {
            match shutdown::wait_for_shutdown_signal().await {
                Ok(sig) => tracing::info!(signal = sig, "shutdown signal received"),
                Err(e) => tracing::error!(error = %e, "signal registration failed"),
            }
        })
        .await
    }

    /// Serves admission connections on `listener` until `shutdown` completes,
    /// then shuts down gracefully.
    pub async fn serve<F>(self: &Arc<Self>, listener: TcpListener, shutdown: F) -> Result<(), RuntimeError>
    where
        F: Future<Output = ()>,
    {
        let publisher = Publisher::new(
            &self.cfg,
            Arc::clone(&self.ledger),
            Arc::clone(&self.pool),
            self.bus.clone(),
        );
        let publisher = tokio::spawn(publisher.run(self.runtime_token.child_token()));

        let mut connections = JoinSet::new();
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        connections.spawn(admission::handle_connection(Arc::clone(self), stream, peer));
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "accept failed");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                },
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
            }
        }
        drop(listener);

        self.bus.publish(Event::new(EventKind::ShutdownRequested));
        self.runtime_token.cancel();
        self.pool.close();
        connections.shutdown().await;
        let _ = publisher.await;

        self.wait_all_with_grace().await
    }

    /// Cancels every flight task and waits up to the configured grace.
    ///
    /// Publishes [`EventKind::AllStoppedWithin`] on success, or
    /// [`EventKind::GraceExceeded`] and returns [`RuntimeError::GraceExceeded`]
    /// with the stuck flights.
    async fn wait_all_with_grace(&self) -> Result<(), RuntimeError> {
        let grace = self.cfg.grace;
        match self.registry.drain(grace).await {
            Ok(()) => {
                self.bus.publish(Event::new(EventKind::AllStoppedWithin));
                Ok(())
            }
            Err(stuck) => {
                self.bus.publish(
                    Event::new(EventKind::GraceExceeded).with_reason(stuck.join(",")),
                );
                Err(RuntimeError::GraceExceeded { grace, stuck })
            }
        }
    }

    /// Forwards bus events to the subscriber set.
    pub(crate) fn subscriber_listener(&self) {
        let mut rx = self.bus.subscribe();
        let set = Arc::clone(&self.subs);
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(ev) => set.emit(&ev),
                    Err(RecvError::Lagged(n)) => {
                        tracing::warn!(skipped = n, "subscriber listener lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
    }
}
