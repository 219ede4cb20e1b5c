//! # Snapshot publisher.
//!
//! Every `snapshot_period` the publisher captures the ledger and the runway
//! pool, pushes one length-prefixed JSON frame to the observer, and on success
//! drains exactly the completed records that frame carried.
//!
//! ```text
//! tick ──► capture (ledger view + pool occupancy)
//!      ──► connect (bounded by observer_timeout)
//!      ──► FramedWrite<TcpStream, LengthDelimitedCodec>::send(frame)
//!      ├─ ok  ──► ledger.drain_completed(ids in frame) ──► SnapshotPublished
//!      └─ err ──► nothing drained (records ride along next tick) ──► SnapshotFailed
//! ```
//!
//! Completed records that finish between capture and drain are not in the
//! frame and therefore stay in the ledger for the next tick.
//!
//! While the observer is unreachable the completed backlog is capped at
//! `completed_backlog` records, oldest dropped first. A frame that would still
//! exceed [`MAX_FRAME_BYTES`] is shrunk by halving the backlog until it fits.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::SinkExt;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::codec::FramedWrite;
use tokio_util::sync::CancellationToken;

use crate::core::TowerConfig;
use crate::error::PublishError;
use crate::events::{Bus, Event, EventKind};
use crate::ledger::Ledger;
use crate::protocol::{MAX_FRAME_BYTES, Snapshot, snapshot_codec};
use crate::runway::RunwayPool;

/// Periodic snapshot pusher.
pub struct Publisher {
    observer_addr: String,
    period: Duration,
    connect_timeout: Duration,
    backlog: usize,
    ledger: Arc<Ledger>,
    pool: Arc<RunwayPool>,
    bus: Bus,
}

impl Publisher {
    pub fn new(cfg: &TowerConfig, ledger: Arc<Ledger>, pool: Arc<RunwayPool>, bus: Bus) -> Self {
        Self {
            observer_addr: cfg.observer_addr.clone(),
            period: cfg.snapshot_period,
            connect_timeout: cfg.observer_timeout,
            backlog: cfg.completed_backlog_limit(),
            ledger,
            pool,
            bus,
        }
    }

    /// Ticks until `token` is cancelled.
    pub async fn run(self, token: CancellationToken) {
        let mut ticker = time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {}
            }
            tokio::select! {
                _ = token.cancelled() => break,
                _ = self.tick_and_report() => {}
            }
        }
    }

    async fn tick_and_report(&self) {
        match self.tick().await {
            Ok(delivered) => {
                self.bus
                    .publish(Event::new(EventKind::SnapshotPublished).with_delivered(delivered));
            }
            Err(err) => {
                tracing::debug!(observer = %self.observer_addr, label = err.as_label(), "tick failed");
                self.bus
                    .publish(Event::new(EventKind::SnapshotFailed).with_reason(err.to_string()));
            }
        }
    }

    /// Captures, delivers, and drains once. Returns the number of completed
    /// records drained.
    pub async fn tick(&self) -> Result<usize, PublishError> {
        let dropped = self.ledger.trim_completed(self.backlog);
        if dropped > 0 {
            tracing::warn!(dropped, keep = self.backlog, "completed backlog over cap, oldest dropped");
        }
        let (snapshot, payload) = self.encode_fitting()?;
        self.deliver(Bytes::from(payload)).await?;
        Ok(self
            .ledger
            .drain_completed(snapshot.completed.keys().map(String::as_str)))
    }

    /// Captures and encodes, halving the completed backlog until the frame fits.
    fn encode_fitting(&self) -> Result<(Snapshot, Vec<u8>), PublishError> {
        loop {
            let snapshot = self.capture();
            let payload = snapshot.encode()?;
            if payload.len() <= MAX_FRAME_BYTES {
                return Ok((snapshot, payload));
            }
            let completed = snapshot.completed.len();
            if completed == 0 {
                return Err(PublishError::FrameTooLarge {
                    size: payload.len(),
                    max: MAX_FRAME_BYTES,
                });
            }
            let dropped = self.ledger.trim_completed(completed / 2);
            tracing::warn!(
                size = payload.len(),
                dropped,
                "snapshot frame too large, oldest completed dropped"
            );
        }
    }

    /// Consistent view of the ledger and the pool at this instant.
    pub fn capture(&self) -> Snapshot {
        let view = self.ledger.view();
        Snapshot::from_view(
            &view,
            self.ledger.epoch(),
            self.pool.capacity(),
            self.pool.in_use(),
            Snapshot::local_timestamp(),
        )
    }

    async fn deliver(&self, frame: Bytes) -> Result<(), PublishError> {
        let stream = time::timeout(self.connect_timeout, TcpStream::connect(&self.observer_addr))
            .await
            .map_err(|_| PublishError::ConnectTimeout {
                timeout: self.connect_timeout,
            })?
            .map_err(|source| PublishError::Connect {
                addr: self.observer_addr.clone(),
                source,
            })?;

        let mut framed = FramedWrite::new(stream, snapshot_codec());
        framed.send(frame).await.map_err(PublishError::Write)?;
        framed
            .into_inner()
            .shutdown()
            .await
            .map_err(PublishError::Write)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{OperationKind, OperationRecord};
    use futures::StreamExt;
    use std::time::Instant;
    use tokio::net::TcpListener;
    use tokio_util::codec::FramedRead;

    fn completed_ledger(ids: &[&str]) -> Arc<Ledger> {
        let ledger = Arc::new(Ledger::new());
        for id in ids {
            let t0 = Instant::now();
            ledger
                .register(OperationRecord::pending(*id, OperationKind::Landing, "IB", t0))
                .unwrap();
            ledger.activate(id, 1, t0).unwrap();
            ledger.complete(id, t0).unwrap();
        }
        ledger
    }

    /// `n` completed records `K000000..`, each ending 1ms after the previous.
    fn seeded_ledger(n: usize) -> Arc<Ledger> {
        let ledger = Arc::new(Ledger::new());
        let t0 = Instant::now();
        for i in 0..n {
            let id = format!("K{i:06}");
            let ended = t0 + Duration::from_millis(i as u64);
            ledger
                .register(OperationRecord::pending(id.as_str(), OperationKind::Takeoff, "IB", t0))
                .unwrap();
            ledger.activate(&id, 1, t0).unwrap();
            ledger.complete(&id, ended).unwrap();
        }
        ledger
    }

    fn publisher(addr: String, ledger: Arc<Ledger>) -> Publisher {
        publisher_with_backlog(addr, ledger, 0)
    }

    fn publisher_with_backlog(addr: String, ledger: Arc<Ledger>, backlog: usize) -> Publisher {
        let cfg = TowerConfig {
            observer_addr: addr,
            observer_timeout: Duration::from_millis(500),
            completed_backlog: backlog,
            ..TowerConfig::default()
        };
        Publisher::new(&cfg, ledger, RunwayPool::new(2), Bus::new(16))
    }

    /// Accepts one connection and returns the raw frame it carried.
    async fn one_frame_observer() -> (String, tokio::task::JoinHandle<Bytes>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let observer = tokio::spawn(async move {
            let (sock, _) = listener.accept().await.unwrap();
            let mut frames = FramedRead::new(sock, snapshot_codec());
            frames.next().await.unwrap().unwrap().freeze()
        });
        (addr, observer)
    }

    #[tokio::test]
    async fn test_delivered_frame_drains_completed() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let observer = tokio::spawn(async move {
            let (sock, _) = listener.accept().await.unwrap();
            let mut frames = FramedRead::new(sock, snapshot_codec());
            let frame = frames.next().await.unwrap().unwrap();
            Snapshot::decode(&frame).unwrap()
        });

        let ledger = completed_ledger(&["A1", "A2"]);
        let p = publisher(addr, Arc::clone(&ledger));
        assert_eq!(p.tick().await.unwrap(), 2);

        let seen = observer.await.unwrap();
        assert_eq!(seen.completed.len(), 2);
        assert_eq!(seen.runways_total, 2);
        assert_eq!(ledger.completed_len(), 0);
        assert_eq!(ledger.stats().operations_completed, 2);
    }

    #[tokio::test]
    async fn test_unreachable_observer_keeps_completed() {
        // Bind then drop to get a port nobody listens on.
        let addr = {
            let l = TcpListener::bind("127.0.0.1:0").await.unwrap();
            l.local_addr().unwrap().to_string()
        };
        let ledger = completed_ledger(&["B1"]);
        let p = publisher(addr, Arc::clone(&ledger));

        let err = p.tick().await.unwrap_err();
        assert!(matches!(
            err,
            PublishError::Connect { .. } | PublishError::ConnectTimeout { .. }
        ));
        assert_eq!(ledger.completed_len(), 1);
    }

    #[tokio::test]
    async fn test_backlog_over_cap_keeps_newest_and_delivers() {
        let (addr, observer) = one_frame_observer().await;
        let ledger = seeded_ledger(250);
        let p = publisher_with_backlog(addr, Arc::clone(&ledger), 100);

        assert_eq!(p.tick().await.unwrap(), 100);

        let seen = Snapshot::decode(&observer.await.unwrap()).unwrap();
        let ids: Vec<_> = seen.completed.keys().cloned().collect();
        let expected: Vec<_> = (150..250).map(|i| format!("K{i:06}")).collect();
        assert_eq!(ids, expected);
        assert_eq!(ledger.completed_len(), 0);
        assert_eq!(ledger.stats().operations_completed, 250);
    }

    #[tokio::test]
    async fn test_oversized_backlog_is_shrunk_until_frame_fits() {
        let ledger = seeded_ledger(120_000);
        let p = publisher_with_backlog("127.0.0.1:1".into(), Arc::clone(&ledger), 1_000_000);
        assert!(p.capture().encode().unwrap().len() > MAX_FRAME_BYTES);

        let (addr, observer) = one_frame_observer().await;
        let p = publisher_with_backlog(addr, Arc::clone(&ledger), 1_000_000);
        let delivered = p.tick().await.unwrap();

        let frame = observer.await.unwrap();
        assert!(frame.len() <= MAX_FRAME_BYTES);
        let seen = Snapshot::decode(&frame).unwrap();
        assert_eq!(seen.completed.len(), delivered);
        assert!(delivered > 0 && delivered < 120_000);
        assert!(seen.completed.contains_key("K119999"));
        assert_eq!(ledger.completed_len(), 0);
    }

    #[tokio::test]
    async fn test_capture_reports_pool_occupancy() {
        let ledger = Arc::new(Ledger::new());
        let p = publisher("127.0.0.1:1".into(), ledger);
        let _slot = p.pool.claim("X").unwrap();

        let snap = p.capture();
        assert_eq!(snap.runways_total, 2);
        assert_eq!(snap.runways_free, 1);
    }
}
