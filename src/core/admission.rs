//! # Admission: one request, one reply, one connection.
//!
//! ```text
//! accept ──► read_request (EOF or first complete JSON value, bounded)
//!        ──► FlightRequest::decode
//!        ──► Tower::admit
//!               ├─ register pending record        (duplicate → rechazado)
//!               ├─ RunwayPool::claim              (atomic: granted or queued)
//!               ├─ Registry::spawn(FlightActor)   (before the reply is written)
//!               └─ Reply: authorized | en_espera
//!        ──► write reply, shut down the write half
//! ```
//!
//! A request that fails at any step leaves nothing behind in the ledger. A panic
//! inside admission is caught and answered with an `error` reply.

use std::future::Future;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use serde::de::IgnoredAny;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{AdmissionError, panic_message};
use crate::events::{Event, EventKind};
use crate::ledger::{Ledger, OperationRecord};
use crate::protocol::{FlightRequest, Reply};
use crate::runway::Claim;

use super::actor::{FlightActor, Start};
use super::tower::Tower;

const READ_CHUNK: usize = 4096;

/// Reads one request payload.
///
/// Stops at end of stream or as soon as the buffer holds one complete JSON
/// value, whichever comes first. Bounded by `limit` bytes and by `timeout`.
pub(crate) async fn read_request<R>(
    stream: &mut R,
    limit: usize,
    timeout: Option<Duration>,
) -> Result<Vec<u8>, AdmissionError>
where
    R: AsyncRead + Unpin,
{
    let read = read_until_complete(stream, limit);
    match timeout {
        Some(t) => tokio::time::timeout(t, read)
            .await
            .map_err(|_| AdmissionError::Timeout { timeout: t })?,
        None => read.await,
    }
}

async fn read_until_complete<R>(stream: &mut R, limit: usize) -> Result<Vec<u8>, AdmissionError>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::with_capacity(READ_CHUNK.min(limit));
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        let n = stream
            .read(&mut chunk)
            .await
            .map_err(|e| AdmissionError::Decode {
                reason: format!("read failed: {e}"),
            })?;
        if n == 0 {
            return Ok(buf);
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.len() > limit {
            return Err(AdmissionError::TooLarge { limit });
        }
        if holds_complete_value(&buf) {
            return Ok(buf);
        }
    }
}

/// True once more input cannot change the decode outcome.
fn holds_complete_value(buf: &[u8]) -> bool {
    match serde_json::from_slice::<IgnoredAny>(buf) {
        Ok(_) => true,
        Err(e) => !e.is_eof(),
    }
}

/// Withdraws a registered pending record unless admission got as far as
/// spawning its scheduler task.
struct PendingGuard<'a> {
    ledger: &'a Ledger,
    flight: Arc<str>,
    armed: bool,
}

impl<'a> PendingGuard<'a> {
    fn new(ledger: &'a Ledger, flight: Arc<str>) -> Self {
        Self {
            ledger,
            flight,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.ledger.withdraw(&self.flight);
        }
    }
}

/// Awaits an admission step, turning a panic into [`AdmissionError::Internal`].
async fn catch_admission<F>(step: F) -> Result<Reply, AdmissionError>
where
    F: Future<Output = Result<Reply, AdmissionError>>,
{
    match AssertUnwindSafe(step).catch_unwind().await {
        Ok(res) => res,
        Err(panic) => {
            let reason = panic_message(&*panic);
            tracing::error!(%reason, "admission panicked");
            Err(AdmissionError::Internal { reason })
        }
    }
}

/// Serves one admission connection end to end.
pub(crate) async fn handle_connection<S>(tower: Arc<Tower>, mut stream: S, peer: SocketAddr)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let cfg = tower.config();
    let reply = match read_request(&mut stream, cfg.request_limit(), cfg.read_timeout()).await {
        Ok(bytes) => match FlightRequest::decode(&bytes) {
            Ok(req) => tower.admit(req).await,
            Err(err) => tower.reject(None, &err),
        },
        Err(err) => tower.reject(None, &err),
    };

    let bytes = match reply.encode() {
        Ok(b) => b,
        Err(e) => {
            tracing::error!(%peer, error = %e, "reply encoding failed");
            return;
        }
    };
    if let Err(e) = stream.write_all(&bytes).await {
        tracing::debug!(%peer, error = %e, status = reply.status(), "requester went away before reply");
        return;
    }
    let _ = stream.shutdown().await;
}

impl Tower {
    /// Admits one decoded request and returns the reply for the requester.
    ///
    /// On `authorized` and `en_espera` the flight's scheduler task is already
    /// running when this returns.
    pub async fn admit(&self, req: FlightRequest) -> Reply {
        match catch_admission(self.try_admit(&req)).await {
            Ok(reply) => reply,
            Err(err) => self.reject(Some(&req.id), &err),
        }
    }

    async fn try_admit(&self, req: &FlightRequest) -> Result<Reply, AdmissionError> {
        if self.runtime_token.is_cancelled() || self.pool.is_closed() {
            return Err(AdmissionError::Closed);
        }

        let flight: Arc<str> = Arc::from(req.id.as_str());
        let kind = req.kind;
        self.ledger.register(OperationRecord::pending(
            Arc::clone(&flight),
            kind,
            req.carrier_or_default(),
            Instant::now(),
        ))?;
        let pending = PendingGuard::new(&self.ledger, Arc::clone(&flight));

        let claim = self
            .pool
            .claim(Arc::clone(&flight))
            .map_err(|_| AdmissionError::Closed)?;

        let (start, reply, event) = match claim {
            Claim::Granted(slot) => {
                let runway = self.ledger.next_runway_label(self.pool.capacity());
                (
                    Start::Granted { slot, runway },
                    Reply::authorized(kind, runway),
                    Event::new(EventKind::FlightAdmitted).with_runway(runway),
                )
            }
            Claim::Queued(waiter) => (
                Start::Queued(waiter),
                Reply::queued(),
                Event::new(EventKind::FlightQueued),
            ),
        };

        // Published before the task starts so logs read admitted → claimed.
        self.bus.publish(
            event
                .with_flight(Arc::clone(&flight))
                .with_operation(kind),
        );

        let actor = FlightActor {
            flight: Arc::clone(&flight),
            kind,
            hold: self.cfg.operation_duration(kind),
            start,
            ledger: Arc::clone(&self.ledger),
            pool: Arc::clone(&self.pool),
            bus: self.bus.clone(),
        };
        self.registry.spawn(actor).await?;
        pending.disarm();
        Ok(reply)
    }

    /// Publishes a `FlightRejected` event and maps the error to its reply.
    pub(crate) fn reject(&self, flight: Option<&str>, err: &AdmissionError) -> Reply {
        tracing::debug!(flight = flight.unwrap_or("-"), error = %err, label = err.as_label(), "request turned away");
        let mut ev = Event::new(EventKind::FlightRejected).with_reason(err.to_string());
        if let Some(id) = flight {
            ev = ev.with_flight(id);
        }
        self.bus.publish(ev);
        Reply::from(err)
    }
}
