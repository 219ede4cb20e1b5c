//! # Runway pool: counting resource with a FIFO waiter queue.
//!
//! The pool is an anonymous counter of `capacity` runway slots. Claiming is a
//! single compare-and-increment under the pool lock, so two flights can never
//! both observe the last free slot and both take it.
//!
//! ## Hand-off
//! ```text
//! claim() ──► in_use < capacity && no waiters ──► Claim::Granted(RunwaySlot)
//!         └─► otherwise ──────────────────────────► Claim::Queued(SlotWaiter)   (FIFO)
//!
//! drop(RunwaySlot) ──► waiter queued? ──yes──► slot handed to the oldest waiter (in_use unchanged)
//!                                    └─no───► in_use -= 1
//! ```
//!
//! ## Rules
//! - `0 <= in_use <= capacity` at all times.
//! - A released slot wakes **exactly one** waiter, oldest first.
//! - Waiters that went away (dropped [`SlotWaiter`]) are skipped.
//! - A [`RunwaySlot`] is released on every exit path of its owner, including panics.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::error::FlightError;

struct Waiter {
    flight: Arc<str>,
    tx: oneshot::Sender<RunwaySlot>,
}

struct PoolState {
    in_use: u32,
    waiters: VecDeque<Waiter>,
    closed: bool,
}

/// Fixed-capacity pool of runway slots.
pub struct RunwayPool {
    capacity: u32,
    state: Mutex<PoolState>,
}

/// Result of [`RunwayPool::claim`].
pub enum Claim {
    /// A slot was free and is now held by the caller.
    Granted(RunwaySlot),
    /// No slot was free; the caller is queued.
    Queued(SlotWaiter),
}

impl RunwayPool {
    /// Creates a pool with `capacity` slots (clamped to at least 1).
    pub fn new(capacity: u32) -> Arc<Self> {
        Arc::new(Self {
            capacity: capacity.max(1),
            state: Mutex::new(PoolState {
                in_use: 0,
                waiters: VecDeque::new(),
                closed: false,
            }),
        })
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Slots currently held.
    pub fn in_use(&self) -> u32 {
        self.state.lock().in_use
    }

    /// Slots currently free.
    pub fn available(&self) -> u32 {
        self.capacity - self.in_use()
    }

    /// Flights queued for a slot, oldest first. Includes waiters that already went away.
    pub fn waiting(&self) -> Vec<Arc<str>> {
        self.state
            .lock()
            .waiters
            .iter()
            .map(|w| Arc::clone(&w.flight))
            .collect()
    }

    /// Atomically claims a slot or joins the FIFO queue.
    ///
    /// Fails with [`FlightError::PoolClosed`] once [`close`](Self::close) was called.
    pub fn claim(self: &Arc<Self>, flight: impl Into<Arc<str>>) -> Result<Claim, FlightError> {
        let mut st = self.state.lock();
        if st.closed {
            return Err(FlightError::PoolClosed);
        }
        if st.in_use < self.capacity && st.waiters.is_empty() {
            st.in_use += 1;
            return Ok(Claim::Granted(RunwaySlot::new(Arc::clone(self))));
        }

        let (tx, rx) = oneshot::channel();
        st.waiters.push_back(Waiter {
            flight: flight.into(),
            tx,
        });
        Ok(Claim::Queued(SlotWaiter { rx }))
    }

    /// Stops handing out slots and drops all waiters (they observe `PoolClosed`).
    ///
    /// Slots already held stay valid until dropped.
    pub fn close(&self) {
        let waiters = {
            let mut st = self.state.lock();
            st.closed = true;
            std::mem::take(&mut st.waiters)
        };
        drop(waiters);
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Returns one slot: hand it to the oldest live waiter, or free it.
    fn release(self: Arc<Self>) {
        loop {
            let waiter = {
                let mut st = self.state.lock();
                match st.waiters.pop_front() {
                    Some(w) => w,
                    None => {
                        st.in_use = st.in_use.saturating_sub(1);
                        return;
                    }
                }
            };

            // Lock released: a failed send drops nothing that re-enters `release`.
            match waiter.tx.send(RunwaySlot::new(Arc::clone(&self))) {
                Ok(()) => return,
                Err(mut orphan) => {
                    orphan.pool = None;
                }
            }
        }
    }
}

/// One held runway slot. Dropping it releases the slot.
#[must_use = "dropping a RunwaySlot releases the runway immediately"]
pub struct RunwaySlot {
    pool: Option<Arc<RunwayPool>>,
}

impl RunwaySlot {
    fn new(pool: Arc<RunwayPool>) -> Self {
        Self { pool: Some(pool) }
    }
}

impl Drop for RunwaySlot {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.take() {
            pool.release();
        }
    }
}

impl std::fmt::Debug for RunwaySlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunwaySlot")
            .field("held", &self.pool.is_some())
            .finish()
    }
}

/// Queued claim; resolves when a slot is handed over.
pub struct SlotWaiter {
    rx: oneshot::Receiver<RunwaySlot>,
}

impl SlotWaiter {
    /// Waits for the hand-off. Cancel-safe: dropping the future gives up the place in line.
    pub async fn wait(self) -> Result<RunwaySlot, FlightError> {
        self.rx.await.map_err(|_| FlightError::PoolClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn granted(c: Claim) -> RunwaySlot {
        match c {
            Claim::Granted(s) => s,
            Claim::Queued(_) => panic!("expected a granted slot"),
        }
    }

    fn queued(c: Claim) -> SlotWaiter {
        match c {
            Claim::Queued(w) => w,
            Claim::Granted(_) => panic!("expected to be queued"),
        }
    }

    #[test]
    fn test_claims_up_to_capacity_then_queues() {
        let pool = RunwayPool::new(2);
        let a = granted(pool.claim("A").unwrap());
        let _b = granted(pool.claim("B").unwrap());
        assert_eq!(pool.in_use(), 2);
        assert_eq!(pool.available(), 0);

        let _c = queued(pool.claim("C").unwrap());
        assert_eq!(pool.waiting().len(), 1);

        drop(a);
        // Handed to C: still fully in use, nobody waiting.
        assert_eq!(pool.in_use(), 2);
        assert!(pool.waiting().is_empty());
    }

    #[test]
    fn test_release_without_waiters_frees_slot() {
        let pool = RunwayPool::new(1);
        let a = granted(pool.claim("A").unwrap());
        drop(a);
        assert_eq!(pool.in_use(), 0);
        let _b = granted(pool.claim("B").unwrap());
    }

    #[tokio::test]
    async fn test_waiters_are_served_fifo() {
        let pool = RunwayPool::new(1);
        let first = granted(pool.claim("A").unwrap());
        let w1 = queued(pool.claim("B").unwrap());
        let w2 = queued(pool.claim("C").unwrap());

        drop(first);
        let b = tokio::time::timeout(Duration::from_secs(1), w1.wait())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(pool.waiting(), vec![Arc::<str>::from("C")]);

        drop(b);
        let _c = tokio::time::timeout(Duration::from_secs(1), w2.wait())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(pool.in_use(), 1);
    }

    #[test]
    fn test_new_claim_does_not_overtake_queue() {
        let pool = RunwayPool::new(1);
        let a = granted(pool.claim("A").unwrap());
        let _w = queued(pool.claim("B").unwrap());
        drop(a);
        // Slot went to B; a fresh claim must queue.
        let _late = queued(pool.claim("C").unwrap());
        assert_eq!(pool.in_use(), 1);
    }

    #[test]
    fn test_dropped_waiter_is_skipped() {
        let pool = RunwayPool::new(1);
        let a = granted(pool.claim("A").unwrap());
        let gone = queued(pool.claim("B").unwrap());
        drop(gone);

        drop(a);
        assert_eq!(pool.in_use(), 0);
        assert!(pool.waiting().is_empty());
    }

    #[tokio::test]
    async fn test_close_fails_waiters_and_new_claims() {
        let pool = RunwayPool::new(1);
        let held = granted(pool.claim("A").unwrap());
        let w = queued(pool.claim("B").unwrap());
        assert!(!pool.is_closed());

        pool.close();
        assert!(pool.is_closed());
        assert_eq!(w.wait().await.unwrap_err(), FlightError::PoolClosed);
        assert!(matches!(pool.claim("C"), Err(FlightError::PoolClosed)));

        drop(held);
        assert_eq!(pool.in_use(), 0);
    }

    #[tokio::test]
    async fn test_slot_released_when_holder_panics() {
        let pool = RunwayPool::new(1);
        let slot = granted(pool.claim("A").unwrap());

        let res = tokio::spawn(async move {
            let _slot = slot;
            panic!("operation fault");
        })
        .await;

        assert!(res.is_err());
        assert_eq!(pool.in_use(), 0);
    }
}
