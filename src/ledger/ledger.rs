//! # Operation ledger: pending, active and completed flights.
//!
//! The [`Ledger`] is the invariant-bearing state of the tower. Every access goes
//! through one short critical section; the lock is never held across `.await`.
//!
//! ## Invariants
//! - A flight id is present in at most one of `pending`, `active`, `completed`.
//! - Records only move forward: `pending → active → completed`.
//! - `operations_completed` and the cumulative wait only grow.
//!
//! ## Ownership
//! ```text
//! admission   ──register()──────────► pending
//! FlightActor ──activate()──► active ──complete()──► completed
//! Publisher   ──view() / drain_completed() / trim_completed()
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use crate::error::{AdmissionError, FlightError};

use super::record::{FlightState, OperationRecord};

/// Lifetime aggregate statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Stats {
    /// Completed operations since the tower started.
    pub operations_completed: u64,
    /// Sum of all wait durations, in seconds.
    pub total_wait_secs: f64,
}

impl Stats {
    /// Average wait in seconds (`0.0` before the first completion).
    pub fn average_wait_secs(&self) -> f64 {
        if self.operations_completed == 0 {
            0.0
        } else {
            self.total_wait_secs / self.operations_completed as f64
        }
    }
}

/// Point-in-time copy of the ledger, ordered by flight id.
#[derive(Debug, Clone, Default)]
pub struct LedgerView {
    pub pending: BTreeMap<String, OperationRecord>,
    pub active: BTreeMap<String, OperationRecord>,
    pub completed: BTreeMap<String, OperationRecord>,
    pub stats: Stats,
}

#[derive(Default)]
struct LedgerState {
    pending: HashMap<Arc<str>, OperationRecord>,
    active: HashMap<Arc<str>, OperationRecord>,
    completed: HashMap<Arc<str>, OperationRecord>,
    stats: Stats,
}

impl LedgerState {
    fn locate(&self, id: &str) -> Option<FlightState> {
        if self.pending.contains_key(id) {
            Some(FlightState::Pending)
        } else if self.active.contains_key(id) {
            Some(FlightState::Active)
        } else if self.completed.contains_key(id) {
            Some(FlightState::Completed)
        } else {
            None
        }
    }
}

/// Shared record store for all flights.
pub struct Ledger {
    state: Mutex<LedgerState>,
    epoch: Instant,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    /// Creates an empty ledger; `epoch` is the reference for wire timestamps.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LedgerState::default()),
            epoch: Instant::now(),
        }
    }

    /// Instant the ledger was created.
    pub fn epoch(&self) -> Instant {
        self.epoch
    }

    /// Inserts a new pending record.
    ///
    /// Fails with [`AdmissionError::Duplicate`] if the id is already known in any state.
    pub fn register(&self, record: OperationRecord) -> Result<(), AdmissionError> {
        let mut st = self.state.lock();
        if st.locate(record.id()).is_some() {
            return Err(AdmissionError::Duplicate {
                id: record.id().to_string(),
            });
        }
        st.pending.insert(record.id_arc(), record);
        Ok(())
    }

    /// Removes a pending record that never got a scheduler task.
    pub fn withdraw(&self, id: &str) -> Option<OperationRecord> {
        self.state.lock().pending.remove(id)
    }

    /// Moves `id` from pending to active with the given runway label.
    pub fn activate(
        &self,
        id: &str,
        runway: u32,
        now: Instant,
    ) -> Result<OperationRecord, FlightError> {
        let mut st = self.state.lock();
        let Some(mut record) = st.pending.remove(id) else {
            return Err(FlightError::NotPending { id: id.to_string() });
        };
        record.mark_active(runway, now);
        st.active.insert(record.id_arc(), record.clone());
        Ok(record)
    }

    /// Moves `id` from active to completed and folds its wait into the stats.
    pub fn complete(&self, id: &str, now: Instant) -> Result<OperationRecord, FlightError> {
        let mut st = self.state.lock();
        let Some(mut record) = st.active.remove(id) else {
            return Err(FlightError::NotActive { id: id.to_string() });
        };
        record.mark_completed(now);
        st.stats.operations_completed += 1;
        st.stats.total_wait_secs += record
            .wait_duration()
            .map(|d| d.as_secs_f64())
            .unwrap_or_default();
        st.completed.insert(record.id_arc(), record.clone());
        Ok(record)
    }

    /// Drops a failed flight from `pending` or `active`. Completed records are kept.
    pub fn abandon(&self, id: &str) -> Option<OperationRecord> {
        let mut st = self.state.lock();
        st.pending.remove(id).or_else(|| st.active.remove(id))
    }

    /// Removes the given completed records (after a successful publish).
    ///
    /// Returns how many were actually removed.
    pub fn drain_completed<'a, I>(&self, ids: I) -> usize
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut st = self.state.lock();
        ids.into_iter()
            .filter(|id| st.completed.remove(*id).is_some())
            .count()
    }

    /// Keeps at most `keep` completed records, dropping the oldest by `ended_at`.
    ///
    /// Returns how many were dropped. Stats are not affected.
    pub fn trim_completed(&self, keep: usize) -> usize {
        let mut st = self.state.lock();
        let excess = st.completed.len().saturating_sub(keep);
        if excess == 0 {
            return 0;
        }
        let mut by_age: Vec<(Option<Instant>, Arc<str>)> = st
            .completed
            .values()
            .map(|r| (r.ended_at(), r.id_arc()))
            .collect();
        by_age.sort_unstable();
        for (_, id) in by_age.into_iter().take(excess) {
            st.completed.remove(&id);
        }
        excess
    }

    /// Round-robin display label: `(operations_completed mod capacity) + 1`.
    pub fn next_runway_label(&self, capacity: u32) -> u32 {
        let capacity = u64::from(capacity.max(1));
        let completed = self.state.lock().stats.operations_completed;
        (completed % capacity) as u32 + 1
    }

    /// State of `id`, if it is known.
    pub fn state_of(&self, id: &str) -> Option<FlightState> {
        self.state.lock().locate(id)
    }

    /// Copy of the record for `id`, whatever its state.
    pub fn get(&self, id: &str) -> Option<OperationRecord> {
        let st = self.state.lock();
        st.pending
            .get(id)
            .or_else(|| st.active.get(id))
            .or_else(|| st.completed.get(id))
            .cloned()
    }

    pub fn pending_len(&self) -> usize {
        self.state.lock().pending.len()
    }

    pub fn active_len(&self) -> usize {
        self.state.lock().active.len()
    }

    pub fn completed_len(&self) -> usize {
        self.state.lock().completed.len()
    }

    pub fn stats(&self) -> Stats {
        self.state.lock().stats
    }

    /// Consistent copy of all three maps and the stats, taken under one lock.
    pub fn view(&self) -> LedgerView {
        let st = self.state.lock();
        let copy = |m: &HashMap<Arc<str>, OperationRecord>| {
            m.iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect::<BTreeMap<_, _>>()
        };
        LedgerView {
            pending: copy(&st.pending),
            active: copy(&st.active),
            completed: copy(&st.completed),
            stats: st.stats,
        }
    }
}
