//! # Operation ledger.
//!
//! - [`OperationRecord`]: one flight's timing, state and runway label
//! - [`Ledger`]: the pending/active/completed maps plus lifetime [`Stats`]

#[allow(clippy::module_inception)]
mod ledger;
mod record;

pub use ledger::{Ledger, LedgerView, Stats};
pub use record::{FlightState, OperationKind, OperationRecord};
