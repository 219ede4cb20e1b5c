//! # Snapshot: tower → observer.
//!
//! Pushed once per publisher tick over a fresh connection, framed as a 4-byte
//! big-endian length followed by the JSON body:
//!
//! ```text
//! ┌──────────────┬────────────────────────────────────────────┐
//! │ len: u32 (BE)│ {"timestamp":"14:03:27","pistas_disponibles":1, ...} │
//! └──────────────┴────────────────────────────────────────────┘
//! ```
//!
//! Record times are seconds since the tower started.

use std::collections::BTreeMap;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio_util::codec::LengthDelimitedCodec;

use crate::ledger::{FlightState, LedgerView, OperationKind, OperationRecord, Stats};

/// Largest frame an observer is expected to accept.
pub const MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

/// Codec for the observer channel: `u32` big-endian length prefix.
pub fn snapshot_codec() -> LengthDelimitedCodec {
    LengthDelimitedCodec::builder()
        .length_field_length(4)
        .big_endian()
        .max_frame_length(MAX_FRAME_BYTES)
        .new_codec()
}

/// Point-in-time state pushed to the observer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Local clock, `HH:MM:SS`.
    pub timestamp: String,
    #[serde(rename = "pistas_disponibles")]
    pub runways_free: u32,
    #[serde(rename = "pistas_totales")]
    pub runways_total: u32,
    #[serde(rename = "vuelos_pendientes")]
    pub pending: BTreeMap<String, RecordView>,
    #[serde(rename = "vuelos_activos")]
    pub active: BTreeMap<String, RecordView>,
    #[serde(rename = "vuelos_completados")]
    pub completed: BTreeMap<String, RecordView>,
    #[serde(rename = "estadisticas")]
    pub stats: StatsView,
}

/// Aggregate statistics as sent on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatsView {
    /// Average wait in seconds.
    #[serde(rename = "tiempo_espera_promedio")]
    pub average_wait: f64,
    #[serde(rename = "operaciones_completadas")]
    pub operations_completed: u64,
}

impl From<Stats> for StatsView {
    fn from(s: Stats) -> Self {
        Self {
            average_wait: s.average_wait_secs(),
            operations_completed: s.operations_completed,
        }
    }
}

/// One record as sent on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordView {
    #[serde(rename = "tipo")]
    pub kind: OperationKind,
    #[serde(rename = "estado")]
    pub state: FlightState,
    #[serde(rename = "aerolinea")]
    pub carrier: String,
    #[serde(rename = "hora_solicitud")]
    pub requested_at: f64,
    #[serde(rename = "hora_inicio", default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<f64>,
    #[serde(rename = "hora_fin", default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<f64>,
    #[serde(rename = "pista", default, skip_serializing_if = "Option::is_none")]
    pub runway: Option<u32>,
    /// Seconds spent pending.
    #[serde(rename = "tiempo_espera", default, skip_serializing_if = "Option::is_none")]
    pub wait: Option<f64>,
    /// Seconds spent holding the runway.
    #[serde(rename = "duracion", default, skip_serializing_if = "Option::is_none")]
    pub service: Option<f64>,
}

impl RecordView {
    pub fn from_record(rec: &OperationRecord, epoch: Instant) -> Self {
        let since = |t: Instant| t.saturating_duration_since(epoch).as_secs_f64();
        Self {
            kind: rec.kind(),
            state: rec.state(),
            carrier: rec.carrier().to_string(),
            requested_at: since(rec.requested_at()),
            started_at: rec.started_at().map(since),
            ended_at: rec.ended_at().map(since),
            runway: rec.runway(),
            wait: rec.wait_duration().map(|d| d.as_secs_f64()),
            service: rec.service_duration().map(|d| d.as_secs_f64()),
        }
    }
}

impl Snapshot {
    /// Builds a snapshot from a ledger view and the pool occupancy.
    pub fn from_view(
        view: &LedgerView,
        epoch: Instant,
        capacity: u32,
        in_use: u32,
        timestamp: impl Into<String>,
    ) -> Self {
        let map = |m: &BTreeMap<String, OperationRecord>| {
            m.iter()
                .map(|(id, rec)| (id.clone(), RecordView::from_record(rec, epoch)))
                .collect()
        };
        Self {
            timestamp: timestamp.into(),
            runways_free: capacity.saturating_sub(in_use),
            runways_total: capacity,
            pending: map(&view.pending),
            active: map(&view.active),
            completed: map(&view.completed),
            stats: view.stats.into(),
        }
    }

    /// Local wall clock in the wire format.
    pub fn local_timestamp() -> String {
        chrono::Local::now().format("%H:%M:%S").to_string()
    }

    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}
