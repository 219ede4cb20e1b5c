//! # Flight request: requester → tower.
//!
//! ```text
//! { "id": "IB1234", "type": "landing", "carrier": "IB", "timestamp": 1718000000.5 }
//! ```
//!
//! Older requesters send `tipo` / `aerolinea` and the literals `aterrizaje` /
//! `despegue`; both spellings decode to the same request.

use serde::{Deserialize, Serialize};

use crate::error::AdmissionError;
use crate::ledger::OperationKind;

/// Carrier shown when the requester did not send one.
pub const UNKNOWN_CARRIER: &str = "N/A";

/// Validated operation request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlightRequest {
    /// Caller-supplied flight id (non-empty).
    pub id: String,
    /// Requested operation.
    #[serde(rename = "type")]
    pub kind: OperationKind,
    /// Display-only carrier tag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub carrier: Option<String>,
    /// Sender clock, informational only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
}

/// Wire shape before validation: every field optional so we can say what is missing.
#[derive(Deserialize)]
struct RawRequest {
    #[serde(default)]
    id: Option<String>,
    #[serde(default, rename = "type", alias = "tipo")]
    kind: Option<String>,
    #[serde(default, alias = "aerolinea")]
    carrier: Option<String>,
    #[serde(default)]
    timestamp: Option<f64>,
}

impl FlightRequest {
    pub fn new(id: impl Into<String>, kind: OperationKind) -> Self {
        Self {
            id: id.into(),
            kind,
            carrier: None,
            timestamp: None,
        }
    }

    pub fn with_carrier(mut self, carrier: impl Into<String>) -> Self {
        self.carrier = Some(carrier.into());
        self
    }

    /// Carrier tag, or [`UNKNOWN_CARRIER`].
    pub fn carrier_or_default(&self) -> &str {
        self.carrier.as_deref().unwrap_or(UNKNOWN_CARRIER)
    }

    /// Decodes and validates one request payload.
    ///
    /// # Errors
    /// - [`AdmissionError::Decode`] for non-UTF-8 / non-JSON / wrongly typed payloads
    /// - [`AdmissionError::MissingId`] when `id` is absent or blank
    /// - [`AdmissionError::InvalidKind`] when `type` is absent or unknown
    pub fn decode(bytes: &[u8]) -> Result<Self, AdmissionError> {
        let raw: RawRequest =
            serde_json::from_slice(bytes).map_err(|e| AdmissionError::Decode {
                reason: e.to_string(),
            })?;

        let id = raw
            .id
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or(AdmissionError::MissingId)?;

        let kind_raw = raw.kind.unwrap_or_default();
        let kind = kind_raw
            .parse::<OperationKind>()
            .map_err(|()| AdmissionError::InvalidKind { value: kind_raw })?;

        Ok(Self {
            id,
            kind,
            carrier: raw.carrier.filter(|c| !c.trim().is_empty()),
            timestamp: raw.timestamp,
        })
    }

    /// Serializes the request as sent by a requester.
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_canonical_request() {
        let req = FlightRequest::decode(
            br#"{"id":"IB1234","type":"landing","carrier":"IB","timestamp":12.5}"#,
        )
        .unwrap();
        assert_eq!(req.id, "IB1234");
        assert_eq!(req.kind, OperationKind::Landing);
        assert_eq!(req.carrier_or_default(), "IB");
        assert_eq!(req.timestamp, Some(12.5));
    }

    #[test]
    fn test_decode_legacy_field_names() {
        let req =
            FlightRequest::decode(br#"{"id":"LH42","tipo":"despegue","aerolinea":"LH"}"#).unwrap();
        assert_eq!(req.kind, OperationKind::Takeoff);
        assert_eq!(req.carrier.as_deref(), Some("LH"));
    }

    #[test]
    fn test_missing_carrier_defaults() {
        let req = FlightRequest::decode(br#"{"id":"AF1","type":"takeoff"}"#).unwrap();
        assert_eq!(req.carrier_or_default(), UNKNOWN_CARRIER);
    }

    #[test]
    fn test_missing_or_blank_id_rejected() {
        assert_eq!(
            FlightRequest::decode(br#"{"type":"landing"}"#).unwrap_err(),
            AdmissionError::MissingId
        );
        assert_eq!(
            FlightRequest::decode(br#"{"id":"  ","type":"landing"}"#).unwrap_err(),
            AdmissionError::MissingId
        );
    }

    #[test]
    fn test_invalid_kind_rejected() {
        assert_eq!(
            FlightRequest::decode(br#"{"id":"BA1","type":"taxi"}"#).unwrap_err(),
            AdmissionError::InvalidKind {
                value: "taxi".into()
            }
        );
        assert!(matches!(
            FlightRequest::decode(br#"{"id":"BA1"}"#),
            Err(AdmissionError::InvalidKind { .. })
        ));
    }

    #[test]
    fn test_garbage_is_decode_error() {
        assert!(matches!(
            FlightRequest::decode(b"\xff\xfe not json"),
            Err(AdmissionError::Decode { .. })
        ));
        assert!(matches!(
            FlightRequest::decode(br#"{"id":7,"type":"landing"}"#),
            Err(AdmissionError::Decode { .. })
        ));
        assert!(matches!(
            FlightRequest::decode(b"[1,2,3]"),
            Err(AdmissionError::Decode { .. })
        ));
    }

    #[test]
    fn test_encode_uses_wire_names() {
        let bytes = FlightRequest::new("UA7", OperationKind::Takeoff)
            .with_carrier("UA")
            .encode()
            .unwrap();
        let v: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(v["type"], "takeoff");
        assert_eq!(v["carrier"], "UA");
        assert!(v.get("timestamp").is_none());
    }
}
