//! # Admission reply: tower → requester.
//!
//! ```text
//! { "status": "authorized", "pista": 1, "mensaje": "landing authorized on runway 1" }
//! { "status": "en_espera", "mensaje": "all runways busy; hold for authorization" }
//! { "status": "rechazado", "mensaje": "flight id is missing or empty" }
//! { "status": "error", "mensaje": "tower is shutting down" }
//! ```

use serde::{Deserialize, Serialize};

use crate::error::AdmissionError;
use crate::ledger::OperationKind;

/// One reply per admission connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum Reply {
    /// A runway slot was free at admission time.
    #[serde(rename = "authorized")]
    Authorized {
        #[serde(rename = "pista")]
        runway: u32,
        #[serde(rename = "mensaje")]
        message: String,
    },
    /// All runways busy; the tower will authorize later without a new request.
    #[serde(rename = "en_espera")]
    Queued {
        #[serde(rename = "mensaje")]
        message: String,
    },
    /// Malformed or unacceptable request; nothing was registered.
    #[serde(rename = "rechazado")]
    Rejected {
        #[serde(rename = "mensaje")]
        message: String,
    },
    /// Tower-side fault while handling a well-formed request.
    #[serde(rename = "error")]
    Error {
        #[serde(rename = "mensaje")]
        message: String,
    },
}

impl Reply {
    pub fn authorized(kind: OperationKind, runway: u32) -> Self {
        Reply::Authorized {
            runway,
            message: format!("{kind} authorized on runway {runway}"),
        }
    }

    pub fn queued() -> Self {
        Reply::Queued {
            message: "all runways busy; hold for authorization".to_string(),
        }
    }

    /// Wire status literal.
    pub fn status(&self) -> &'static str {
        match self {
            Reply::Authorized { .. } => "authorized",
            Reply::Queued { .. } => "en_espera",
            Reply::Rejected { .. } => "rechazado",
            Reply::Error { .. } => "error",
        }
    }

    pub fn runway(&self) -> Option<u32> {
        match self {
            Reply::Authorized { runway, .. } => Some(*runway),
            _ => None,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Reply::Authorized { message, .. }
            | Reply::Queued { message }
            | Reply::Rejected { message }
            | Reply::Error { message } => message,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

impl From<&AdmissionError> for Reply {
    fn from(err: &AdmissionError) -> Self {
        if err.is_rejection() {
            Reply::Rejected {
                message: err.to_string(),
            }
        } else {
            Reply::Error {
                message: err.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorized_wire_shape() {
        let bytes = Reply::authorized(OperationKind::Landing, 2).encode().unwrap();
        let v: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(v["status"], "authorized");
        assert_eq!(v["pista"], 2);
        assert_eq!(v["mensaje"], "landing authorized on runway 2");
    }

    #[test]
    fn test_queued_has_no_runway() {
        let bytes = Reply::queued().encode().unwrap();
        let v: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(v["status"], "en_espera");
        assert!(v.get("pista").is_none());
        assert_eq!(Reply::decode(&bytes).unwrap().runway(), None);
    }

    #[test]
    fn test_admission_errors_map_to_status() {
        assert_eq!(Reply::from(&AdmissionError::MissingId).status(), "rechazado");
        assert_eq!(
            Reply::from(&AdmissionError::Duplicate { id: "X".into() }).status(),
            "rechazado"
        );
        assert_eq!(Reply::from(&AdmissionError::Closed).status(), "error");
        assert_eq!(
            Reply::from(&AdmissionError::Internal {
                reason: "boom".into()
            })
            .message(),
            "internal tower fault: boom"
        );
    }
}
