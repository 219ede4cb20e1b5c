//! Error types used by the tower runtime, the admission path and flight tasks.
//!
//! This module defines the error enums of the crate:
//!
//! - [`RuntimeError`]: errors raised by the tower runtime itself (bind, shutdown).
//! - [`AdmissionError`]: why a request was turned away at the admission boundary.
//! - [`FlightError`]: failures of an individual flight's scheduler task.
//! - [`PublishError`]: failures while pushing a snapshot to the observer.
//! - [`ConfigError`]: invalid configuration values read from the environment.
//!
//! Each type provides `as_label` (stable snake_case for logs/metrics).

use std::any::Any;
use std::time::Duration;
use thiserror::Error;

/// # Errors produced by the tower runtime.
///
/// These represent failures in the orchestration itself, such as the
/// admission listener failing to bind or shutdown exceeding its grace period.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// The admission listener could not be bound.
    #[error("failed to bind admission listener on {addr}: {source}")]
    Bind {
        /// Address that was requested.
        addr: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Shutdown grace period was exceeded; some flights were still in progress.
    #[error("shutdown timeout {grace:?} exceeded; stuck: {stuck:?}; forcing termination")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Flights whose tasks did not stop in time.
        stuck: Vec<String>,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use towerctl::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5), stuck: vec![] };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::Bind { .. } => "runtime_bind_failed",
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
        }
    }
}

/// # Errors produced at the admission boundary.
///
/// Most variants describe a malformed or unacceptable request and map to a
/// `rechazado` reply. [`AdmissionError::Closed`] and [`AdmissionError::Internal`]
/// are tower-side faults and map to an `error` reply.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdmissionError {
    /// Payload is not valid UTF-8 JSON of the expected shape.
    #[error("invalid request format: {reason}")]
    Decode {
        /// Decoder message.
        reason: String,
    },

    /// `id` field missing or empty.
    #[error("flight id is missing or empty")]
    MissingId,

    /// `type` field missing or not one of the operation literals.
    #[error("invalid operation type {value:?}; expected landing or takeoff")]
    InvalidKind {
        /// Raw value received (empty when absent).
        value: String,
    },

    /// Request exceeded the configured size limit.
    #[error("request exceeds {limit} bytes")]
    TooLarge {
        /// Configured limit in bytes.
        limit: usize,
    },

    /// Request was not fully received in time.
    #[error("request not received within {timeout:?}")]
    Timeout {
        /// Configured read timeout.
        timeout: Duration,
    },

    /// The flight id is already registered in the ledger.
    #[error("flight {id} is already registered")]
    Duplicate {
        /// Conflicting flight id.
        id: String,
    },

    /// The tower is shutting down and no longer admits flights.
    #[error("tower is shutting down")]
    Closed,

    /// Unexpected internal fault while handling a well-formed request.
    #[error("internal tower fault: {reason}")]
    Internal {
        /// Fault description.
        reason: String,
    },
}

impl AdmissionError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            AdmissionError::Decode { .. } => "admission_decode",
            AdmissionError::MissingId => "admission_missing_id",
            AdmissionError::InvalidKind { .. } => "admission_invalid_kind",
            AdmissionError::TooLarge { .. } => "admission_too_large",
            AdmissionError::Timeout { .. } => "admission_timeout",
            AdmissionError::Duplicate { .. } => "admission_duplicate",
            AdmissionError::Closed => "admission_closed",
            AdmissionError::Internal { .. } => "admission_internal",
        }
    }

    /// True when the request itself was at fault (`rechazado`), false for
    /// tower-side faults (`error`).
    ///
    /// # Example
    /// ```
    /// use towerctl::AdmissionError;
    ///
    /// assert!(AdmissionError::MissingId.is_rejection());
    /// assert!(!AdmissionError::Closed.is_rejection());
    /// ```
    pub fn is_rejection(&self) -> bool {
        !matches!(self, AdmissionError::Closed | AdmissionError::Internal { .. })
    }
}

/// # Errors produced by a flight's scheduler task.
///
/// A failing flight is reported and abandoned; it never takes the process down.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FlightError {
    /// The record was expected in `pending` but is no longer there.
    #[error("flight {id} is no longer pending")]
    NotPending {
        /// Flight id.
        id: String,
    },

    /// The record was expected in `active` but is no longer there.
    #[error("flight {id} is no longer active")]
    NotActive {
        /// Flight id.
        id: String,
    },

    /// The runway pool was closed while the flight waited for a slot.
    #[error("runway pool closed")]
    PoolClosed,

    /// Flight task was cancelled by shutdown.
    #[error("flight cancelled")]
    Canceled,
}

impl FlightError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use towerctl::FlightError;
    ///
    /// let err = FlightError::NotPending { id: "IB1234".into() };
    /// assert_eq!(err.as_label(), "flight_not_pending");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            FlightError::NotPending { .. } => "flight_not_pending",
            FlightError::NotActive { .. } => "flight_not_active",
            FlightError::PoolClosed => "flight_pool_closed",
            FlightError::Canceled => "flight_canceled",
        }
    }
}

/// # Errors produced while pushing a snapshot to the observer.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum PublishError {
    /// Observer could not be reached.
    #[error("observer unreachable at {addr}: {source}")]
    Connect {
        /// Observer address.
        addr: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Connection attempt timed out.
    #[error("observer connect timed out after {timeout:?}")]
    ConnectTimeout {
        /// Timeout that elapsed.
        timeout: Duration,
    },

    /// Snapshot could not be serialized.
    #[error("snapshot encoding failed: {0}")]
    Encode(#[from] serde_json::Error),

    /// Frame stays over the codec limit with no completed records left to drop.
    #[error("snapshot frame of {size} bytes exceeds {max}")]
    FrameTooLarge { size: usize, max: usize },

    /// Frame write failed after the connection was established.
    #[error("snapshot write failed: {0}")]
    Write(#[source] std::io::Error),
}

impl PublishError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            PublishError::Connect { .. } => "publish_connect",
            PublishError::ConnectTimeout { .. } => "publish_connect_timeout",
            PublishError::Encode(_) => "publish_encode",
            PublishError::FrameTooLarge { .. } => "publish_frame_too_large",
            PublishError::Write(_) => "publish_write",
        }
    }
}

/// # Errors produced while loading configuration.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable is present but cannot be parsed.
    #[error("invalid value for {var}: {value:?} ({reason})")]
    Invalid {
        /// Environment variable name.
        var: &'static str,
        /// Raw value.
        value: String,
        /// What was expected.
        reason: &'static str,
    },
}

/// Text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
