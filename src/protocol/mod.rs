//! # Wire protocols.
//!
//! - requester ⇄ tower: one [`FlightRequest`] in, one [`Reply`] out, unframed JSON
//! - tower → observer: one length-prefixed [`Snapshot`] per connection

mod reply;
mod request;
mod snapshot;

pub use reply::Reply;
pub use request::{FlightRequest, UNKNOWN_CARRIER};
pub use snapshot::{MAX_FRAME_BYTES, RecordView, Snapshot, StatsView, snapshot_codec};
