//! Line protocol spoken between a codebox client and the sandbox backend.
//!
//! A frame is `CODE~field~field...`. The first segment is a four letter
//! command code; the remaining segments are fields. Code text and captured
//! output travel base64 encoded, structured payloads travel as JSON.

pub mod encoding;
pub mod listing;
pub mod messages;
pub mod status;
pub mod wire;

pub use listing::{ListingEntry, NodeKind};
pub use messages::{ClientCommand, CreateRequest, ProtocolError, SaveRequest, ServerMessage};
pub use status::{ErrorCode, ReturnCode};
pub use wire::{WireMessage, FIELD_SEPARATOR};
