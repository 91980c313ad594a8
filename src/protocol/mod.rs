//! Wire protocol shared by both live transports.
//!
//! # Data Flow
//! ```text
//! WebSocket text frame ─┐
//!                       ├─→ decode_command() → ClientCommand → relay
//! TCP line (JSON + \n) ─┘
//!
//! relay → ServerEvent → serialize once → fan out to every subscriber
//! ```
//!
//! # Design Decisions
//! - One codec for both transports; framing (WS message vs newline) is
//!   the only transport-specific part.
//! - Events and commands are internally tagged so a frame is
//!   self-describing.

use serde::{Deserialize, Serialize};

use crate::errors::RelayError;
use crate::model::{IssueCommand, Warning};

/// Inbound command from a subscriber, on either transport.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "command", rename_all = "lowercase")]
pub enum ClientCommand {
    /// Issue (or re-issue) a warning.
    Issue(IssueCommand),
    /// Manually expire a warning by id.
    Expire { id: String },
}

/// Outbound event delivered to subscribers, on either transport.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum ServerEvent {
    /// One-time full active-set snapshot, sent on connect before any
    /// other event.
    Bootstrap { warnings: Vec<Warning> },
    /// A warning was issued or re-issued.
    Issue { warning: Warning },
    /// A warning expired (timer or manual).
    Expire { id: String },
    /// Validation report, delivered only to the originating caller.
    Error { message: String },
}

/// Parse a raw frame into a command.
///
/// Frames that do not decode are `MalformedMessage`: logged and dropped
/// by the caller, never surfaced to other subscribers.
pub fn decode_command(raw: &str) -> Result<ClientCommand, RelayError> {
    Ok(serde_json::from_str(raw)?)
}
