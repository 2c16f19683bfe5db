use std::fmt;
use thiserror::Error;

pub mod mock;
pub mod websocket;

pub use websocket::{Connection, ConnectionHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    /// Terminal. A failed connection is never reopened.
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureCause {
    Timeout,
    Closed,
    Error(String),
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureCause::Timeout => f.write_str("connection timed out"),
            FailureCause::Closed => f.write_str("connection closed"),
            FailureCause::Error(reason) => write!(f, "connection error: {reason}"),
        }
    }
}

/// Lifecycle and data events delivered to the connection's subscriber in
/// the order they happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    Opened,
    Message(String),
    Closed,
    Errored(String),
    TimedOut,
    /// Emitted once per connection, by whichever failure trigger fires first.
    Failed(FailureCause),
}

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("not connected to the sandbox server")]
    NotConnected,
}

/// Outbound half of a connection as seen by the session controller.
pub trait FrameSink {
    fn send_frame(&mut self, frame: String) -> Result<(), ConnectionError>;
}
