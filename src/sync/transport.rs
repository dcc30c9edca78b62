//! Seam for the streaming transport.
//!
//! The engine assumes an ordered, complete text-frame transport (a
//! websocket in practice) but never touches sockets itself; hosts and tests
//! supply implementations of these traits.

use thiserror::Error;

/// Close information delivered by the transport.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CloseFrame {
    pub code: u16,
    pub was_clean: bool,
}

impl CloseFrame {
    pub const NORMAL_CLOSURE: u16 = 1000;

    /// A clean code-1000 close is expected closure: no reconnect. Anything
    /// else is abnormal and triggers backoff-reconnect.
    pub fn is_deliberate(self) -> bool {
        self.was_clean && self.code == Self::NORMAL_CLOSURE
    }
}

/// One event from an open connection.
#[derive(Clone, Debug, PartialEq)]
pub enum ConnectionEvent {
    /// A complete text frame.
    Text(String),
    /// The connection is gone; no further events will arrive.
    Closed(CloseFrame),
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("receive failed: {0}")]
    Receive(String),
}

/// Dials one connection per call; called again after every close until the
/// owning view shuts down.
pub trait StreamTransport: Send + 'static {
    type Conn: StreamConnection;

    fn connect(&mut self) -> Result<Self::Conn, TransportError>;
}

/// An open connection delivering frames in order.
pub trait StreamConnection: Send {
    /// Block until the next event. Implementations must yield `Closed` (or
    /// an error) promptly once the peer or owner shuts the socket; the
    /// subscriber's reader thread ends only when this returns.
    fn next_event(&mut self) -> Result<ConnectionEvent, TransportError>;
}
