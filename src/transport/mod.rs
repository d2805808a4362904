//! Transport capability boundary.
//!
//! The engine consumes a small, non-blocking interface: enqueue a connect,
//! a join, or a channel line, and receive push-style [`TransportEvent`]s
//! over an mpsc channel. Everything underneath (sockets, registration,
//! reconnect mechanics) stays behind this boundary; [`irc`] is the stock
//! implementation.

pub mod irc;

use thiserror::Error;
use tokio::sync::mpsc;

/// Transport operation errors.
///
/// Operations are enqueue-only, so the only failure mode is a transport
/// whose I/O task has gone away.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport task is gone")]
    Closed,
}

/// Capability set the engine consumes. All methods enqueue and return
/// immediately.
pub trait Transport: Send + Sync {
    fn connect(&self) -> Result<(), TransportError>;
    fn disconnect(&self) -> Result<(), TransportError>;
    fn join(&self, channel: &str) -> Result<(), TransportError>;
    fn part(&self, channel: &str) -> Result<(), TransportError>;
    fn send(&self, channel: &str, line: &str) -> Result<(), TransportError>;
}

/// Push callbacks from the transport, delivered in order on one channel so
/// the engine processes them serialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Connection established, authentication pending.
    Connected,
    /// Connect attempt failed.
    ConnectFailed { reason: String },
    /// Authentication finished; channel joins may be requested.
    LoggedIn,
    /// We joined a channel.
    SelfJoined { channel: String },
    /// We left a channel.
    SelfParted { channel: String },
    /// Another user joined a channel we are on.
    UserJoined { channel: String, nick: String },
    /// Another user left a channel we are on.
    UserParted { channel: String, nick: String },
    /// A line of channel traffic.
    ChannelMessage {
        channel: String,
        nick: String,
        ident: String,
        host: String,
        text: String,
    },
    /// The connection failed mid-session.
    NetworkFailure { reason: String, code: i32 },
    /// The connection is gone; the session must fall back to Disconnected.
    Disconnected,
}

/// Sending half of the transport event stream.
pub type EventSender = mpsc::UnboundedSender<TransportEvent>;

/// Receiving half of the transport event stream.
pub type EventReceiver = mpsc::UnboundedReceiver<TransportEvent>;

/// Create a transport event stream pair.
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}
