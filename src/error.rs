//! Engine-level error types.

use thiserror::Error;

use crate::transport::TransportError;

/// Errors surfaced by the protocol engine's public operations.
///
/// Best-effort conditions (not joined yet, untrusted sender, malformed
/// inbound line) are not errors; they are logged and dropped per the
/// protocol's at-least-once advisory contract.
#[derive(Debug, Error)]
pub enum EngineError {
    /// An announcement referenced a site with no registered channel.
    #[error("no channel registered for site {0:?}")]
    UnknownSite(String),

    /// The transport handle is gone.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Result type for engine operations.
pub type EngineResult = Result<(), EngineError>;
