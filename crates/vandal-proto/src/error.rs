//! Decode error types.
//!
//! Decoding is total: any input line yields either a typed payload or one of
//! these errors. The engine logs and drops erroneous lines; nothing here is
//! fatal to the process.

use thiserror::Error;

/// Errors encountered when decoding a protocol command line.
///
/// Only lines that carry the configured prefix *and* a recognized verb can
/// fail to decode; everything else is ordinary chat by definition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum DecodeError {
    /// A recognized verb was followed by the wrong number of arguments.
    #[error("{verb}: expected {expected} arguments, got {got}")]
    ArgumentCount {
        /// The verb that was recognized.
        verb: &'static str,
        /// Arguments the grammar requires.
        expected: usize,
        /// Arguments actually present.
        got: usize,
    },

    /// Revision id was not a decimal integer in range.
    #[error("invalid revision id: {0:?}")]
    InvalidRevision(String),

    /// Score was not a signed decimal integer in range.
    #[error("invalid score: {0:?}")]
    InvalidScore(String),

    /// Warning level was not a small unsigned integer.
    #[error("invalid warning level: {0:?}")]
    InvalidLevel(String),
}
