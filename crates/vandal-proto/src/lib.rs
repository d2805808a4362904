//! # vandal-proto
//!
//! Wire codec for the anti-vandalism coordination network.
//!
//! Clients watching the same set of wikis share intelligence over an
//! IRC-style broadcast medium, one channel per wiki. Protocol traffic is
//! line-oriented: a configurable prefix, a verb, and whitespace-delimited
//! arguments. Anything that does not match the command grammar is ordinary
//! chat and passes through untouched.
//!
//! This crate is pure data: no I/O, no timers. It provides:
//!
//! - [`Notice`] — the typed protocol events (good / rollback / suspicious /
//!   rescore / warning)
//! - [`decode`] / [`encode`] — total, panic-free line conversion
//! - [`mask`] — wildcard hostmask matching for sender classification
//!
//! ## Quick Start
//!
//! ```rust
//! use vandal_proto::{decode, encode, Identity, Notice, Payload};
//!
//! let notice = Notice::Good {
//!     rev: 12345,
//!     from: Identity::new("Alice", "alice", "host.example"),
//! };
//! let line = encode("!", &notice);
//! assert_eq!(line, "!good 12345 Alice alice host.example");
//!
//! match decode("!", &line) {
//!     Ok(Payload::Notice(n)) => assert_eq!(n, notice),
//!     other => panic!("unexpected: {other:?}"),
//! }
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

mod codec;
mod error;
mod event;
pub mod mask;

pub use self::codec::{decode, encode, Payload};
pub use self::error::DecodeError;
pub use self::event::{Identity, Notice, RevId};
