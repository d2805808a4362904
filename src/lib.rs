//! vandalnet - anti-vandalism network coordination client.
//!
//! Coordinates independent anti-vandalism clients watching a set of wikis:
//! judgements (good, rollback, suspicious, rescore) and user warnings are
//! shared over an IRC-style broadcast medium, one channel per site. This
//! crate is the protocol engine; the wire codec lives in `vandal-proto`.

pub mod cache;
pub mod config;
pub mod display;
pub mod edits;
pub mod engine;
pub mod error;
pub mod session;
pub mod sites;
pub mod transport;
pub mod trust;
