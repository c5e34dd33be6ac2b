//! GitHub delivery handling
//!
//! Parsing of webhook deliveries into canonical events and verification of
//! their HMAC signatures.

pub mod event;
pub mod signature;

pub use event::{EventError, EventParser};
