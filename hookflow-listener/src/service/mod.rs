//! Service layer
//!
//! Business logic of the trigger path. Remote dependencies are held as the
//! trait objects of `hookflow-client` so the whole path runs against
//! in-memory fakes in tests.

pub mod event_sink;

// Re-export implementations
pub use event_sink::{EventSink, Trigger, TriggerError};
