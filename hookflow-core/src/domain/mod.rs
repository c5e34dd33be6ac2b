//! Domain types
//!
//! Core business entities. These are plain serde models with no I/O.

pub mod event;
pub mod meta;
pub mod pipeline_run;
pub mod secret;
pub mod sync;
pub mod workflow;

pub use event::Event;
pub use meta::{ObjectMeta, OwnerReference};
pub use secret::Secret;
pub use sync::{KeyPair, SyncAction, SyncKind, SyncResult, SyncResultEntry};
pub use workflow::{Repository, Task, Workflow};
