//! Scheduler layer for the controller
//!
//! This layer lists workflows on a fixed interval and runs a reconcile or
//! finalize pass for each, persisting the outcome.

pub mod poller;

pub use poller::WorkflowPoller;
