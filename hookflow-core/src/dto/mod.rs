//! Data Transfer Objects
//!
//! Wire types exchanged with GitHub and returned by the trigger endpoint.

pub mod github;
pub mod hook;
