//! Variable expansion
//!
//! Substitutes `$(workflow.<key>)` and `$(event {<jsonpath>})` tokens in
//! labels, annotations and step scripts.

mod expansion;
pub mod json_path;

pub use expansion::Replacements;
