//! Hookflow Core
//!
//! Core types shared by the Hookflow controller and trigger listener.
//!
//! This crate contains:
//! - Domain types: Workflow, canonical Event, pipeline-run graph, secrets and sync results
//! - DTOs: wire types for the GitHub REST API and the trigger endpoint responses

pub mod domain;
pub mod dto;
