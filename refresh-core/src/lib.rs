//! Refresh Core
//!
//! Core types and abstractions for the dataset refresh orchestrator.
//!
//! This crate contains:
//! - Domain types: Jobs, outcome records, the outcome log and the blocked set
//! - DTOs: Wire representations of the remote BI service responses

pub mod domain;
pub mod dto;
