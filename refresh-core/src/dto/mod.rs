//! Data Transfer Objects for the remote BI service
//!
//! Wire shapes of the token endpoint and the dataset/refresh REST API.
//! Only the fields the orchestrator reads are modelled; everything else in
//! the payloads is ignored.

pub mod auth;
pub mod dataset;
pub mod refresh;
