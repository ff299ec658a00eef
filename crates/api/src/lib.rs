//! HTTP API: server, routing, and request/response mapping.
//!
//! The boundary layer only. Identity is assumed to be established by an
//! upstream auth collaborator; this crate lifts it out of headers and
//! enforces the verified-principal pre-condition before any engine call.

pub mod app;
pub mod context;
pub mod middleware;
