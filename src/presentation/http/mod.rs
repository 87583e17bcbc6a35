//! HTTP API
//!
//! Liveness, history and administrative endpoints.

pub mod handlers;
pub mod routes;
