//! Application Layer
//!
//! Relay services and the wire DTOs. This layer sits between the transport
//! handlers in `presentation` and the domain types.

pub mod dto;
pub mod services;
