//! # Domain Layer
//!
//! Core types of the relay, independent of transport and storage engine.
//!
//! - **entities**: Message, DeliveryState, Session, presence notices
//! - Store and channel traits define the contracts the infrastructure and
//!   presentation layers implement

pub mod entities;

pub use entities::*;
