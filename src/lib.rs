//! # Chat Relay Library
//!
//! A one-to-one real-time message relay:
//! - WebSocket endpoint per user for live messaging and presence
//! - Delivery and read acknowledgements
//! - SQLite store for messages whose recipient was offline
//! - Small HTTP API for history, status and ID generation
//!
//! ## Architecture
//!
//! - **Domain Layer**: Messages, sessions and the message store trait
//! - **Application Layer**: Presence registry, delivery and connection services
//! - **Infrastructure Layer**: SQLite store and Prometheus metrics
//! - **Presentation Layer**: HTTP handlers and WebSocket endpoint
//!
//! ## Module Structure
//!
//! ```text
//! chat_relay/
//! +-- config/         Configuration management
//! +-- domain/         Entities and the store trait
//! +-- application/    Relay services and wire DTOs
//! +-- infrastructure/ Database, repository and metrics
//! +-- presentation/   HTTP routes and WebSocket handler
//! +-- shared/         Errors and ID generation
//! ```

// Configuration module
pub mod config;

// Domain layer - Core business logic
pub mod domain;

// Application layer - Relay services
pub mod application;

// Infrastructure layer - External implementations
pub mod infrastructure;

// Presentation layer - HTTP and WebSocket handlers
pub mod presentation;

// Shared utilities
pub mod shared;

// Application startup and state management
pub mod startup;

// Telemetry and observability
pub mod telemetry;
