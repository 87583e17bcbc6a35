//! Repository Implementations
//!
//! SQLite implementations of domain store traits.
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! use chat_relay::infrastructure::{database, repositories::SqliteMessageRepository};
//!
//! let pool = database::create_pool(&settings.database).await?;
//! database::run_migrations(&pool).await?;
//! let store = SqliteMessageRepository::new(pool);
//! ```

pub mod message_repository;

pub use message_repository::SqliteMessageRepository;
