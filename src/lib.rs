// Daybook - two-service social backend over a flat key-value namespace
// The identity service owns profiles and the social graph; the content
// service owns posts and converges its replica of identity state through
// at-least-once replication events.

// Shared primitives
pub mod config;
pub mod error;
pub mod events;
pub mod keyspace;
pub mod records;

// Storage and queue infrastructure
pub mod infrastructure;

// The two services
pub mod content;
pub mod identity;

// Re-exports for convenience
pub use error::{AppError, AppResult};
