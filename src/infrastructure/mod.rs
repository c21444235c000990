// Infrastructure modules shared by both services
pub mod cache; // LRU lookup cache
pub mod memory_store; // In-memory key-value store
pub mod queue; // Message queue interface and in-process queue
pub mod sqlite_store; // SQLite-backed key-value store
pub mod store; // Key-value store interface

pub use cache::Cache;
pub use memory_store::MemoryStore;
pub use queue::{DeadLetter, InProcessQueue, MessageQueue, QueueMessage};
pub use sqlite_store::SqliteStore;
pub use store::{KeyValueStore, StoreItem};
