//! Persistence Adapters
//!
//! Implementations of `PersistenceStore`.

pub mod in_memory;

pub use in_memory::InMemoryStore;
