#![forbid(unsafe_code)]

pub mod repository;
pub mod scoped;
pub mod sqlite;

pub use repository::{InMemoryStore, LocalStore, Storage, StorageError};
pub use scoped::ScopedStore;
