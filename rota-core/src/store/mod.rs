//! Store implementations that live in this crate
//!
//! The SQLite store lives in `rota-db`.

pub mod memory;

pub use memory::InMemoryStore;
