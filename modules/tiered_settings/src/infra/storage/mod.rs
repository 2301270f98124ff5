//! Storage layer - override records and the in-memory store

pub mod entity;
pub mod mapper;
pub mod memory;
pub mod seed;

pub use memory::{MemoryBackend, MemoryStore};
