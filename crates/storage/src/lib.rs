//! recache-storage: the persistent key-value adapter boundary
//!
//! The cache engine treats durable storage as an external collaborator
//! behind [`StorageBackend`]: read a key, write a key, remove a key,
//! subscribe to external changes. This crate provides:
//!
//! - [`StorageBackend`]: the trait the engine programs against
//! - [`MemoryBackend`]: ephemeral backend with change notification
//! - [`DiskBackend`]: file-per-key durable backend
//! - [`codec`]: tagged-JSON payload encoding with soft-fail decoding
//! - [`Flusher`]: write-behind worker that makes persistence fire-and-forget

pub mod backend;
pub mod codec;
pub mod disk;
pub mod flusher;
pub mod memory;

pub use backend::{StorageBackend, WatchCallback};
pub use disk::DiskBackend;
pub use flusher::{FlushOp, Flusher};
pub use memory::MemoryBackend;
