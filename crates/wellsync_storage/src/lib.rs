//! # wellsync storage
//!
//! Journal backends underneath the wellsync local store.
//!
//! A backend is an **opaque append-only byte journal**: it never interprets
//! what it stores. The local store frames its own records on top and relies
//! on three guarantees from every backend:
//!
//! - `append` places bytes at the end and reports where they start
//! - `sync` makes every appended byte survive a process restart
//! - `replace` swaps the whole journal for new contents atomically
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For tests, with write-failure injection
//! - [`FileBackend`] - For on-device persistence
//!
//! ## Example
//!
//! ```rust
//! use wellsync_storage::{InMemoryBackend, StorageBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! let offset = backend.append(b"frame").unwrap();
//! backend.sync().unwrap();
//! assert_eq!(&backend.read_all().unwrap()[offset as usize..], b"frame");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
