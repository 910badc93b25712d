//! # wellsync core
//!
//! The on-device half of wellsync: a durable local store and the two
//! views the sync engine drives on top of it.
//!
//! This crate provides:
//! - [`LocalStore`]: users, entries, queued notes and metadata, each call
//!   atomic and durable on return
//! - [`CursorRegistry`]: forward-only per-scope pull watermarks
//! - [`OutboundQueue`]: notes held until the backend acknowledges them
//!
//! ## Key Invariants
//!
//! - Entries are soft-deleted, never physically removed
//! - A cursor never moves backwards
//! - A queued note disappears only when its id is explicitly cleared
//! - A failed call leaves no trace, in memory or on disk

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cursor;
mod dir;
mod entity;
mod entries;
mod error;
pub mod journal;
mod meta;
mod profile;
mod queue;
mod store;
mod types;

pub use cursor::CursorRegistry;
pub use dir::StoreDir;
pub use entity::{Collection, Entity, Entry, QueuedNote, User};
pub use entries::{NewEntry, StoreSummary, DEFAULT_LIST_LIMIT, PENDING_PAGE_SIZE};
pub use error::{StoreError, StoreResult};
pub use meta::{CursorScope, MetaKey};
pub use queue::OutboundQueue;
pub use store::{LocalStore, StoreConfig, WriteBatch};
pub use types::{new_id, SyncStatus, Timestamp};
