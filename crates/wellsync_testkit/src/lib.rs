//! # wellsync testkit
//!
//! Test utilities for wellsync.
//!
//! This crate provides:
//! - Store fixtures backed by temporary directories
//! - Builders for wire rows and queued notes
//! - Property-based generators using proptest
//! - [`CentralServer`], an in-process fake of the central backend
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use wellsync_testkit::prelude::*;
//!
//! let server = Arc::new(CentralServer::new());
//! server.seed_entry("u1", remote_entry("e1", "2024-01-01T00:00:00Z"));
//! // route an HttpTransport to it through a LoopbackClient
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod server;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::server::*;
}

pub use fixtures::*;
pub use generators::*;
pub use server::*;
