//! # wellsync sync engine
//!
//! Moves data between a device's [`wellsync_core::LocalStore`] and the
//! central backend.
//!
//! This crate provides:
//! - The three independent flows (pull users, pull entries, push queued
//!   notes) plus the mobile channel's push and pull
//! - The backend transport, validating status and content type before
//!   decoding
//! - Configuration and the error taxonomy surfaced to callers
//!
//! ## Key Invariants
//!
//! - No local state changes until a complete, valid response arrived
//! - Cursors only move forward
//! - Only acknowledged ids leave the queue
//! - Nothing retries automatically

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod convert;
mod engine;
mod error;
mod http;
mod transport;

pub use config::{
    SyncConfig, DEFAULT_BODY_EXCERPT_LEN, DEFAULT_MOBILE_KEY, DEFAULT_PENDING_PAGE_SIZE,
    DEFAULT_PULL_LIMIT, DEFAULT_SYNC_INTERVAL, DEFAULT_USER_LABEL, ENV_API_BASE, ENV_MOBILE_KEY,
    ENV_PROFESSIONAL, ENV_SYNC_INTERVAL,
};
pub use engine::{DashboardRound, MobileRound, PullReport, PushReport, SyncEngine, SyncStats};
pub use error::{SyncError, SyncResult};
pub use http::{HttpClient, HttpTransport, LoopbackClient, ReqwestClient};
pub use transport::{CentralTransport, MockCall, MockTransport};
