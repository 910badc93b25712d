//! # wellsync protocol
//!
//! Wire types for the central backend's HTTP contract, shared by the
//! mobile check-in channel and the professional dashboard channel.
//!
//! This crate provides:
//! - Entry and user wire shapes ([`EntryPayload`], [`RemoteEntry`], [`RemoteUser`])
//! - Request/acknowledgement bodies ([`SyncEntriesRequest`], [`MobileSyncRequest`], [`SyncAck`])
//! - Listing envelopes that accept both `[...]` and `{ "users": [...] }` forms
//! - Endpoint paths and URL construction
//! - Plain HTTP request/response values and the [`LoopbackServer`] seam
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod endpoints;
mod error;
mod http;
mod messages;

pub use endpoints::{
    entries_url, mobile_pull_url, resolve, ENTRIES_PATH, MOBILE_KEY_HEADER, MOBILE_PULL_PATH,
    MOBILE_SYNC_PATH, SYNC_ENTRIES_PATH, USERS_PATH,
};
pub use error::{ProtocolError, ProtocolResult};
pub use http::{HttpRequest, HttpResponse, LoopbackServer, Method, JSON_CONTENT_TYPE};
pub use messages::{
    decode_json, encode_json, Consent, EntriesListing, EntryPayload, MobileSyncRequest,
    MobileUser, RemoteEntry, RemoteUser, SyncAck, SyncEntriesRequest, UserRef, UsersListing,
};
