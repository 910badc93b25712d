//! HTTP transport implementation.
//!
//! The HTTP client is abstracted behind [`HttpClient`] so the same
//! request/response handling runs over `reqwest` in production and over
//! an in-process server in tests.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::transport::CentralTransport;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;
use wellsync_protocol::{
    decode_json, entries_url, mobile_pull_url, resolve, EntriesListing, HttpRequest,
    HttpResponse, LoopbackServer, Method, MobileSyncRequest, RemoteEntry, RemoteUser, SyncAck,
    SyncEntriesRequest, UsersListing, MOBILE_KEY_HEADER, MOBILE_SYNC_PATH, SYNC_ENTRIES_PATH,
    USERS_PATH,
};

/// HTTP client abstraction.
///
/// `Err` means no response was received at all.
pub trait HttpClient: Send + Sync {
    /// Sends one request.
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, String>;
}

/// Which authentication a request carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Channel {
    Dashboard,
    Mobile,
}

/// HTTP-based backend transport speaking JSON.
pub struct HttpTransport<C: HttpClient> {
    base_url: String,
    mobile_key: String,
    excerpt_len: usize,
    pull_limit: usize,
    client: C,
    last_error: RwLock<Option<String>>,
}

impl HttpTransport<ReqwestClient> {
    /// Builds a transport over a blocking `reqwest` client.
    pub fn from_config(config: &SyncConfig) -> SyncResult<Self> {
        config.validate()?;
        Ok(Self::new(config, ReqwestClient::new(config.timeout)?))
    }
}

impl<C: HttpClient> HttpTransport<C> {
    /// Creates a transport over `client`.
    pub fn new(config: &SyncConfig, client: C) -> Self {
        Self {
            base_url: config.base_url.clone(),
            mobile_key: config.mobile_key.clone(),
            excerpt_len: config.body_excerpt_len,
            pull_limit: config.pull_limit,
            client,
            last_error: RwLock::new(None),
        }
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the last error message.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    /// Returns the underlying client.
    pub fn client(&self) -> &C {
        &self.client
    }

    fn call<T: DeserializeOwned>(&self, channel: Channel, mut request: HttpRequest) -> SyncResult<T> {
        if channel == Channel::Mobile {
            request = request.with_header(MOBILE_KEY_HEADER, self.mobile_key.as_str());
        }
        debug!(method = request.method.as_str(), url = %request.url, "backend request");

        let result = self.exchange(&request);
        match &result {
            Ok(_) => *self.last_error.write() = None,
            Err(err) => *self.last_error.write() = Some(err.to_string()),
        }
        result
    }

    fn exchange<T: DeserializeOwned>(&self, request: &HttpRequest) -> SyncResult<T> {
        let response = self.client.send(request).map_err(SyncError::Network)?;
        debug!(status = response.status, bytes = response.body.len(), "backend response");

        if !response.is_success() || !response.is_json() {
            return Err(SyncError::transport(
                response.status,
                &response.body,
                self.excerpt_len,
            ));
        }
        Ok(decode_json(&response.body)?)
    }
}

impl<C: HttpClient> CentralTransport for HttpTransport<C> {
    fn fetch_users(&self) -> SyncResult<Vec<RemoteUser>> {
        let url = resolve(&self.base_url, USERS_PATH)?;
        let listing: UsersListing = self.call(Channel::Dashboard, HttpRequest::get(url))?;
        Ok(listing.into_users())
    }

    fn fetch_entries(&self, user_id: &str, since: Option<&str>) -> SyncResult<Vec<RemoteEntry>> {
        let url = entries_url(&self.base_url, user_id, since, self.pull_limit)?;
        let listing: EntriesListing = self.call(Channel::Dashboard, HttpRequest::get(url))?;
        Ok(listing.into_entries())
    }

    fn push_entries(&self, request: &SyncEntriesRequest) -> SyncResult<SyncAck> {
        let url = resolve(&self.base_url, SYNC_ENTRIES_PATH)?;
        self.call(Channel::Dashboard, HttpRequest::post_json(url, request)?)
    }

    fn push_mobile(&self, request: &MobileSyncRequest) -> SyncResult<SyncAck> {
        let url = resolve(&self.base_url, MOBILE_SYNC_PATH)?;
        self.call(Channel::Mobile, HttpRequest::post_json(url, request)?)
    }

    fn pull_mobile(&self, user_id: &str, since: &str) -> SyncResult<Vec<RemoteEntry>> {
        let url = mobile_pull_url(&self.base_url, user_id, since)?;
        let listing: EntriesListing = self.call(Channel::Mobile, HttpRequest::get(url))?;
        Ok(listing.into_entries())
    }
}

/// Blocking `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: reqwest::blocking::Client,
}

impl ReqwestClient {
    /// Creates a client whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> SyncResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::Config(format!("cannot build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

impl HttpClient for ReqwestClient {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, String> {
        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().map_err(|e| e.to_string())?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let body = response.bytes().map_err(|e| e.to_string())?.to_vec();

        Ok(HttpResponse {
            status,
            content_type,
            body,
        })
    }
}

/// A loopback HTTP client that routes requests directly to a server.
///
/// Useful for testing without actual network overhead.
pub struct LoopbackClient<S: LoopbackServer> {
    server: S,
}

impl<S: LoopbackServer + Send + Sync> LoopbackClient<S> {
    /// Creates a new loopback client connected to the given server.
    pub fn new(server: S) -> Self {
        Self { server }
    }

    /// Returns the server.
    pub fn server(&self) -> &S {
        &self.server
    }
}

impl<S: LoopbackServer + Send + Sync> HttpClient for LoopbackClient<S> {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, String> {
        self.server.handle(request)
    }
}
