//! Configuration for the sync engine.

use crate::error::{SyncError, SyncResult};
use std::time::Duration;

/// Shared secret the backend expects on the mobile channel.
pub const DEFAULT_MOBILE_KEY: &str = "mobilesetup";
/// Label sent for the device's profile when it has none.
pub const DEFAULT_USER_LABEL: &str = "CLEODOC User";
/// Maximum entries per mobile upload.
pub const DEFAULT_PENDING_PAGE_SIZE: usize = 200;
/// Characters of a failed response body kept in errors.
pub const DEFAULT_BODY_EXCERPT_LEN: usize = 250;
/// Maximum rows requested per dashboard entry pull.
pub const DEFAULT_PULL_LIMIT: usize = 5000;
/// Pause between timer-driven rounds.
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(60);

/// Environment variable holding the backend base URL.
pub const ENV_API_BASE: &str = "WELLSYNC_API_BASE";
/// Environment variable overriding the mobile shared secret.
pub const ENV_MOBILE_KEY: &str = "WELLSYNC_MOBILE_KEY";
/// Environment variable naming the professional for note attribution.
pub const ENV_PROFESSIONAL: &str = "WELLSYNC_PROFESSIONAL";
/// Environment variable holding the round interval in seconds.
pub const ENV_SYNC_INTERVAL: &str = "WELLSYNC_SYNC_INTERVAL";

/// Configuration for sync operations.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Backend base URL, without trailing slash.
    pub base_url: String,
    /// Value of the mobile channel's shared-secret header.
    pub mobile_key: String,
    /// Professional identity used to tag uploaded notes.
    pub professional: Option<String>,
    /// Label sent for a profile that has none.
    pub user_label: String,
    /// Maximum entries per mobile upload.
    pub pending_page_size: usize,
    /// Characters of a failed response body kept in errors.
    pub body_excerpt_len: usize,
    /// Maximum rows requested per dashboard entry pull.
    pub pull_limit: usize,
    /// Request timeout.
    pub timeout: Duration,
    /// Pause between timer-driven rounds.
    pub sync_interval: Duration,
}

impl SyncConfig {
    /// Creates a configuration for the backend at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: normalize_base_url(&base_url.into()),
            mobile_key: DEFAULT_MOBILE_KEY.to_string(),
            professional: None,
            user_label: DEFAULT_USER_LABEL.to_string(),
            pending_page_size: DEFAULT_PENDING_PAGE_SIZE,
            body_excerpt_len: DEFAULT_BODY_EXCERPT_LEN,
            pull_limit: DEFAULT_PULL_LIMIT,
            timeout: Duration::from_secs(30),
            sync_interval: DEFAULT_SYNC_INTERVAL,
        }
    }

    /// Reads the configuration from `WELLSYNC_*` environment variables.
    pub fn from_env() -> SyncResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> SyncResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = lookup(ENV_API_BASE)
            .ok_or_else(|| SyncError::Config(format!("{ENV_API_BASE} is not set")))?;
        let mut config = Self::new(base_url);
        if let Some(key) = lookup(ENV_MOBILE_KEY) {
            config.mobile_key = key;
        }
        config.professional = lookup(ENV_PROFESSIONAL).filter(|p| !p.trim().is_empty());
        if let Some(raw) = lookup(ENV_SYNC_INTERVAL) {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                SyncError::Config(format!("{ENV_SYNC_INTERVAL} must be whole seconds, got {raw:?}"))
            })?;
            config.sync_interval = Duration::from_secs(secs);
        }
        config.validate()?;
        Ok(config)
    }

    /// Sets the mobile shared secret.
    pub fn with_mobile_key(mut self, key: impl Into<String>) -> Self {
        self.mobile_key = key.into();
        self
    }

    /// Sets the professional identity used for note attribution.
    pub fn with_professional(mut self, professional: impl Into<String>) -> Self {
        self.professional = Some(professional.into());
        self
    }

    /// Sets the fallback profile label.
    pub fn with_user_label(mut self, label: impl Into<String>) -> Self {
        self.user_label = label.into();
        self
    }

    /// Sets the mobile upload page size.
    pub fn with_pending_page_size(mut self, size: usize) -> Self {
        self.pending_page_size = size;
        self
    }

    /// Sets how much of a failed body is kept.
    pub fn with_body_excerpt_len(mut self, len: usize) -> Self {
        self.body_excerpt_len = len;
        self
    }

    /// Sets the row limit of dashboard entry pulls.
    pub fn with_pull_limit(mut self, limit: usize) -> Self {
        self.pull_limit = limit;
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the interval for timer-driven rounds.
    pub fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = interval;
        self
    }

    /// Checks that the configuration can drive requests.
    pub fn validate(&self) -> SyncResult<()> {
        if self.base_url.is_empty() {
            return Err(SyncError::Config("backend base URL is empty".into()));
        }
        if self.pending_page_size == 0 {
            return Err(SyncError::Config("pending page size must be positive".into()));
        }
        if self.pull_limit == 0 {
            return Err(SyncError::Config("pull limit must be positive".into()));
        }
        if self.sync_interval.is_zero() {
            return Err(SyncError::Config("sync interval must be positive".into()));
        }
        Ok(())
    }
}

fn normalize_base_url(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_string()
}
