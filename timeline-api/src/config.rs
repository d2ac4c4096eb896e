use serde::Deserialize;
use std::collections::HashSet;
use thiserror::Error;
use timeline::config::{CacheConfig, DatabaseConfig, GithubConfig, RepoConfig};
use timeline::types::TimeRange;
use url::Url;

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("Timeline path must start with '/': {0}")]
    InvalidTimelinePath(String),

    #[error("Rate limit requires max_requests and window_secs greater than 0")]
    InvalidRateLimit,

    #[error("Allowed origin must be scheme://host[:port]: {0}")]
    InvalidOrigin(String),

    #[error("No repositories configured")]
    NoRepositories,

    #[error("Duplicate repository: {0}")]
    DuplicateRepository(String),

    #[error("Trusted proxy header is not a valid header name: {0}")]
    InvalidHeaderName(String),
}

/// Deployment mode. Origin checks only apply in production.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    #[default]
    Production,
    Development,
}

fn default_timeline_path() -> String {
    "/api/github/timeline".into()
}

fn default_trusted_proxy_header() -> String {
    "cf-connecting-ip".into()
}

fn default_locale() -> String {
    "en".into()
}

fn default_period() -> TimeRange {
    TimeRange::ThirtyDays
}

/// Timeline service configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    /// Main listener for incoming requests
    pub listener: Listener,
    /// Admin listener for health and readiness probes
    pub admin_listener: Listener,
    #[serde(default)]
    pub environment: Environment,
    /// Path of the timeline endpoint. `/timeline` is always served as well.
    #[serde(default = "default_timeline_path")]
    pub timeline_path: String,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    /// Origins accepted in production, e.g. `https://example.com`
    #[serde(default)]
    pub allowed_origins: Vec<String>,
    /// Header set by the edge proxy carrying the client address
    #[serde(default = "default_trusted_proxy_header")]
    pub trusted_proxy_header: String,
    #[serde(default = "default_locale")]
    pub default_locale: String,
    #[serde(default = "default_period")]
    pub default_period: TimeRange,
    #[serde(default)]
    pub github: GithubConfig,
    /// Reads timelines from postgres when set, otherwise from the GitHub API
    pub database: Option<DatabaseConfig>,
    #[serde(default)]
    pub cache: CacheConfig,
    /// Allow-list of repositories, in display order
    pub repositories: Vec<RepoConfig>,
}

impl Config {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;
        self.admin_listener.validate()?;
        self.rate_limit.validate()?;

        if !self.timeline_path.starts_with('/') {
            return Err(ValidationError::InvalidTimelinePath(
                self.timeline_path.clone(),
            ));
        }

        if http::HeaderName::from_bytes(self.trusted_proxy_header.as_bytes()).is_err() {
            return Err(ValidationError::InvalidHeaderName(
                self.trusted_proxy_header.clone(),
            ));
        }

        for origin in &self.allowed_origins {
            validate_origin(origin)?;
        }

        if self.repositories.is_empty() {
            return Err(ValidationError::NoRepositories);
        }
        let mut seen = HashSet::new();
        for repo in &self.repositories {
            if !seen.insert(repo.repo_ref().normalized()) {
                return Err(ValidationError::DuplicateRepository(repo.key()));
            }
        }

        Ok(())
    }
}

fn validate_origin(origin: &str) -> Result<(), ValidationError> {
    let invalid = || ValidationError::InvalidOrigin(origin.to_string());
    let url = Url::parse(origin).map_err(|_| invalid())?;
    if url.host_str().is_none() || url.path() != "/" || url.query().is_some() {
        return Err(invalid());
    }
    Ok(())
}

/// Network listener configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    /// Host address to bind to (e.g., "0.0.0.0" or "127.0.0.1")
    pub host: String,
    pub port: u16,
}

impl Listener {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}

fn default_max_requests() -> u32 {
    100
}

fn default_window_secs() -> u64 {
    60
}

/// Fixed window admission limit per client
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct RateLimitConfig {
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        RateLimitConfig {
            max_requests: default_max_requests(),
            window_secs: default_window_secs(),
        }
    }
}

impl RateLimitConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.max_requests == 0 || self.window_secs == 0 {
            return Err(ValidationError::InvalidRateLimit);
        }
        Ok(())
    }
}
