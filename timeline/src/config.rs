use serde::Deserialize;
use url::Url;

use crate::types::RepoRef;

/// An allow-listed repository and how it is presented.
#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct RepoConfig {
    pub owner: String,
    pub name: String,
    pub display_name: Option<String>,
    /// Series color handed to the rendering layer, e.g. `#4f46e5`.
    pub color: String,
}

impl RepoConfig {
    pub fn new(owner: impl Into<String>, name: impl Into<String>, color: impl Into<String>) -> Self {
        RepoConfig {
            owner: owner.into(),
            name: name.into(),
            display_name: None,
            color: color.into(),
        }
    }

    /// Key identifying the repository in timelines: `owner/name`.
    pub fn key(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    pub fn display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }

    pub fn repo_ref(&self) -> RepoRef {
        RepoRef::new(&self.owner, &self.name)
    }
}

fn default_api_url() -> Url {
    Url::parse("https://api.github.com").expect("static url is valid")
}

fn default_user_agent() -> String {
    "commit-pulse".into()
}

fn default_timeout_secs() -> u64 {
    10
}

#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct GithubConfig {
    #[serde(default = "default_api_url")]
    pub api_url: Url,
    /// Falls back to the `GITHUB_TOKEN` environment variable when unset.
    pub token: Option<String>,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Upper bound for a single repository fetch.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GithubConfig {
    fn default() -> Self {
        GithubConfig {
            api_url: default_api_url(),
            token: None,
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_max_connections() -> u32 {
    5
}

fn default_acquire_timeout_secs() -> u64 {
    3
}

#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_max_entries() -> u64 {
    1000
}

#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_max_entries")]
    pub max_entries: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            enabled: true,
            max_entries: default_max_entries(),
        }
    }
}
