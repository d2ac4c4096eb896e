use thiserror::Error;

/// Failure of a single repository fetch against the activity API.
///
/// These never reach clients: the source substitutes an empty series.
#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("request to activity API failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("activity API returned {status} for {repo}")]
    Status { repo: String, status: u16 },

    #[error("statistics for {0} are still being computed")]
    Pending(String),

    #[error("activity API timed out for {0}")]
    Timeout(String),

    #[error("invalid activity API url: {0}")]
    InvalidUrl(String),
}

/// Errors produced while building a timeline.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors when resolving the requested repositories against the allow-list.
#[derive(Error, Debug)]
pub enum RepoSelectionError {
    #[error("repos parameter is not a JSON array of {{owner, name}}: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("none of the requested repositories are allowed")]
    NoAllowedRepos,
}
