//! The fixed set of repositories clients may ask about.
//!
//! Lookups are case-insensitive on owner and name. The configured order is
//! kept and used whenever the full set is served.

use indexmap::IndexMap;

use crate::config::RepoConfig;
use crate::errors::RepoSelectionError;
use crate::types::{RepoRef, TimeRange};

#[derive(Clone, Debug)]
pub struct AllowList {
    repos: IndexMap<(String, String), RepoConfig>,
}

impl AllowList {
    /// Later duplicates of an already listed repository are ignored.
    pub fn new(repos: Vec<RepoConfig>) -> Self {
        let mut map = IndexMap::with_capacity(repos.len());
        for repo in repos {
            map.entry(repo.repo_ref().normalized()).or_insert(repo);
        }
        AllowList { repos: map }
    }

    pub fn len(&self) -> usize {
        self.repos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.repos.is_empty()
    }

    pub fn all(&self) -> impl Iterator<Item = &RepoConfig> {
        self.repos.values()
    }

    pub fn resolve(&self, repo: &RepoRef) -> Option<&RepoConfig> {
        self.repos.get(&repo.normalized())
    }

    /// Keeps the allow-listed repositories of `requested`, in request order,
    /// without duplicates.
    pub fn filter(&self, requested: &[RepoRef]) -> Vec<RepoConfig> {
        let mut selected: IndexMap<(String, String), RepoConfig> = IndexMap::new();
        for repo in requested {
            if let Some(config) = self.resolve(repo) {
                selected
                    .entry(repo.normalized())
                    .or_insert_with(|| config.clone());
            }
        }
        selected.into_values().collect()
    }

    /// Resolves the raw `repos` query parameter.
    ///
    /// A missing parameter selects every allow-listed repository. A parameter
    /// that is present must parse and must leave at least one repository after
    /// filtering.
    pub fn select(&self, raw: Option<&str>) -> Result<Vec<RepoConfig>, RepoSelectionError> {
        let Some(raw) = raw else {
            return Ok(self.all().cloned().collect());
        };

        let requested: Vec<RepoRef> = serde_json::from_str(raw)?;
        let selected = self.filter(&requested);
        if selected.is_empty() {
            return Err(RepoSelectionError::NoAllowedRepos);
        }
        Ok(selected)
    }
}

/// Deterministic cache key for a timeline request.
///
/// Repositories are normalized and sorted, so the same set requested in any
/// order maps to the same key.
pub fn cache_key(repos: &[RepoRef], range: TimeRange, locale: &str) -> String {
    let mut pairs: Vec<String> = repos
        .iter()
        .map(|repo| {
            let (owner, name) = repo.normalized();
            format!("{owner}:{name}")
        })
        .collect();
    pairs.sort();
    pairs.dedup();
    format!("timeline:{}:{}:{}", pairs.join(","), range, locale)
}
