use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// A pull request resolved from the GitHub API.
/// Only `number` is guaranteed; the remaining fields default to empty
/// when a query does not select them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequestRef {
    /// PR number (e.g., 123)
    pub number: u64,
    /// GraphQL node ID
    #[serde(default)]
    pub id: String,
    /// Branch the changes come from
    #[serde(default)]
    pub head_ref_name: String,
    /// Branch the changes merge into
    #[serde(default)]
    pub base_ref_name: String,
    /// Web URL of the PR
    #[serde(default)]
    pub url: String,
}

/// A repository on the configured GitHub host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoId {
    pub owner: String,
    pub name: String,
}

impl RepoId {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl FromStr for RepoId {
    type Err = String;

    /// Parse `OWNER/REPO`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().split_once('/') {
            Some((owner, name))
                if !owner.is_empty() && !name.is_empty() && !name.contains('/') =>
            {
                Ok(RepoId::new(owner, name))
            }
            _ => Err(format!("expected the \"OWNER/REPO\" format, got \"{s}\"")),
        }
    }
}

/// How the user named the pull request on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrSelector {
    Number(u64),
    Url { repo: RepoId, number: u64 },
    Branch(String),
}
