pub mod diff;
pub mod types;

pub use types::{PrSelector, PullRequestRef, RepoId};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::api::{ApiError, GitHubClient};

#[derive(Debug, Error)]
pub enum PrError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("invalid pull request URL: {0}")]
    InvalidUrl(String),

    #[error("no open pull requests found for branch \"{0}\"")]
    NoOpenPullRequests(String),

    #[error("no pull requests found for branch \"{0}\"")]
    BranchNotFound(String),

    #[error("pull request #{number} not found in {repo}")]
    NotFound { repo: RepoId, number: u64 },

    #[error("could not find pull request diff: pull request not found")]
    DiffNotFound,
}

/// What the locator should look for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// A PR named on the command line
    Selector(PrSelector),
    /// The open PR whose head is the checked-out branch
    CurrentBranch(String),
}

/// A resolved PR together with the repository it lives in, which differs
/// from the base repository when the PR was selected by URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Located {
    pub repo: RepoId,
    pub pull_request: PullRequestRef,
}

const PULL_REQUEST_FIELDS: &str = "id number url headRefName baseRefName";

/// Parse a command-line PR argument: a number (optionally `#`-prefixed),
/// a PR URL on `host`, or otherwise a branch name.
pub fn parse_selector(arg: &str, host: &str) -> Result<PrSelector, PrError> {
    let arg = arg.trim();
    if let Ok(number) = arg.strip_prefix('#').unwrap_or(arg).parse::<u64>() {
        return Ok(PrSelector::Number(number));
    }
    if arg.starts_with("https://") || arg.starts_with("http://") {
        return parse_pr_url(arg, host);
    }
    Ok(PrSelector::Branch(arg.to_string()))
}

/// Parse `https://{host}/{owner}/{repo}/pull/{number}[/...]`.
fn parse_pr_url(url: &str, host: &str) -> Result<PrSelector, PrError> {
    let invalid = || PrError::InvalidUrl(url.to_string());
    let parsed = reqwest::Url::parse(url).map_err(|_| invalid())?;

    let url_host = parsed.host_str().ok_or_else(invalid)?;
    let url_host = url_host.strip_prefix("www.").unwrap_or(url_host);
    if !url_host.eq_ignore_ascii_case(host) {
        return Err(invalid());
    }

    let segments: Vec<_> = parsed
        .path_segments()
        .ok_or_else(invalid)?
        .filter(|segment| !segment.is_empty())
        .collect();

    if segments.len() < 4 || segments[2] != "pull" {
        return Err(invalid());
    }

    let number = segments[3].parse::<u64>().map_err(|_| invalid())?;

    Ok(PrSelector::Url {
        repo: RepoId::new(segments[0], segments[1]),
        number,
    })
}

/// Resolve a lookup to exactly one pull request. Costs one GraphQL query.
#[instrument(skip(client, repo), fields(repo = %repo))]
pub async fn locate(client: &GitHubClient, repo: &RepoId, lookup: &Lookup) -> Result<Located, PrError> {
    match lookup {
        Lookup::Selector(PrSelector::Number(number)) => {
            let pull_request = find_by_number(client, repo, *number).await?;
            Ok(Located {
                repo: repo.clone(),
                pull_request,
            })
        }
        Lookup::Selector(PrSelector::Url { repo: url_repo, number }) => {
            let pull_request = find_by_number(client, url_repo, *number).await?;
            Ok(Located {
                repo: url_repo.clone(),
                pull_request,
            })
        }
        Lookup::Selector(PrSelector::Branch(branch)) => {
            let candidates = open_pull_requests_for_branch(client, repo, branch).await?;
            let pull_request =
                select_one(candidates).ok_or_else(|| PrError::BranchNotFound(branch.clone()))?;
            Ok(Located {
                repo: repo.clone(),
                pull_request,
            })
        }
        Lookup::CurrentBranch(branch) => {
            let candidates = open_pull_requests_for_branch(client, repo, branch).await?;
            let pull_request =
                select_one(candidates).ok_or_else(|| PrError::NoOpenPullRequests(branch.clone()))?;
            Ok(Located {
                repo: repo.clone(),
                pull_request,
            })
        }
    }
}

/// Pick the PR with the highest number, so the choice never depends on
/// API ordering.
fn select_one(candidates: Vec<PullRequestRef>) -> Option<PullRequestRef> {
    if candidates.len() > 1 {
        debug!(count = candidates.len(), "several open pull requests match; choosing the highest number");
    }
    candidates.into_iter().max_by_key(|pr| pr.number)
}

#[derive(Deserialize)]
struct RepositoryData<T> {
    repository: Option<T>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SinglePullRequest {
    pull_request: Option<PullRequestRef>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PullRequestList {
    pull_requests: Nodes,
}

#[derive(Deserialize)]
struct Nodes {
    #[serde(default)]
    nodes: Vec<PullRequestRef>,
}

async fn find_by_number(client: &GitHubClient, repo: &RepoId, number: u64) -> Result<PullRequestRef, PrError> {
    let query = format!(
        "query PullRequestByNumber($owner: String!, $repo: String!, $number: Int!) {{
            repository(owner: $owner, name: $repo) {{
                pullRequest(number: $number) {{ {PULL_REQUEST_FIELDS} }}
            }}
        }}"
    );
    let variables = serde_json::json!({
        "owner": repo.owner,
        "repo": repo.name,
        "number": number,
    });

    let not_found = || PrError::NotFound {
        repo: repo.clone(),
        number,
    };

    let data: RepositoryData<SinglePullRequest> = match client.graphql(&query, variables).await {
        Ok(data) => data,
        Err(err) if err.is_graphql_not_found() => return Err(not_found()),
        Err(err) => return Err(err.into()),
    };

    let pull_request = data
        .repository
        .and_then(|r| r.pull_request)
        .ok_or_else(not_found)?;
    debug!(number = pull_request.number, "found pull request by number");
    Ok(pull_request)
}

async fn open_pull_requests_for_branch(
    client: &GitHubClient,
    repo: &RepoId,
    branch: &str,
) -> Result<Vec<PullRequestRef>, PrError> {
    let query = format!(
        "query PullRequestsForBranch($owner: String!, $repo: String!, $headRefName: String!) {{
            repository(owner: $owner, name: $repo) {{
                pullRequests(headRefName: $headRefName, states: OPEN, first: 100) {{
                    nodes {{ {PULL_REQUEST_FIELDS} }}
                }}
            }}
        }}"
    );
    let variables = serde_json::json!({
        "owner": repo.owner,
        "repo": repo.name,
        "headRefName": branch,
    });

    let data: RepositoryData<PullRequestList> = client.graphql(&query, variables).await?;
    let nodes = data
        .repository
        .map(|r| r.pull_requests.nodes)
        .unwrap_or_default();
    debug!(branch, count = nodes.len(), "queried open pull requests for branch");
    Ok(nodes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::stub::StubTransport;
    use std::sync::Arc;

    const ONE_OPEN_PR: &str = r#"
        { "data": { "repository": { "pullRequests": { "nodes": [
            { "url": "https://github.com/OWNER/REPO/pull/123",
              "number": 123,
              "id": "foobar123",
              "headRefName": "feature",
              "baseRefName": "master" }
        ] } } } }"#;

    fn client(stub: &Arc<StubTransport>) -> GitHubClient {
        GitHubClient::new(stub.clone(), "github.com", None)
    }

    fn repo() -> RepoId {
        RepoId::new("OWNER", "REPO")
    }

    #[test]
    fn test_parse_selector_number() {
        assert_eq!(parse_selector("123", "github.com").unwrap(), PrSelector::Number(123));
        assert_eq!(parse_selector("#42", "github.com").unwrap(), PrSelector::Number(42));
    }

    #[test]
    fn test_parse_selector_url() {
        let selector = parse_selector("https://github.com/org/repo/pull/42/files", "github.com").unwrap();
        assert_eq!(
            selector,
            PrSelector::Url {
                repo: RepoId::new("org", "repo"),
                number: 42
            }
        );
    }

    #[test]
    fn test_parse_selector_invalid_url() {
        assert!(parse_selector("https://example.com/org/repo/pull/42", "github.com").is_err());
        assert!(parse_selector("https://github.com/org/repo/pulls/42", "github.com").is_err());
        assert!(parse_selector("https://github.com/org/repo/pull/abc", "github.com").is_err());
    }

    #[test]
    fn test_parse_selector_branch() {
        assert_eq!(
            parse_selector("feature/login", "github.com").unwrap(),
            PrSelector::Branch("feature/login".to_string())
        );
    }

    #[tokio::test]
    async fn test_locate_current_branch() {
        let stub = Arc::new(StubTransport::new());
        stub.stub_response(200, ONE_OPEN_PR);

        let located = locate(&client(&stub), &repo(), &Lookup::CurrentBranch("feature".to_string()))
            .await
            .unwrap();
        assert_eq!(located.repo, repo());
        assert_eq!(located.pull_request.number, 123);
        assert_eq!(located.pull_request.id, "foobar123");
        assert_eq!(located.pull_request.base_ref_name, "master");

        let body: serde_json::Value = serde_json::from_slice(stub.requests()[0].body.as_ref().unwrap()).unwrap();
        assert_eq!(body["variables"]["headRefName"], "feature");
        assert_eq!(body["variables"]["owner"], "OWNER");
        stub.verify();
    }

    #[tokio::test]
    async fn test_locate_current_branch_without_prs() {
        let stub = Arc::new(StubTransport::new());
        stub.stub_response(200, r#"{ "data": { "repository": { "pullRequests": { "nodes": [] } } } }"#);

        let err = locate(&client(&stub), &repo(), &Lookup::CurrentBranch("feature".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "no open pull requests found for branch \"feature\"");
    }

    #[tokio::test]
    async fn test_locate_picks_highest_number() {
        let stub = Arc::new(StubTransport::new());
        stub.stub_response(
            200,
            r#"{ "data": { "repository": { "pullRequests": { "nodes": [
                { "number": 7, "headRefName": "feature" },
                { "number": 19, "headRefName": "feature" },
                { "number": 12, "headRefName": "feature" }
            ] } } } }"#,
        );

        let located = locate(&client(&stub), &repo(), &Lookup::CurrentBranch("feature".to_string()))
            .await
            .unwrap();
        assert_eq!(located.pull_request.number, 19);
    }

    #[tokio::test]
    async fn test_locate_by_number() {
        let stub = Arc::new(StubTransport::new());
        stub.stub_response(200, r#"{ "data": { "repository": { "pullRequest": { "number": 123 } } } }"#);

        let located = locate(&client(&stub), &repo(), &Lookup::Selector(PrSelector::Number(123)))
            .await
            .unwrap();
        assert_eq!(located.pull_request.number, 123);

        let body: serde_json::Value = serde_json::from_slice(stub.requests()[0].body.as_ref().unwrap()).unwrap();
        assert_eq!(body["variables"]["number"], 123);
    }

    #[tokio::test]
    async fn test_locate_by_number_not_found() {
        let stub = Arc::new(StubTransport::new());
        stub.stub_response(
            200,
            r#"{ "data": { "repository": { "pullRequest": null } },
                 "errors": [{ "type": "NOT_FOUND", "message": "Could not resolve to a PullRequest with the number of 999." }] }"#,
        );

        let err = locate(&client(&stub), &repo(), &Lookup::Selector(PrSelector::Number(999)))
            .await
            .unwrap_err();
        assert!(matches!(err, PrError::NotFound { number: 999, .. }));
        assert_eq!(err.to_string(), "pull request #999 not found in OWNER/REPO");
    }

    #[tokio::test]
    async fn test_locate_by_url_uses_url_repository() {
        let stub = Arc::new(StubTransport::new());
        stub.stub_response(200, r#"{ "data": { "repository": { "pullRequest": { "number": 5 } } } }"#);

        let selector = PrSelector::Url {
            repo: RepoId::new("other", "project"),
            number: 5,
        };
        let located = locate(&client(&stub), &repo(), &Lookup::Selector(selector)).await.unwrap();
        assert_eq!(located.repo, RepoId::new("other", "project"));

        let body: serde_json::Value = serde_json::from_slice(stub.requests()[0].body.as_ref().unwrap()).unwrap();
        assert_eq!(body["variables"]["owner"], "other");
        assert_eq!(body["variables"]["repo"], "project");
    }

    #[tokio::test]
    async fn test_locate_by_branch_selector_not_found() {
        let stub = Arc::new(StubTransport::new());
        stub.stub_response(200, r#"{ "data": { "repository": { "pullRequests": { "nodes": [] } } } }"#);

        let selector = PrSelector::Branch("topic".to_string());
        let err = locate(&client(&stub), &repo(), &Lookup::Selector(selector)).await.unwrap_err();
        assert!(matches!(err, PrError::BranchNotFound(_)));
    }

    #[tokio::test]
    async fn test_locate_transport_error_propagates() {
        let stub = Arc::new(StubTransport::new());
        stub.stub_transport_error("connection refused");

        let err = locate(&client(&stub), &repo(), &Lookup::CurrentBranch("feature".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, PrError::Api(ApiError::Transport(_))));
        assert_eq!(err.to_string(), "error connecting to GitHub: connection refused");
    }
}
