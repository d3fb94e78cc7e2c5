use tracing::{debug, instrument};

use super::{PrError, RepoId};
use crate::api::{ApiError, GitHubClient};

/// Media type that makes the pulls endpoint return a unified diff.
pub const DIFF_MEDIA_TYPE: &str = "application/vnd.github.v3.diff";

/// Fetch the unified diff of a pull request as raw bytes.
///
/// The diff is produced server-side and returned untouched. A 404 becomes
/// `PrError::DiffNotFound`; any other failure keeps its API error kind.
#[instrument(skip(client, repo), fields(repo = %repo))]
pub async fn fetch_diff(client: &GitHubClient, repo: &RepoId, number: u64) -> Result<Vec<u8>, PrError> {
    let path = format!("repos/{}/{}/pulls/{}", repo.owner, repo.name, number);

    debug!("fetching PR diff from GitHub API");
    match client.rest_raw(&path, DIFF_MEDIA_TYPE).await {
        Ok(diff) => {
            debug!(diff_bytes = diff.len(), "received PR diff");
            Ok(diff)
        }
        Err(ApiError::Status { status: 404, .. }) => Err(PrError::DiffNotFound),
        Err(err) => Err(err.into()),
    }
}
