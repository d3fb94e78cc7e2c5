use std::io::Write;

use thiserror::Error;
use tracing::{debug, info, info_span, Instrument};

use crate::api::GitHubClient;
use crate::color::{ColorError, ColorMode};
use crate::git::{GitError, Workspace};
use crate::output::{self, OutputError, OutputTarget, Pager};
use crate::pr::{self, Lookup, PrError, PrSelector};

/// Any failure of the diff command. Every variant displays the message of
/// the stage that failed, unchanged.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Color(#[from] ColorError),

    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    PullRequest(#[from] PrError),

    #[error(transparent)]
    Output(#[from] OutputError),
}

/// Everything one invocation knows before it touches the network.
#[derive(Debug, Clone, Default)]
pub struct InvocationContext {
    /// PR number, URL or branch given on the command line
    pub selector: Option<String>,
    /// Raw --color value
    pub color: String,
    pub stdout_is_tty: bool,
    pub stderr_is_tty: bool,
    pub pager: Option<String>,
}

/// External capabilities the command runs against.
pub struct Services<'a> {
    pub client: &'a GitHubClient,
    pub workspace: &'a dyn Workspace,
    pub pager: &'a dyn Pager,
}

/// Show the diff of a pull request.
///
/// Stages run strictly in order: color validation, repository and PR
/// resolution, diff download, output. The first failure stops the rest.
pub async fn run_diff(
    ctx: &InvocationContext,
    services: &Services<'_>,
    out: &mut (dyn Write + Send),
) -> Result<(), CommandError> {
    let color = ColorMode::resolve(&ctx.color, ctx.stdout_is_tty)?;
    debug!(?color, "resolved color mode");

    let selector = match &ctx.selector {
        Some(arg) => Some(pr::parse_selector(arg, services.client.host())?),
        None => None,
    };
    // A PR URL names its own repository; only the other lookups need a checkout.
    let repo = match &selector {
        Some(PrSelector::Url { repo, .. }) => repo.clone(),
        _ => services.workspace.base_repo()?,
    };
    let lookup = match selector {
        Some(selector) => Lookup::Selector(selector),
        None => Lookup::CurrentBranch(services.workspace.current_branch()?),
    };

    info!(repo = %repo, ?lookup, "locating pull request");
    let located = pr::locate(services.client, &repo, &lookup)
        .instrument(info_span!("locate"))
        .await?;
    let pull_request = &located.pull_request;
    info!(
        number = pull_request.number,
        id = %pull_request.id,
        head = %pull_request.head_ref_name,
        base = %pull_request.base_ref_name,
        url = %pull_request.url,
        "resolved pull request"
    );

    let diff = pr::diff::fetch_diff(services.client, &located.repo, pull_request.number)
        .instrument(info_span!("fetch_diff", number = pull_request.number))
        .await?;

    let target = OutputTarget {
        stdout_is_tty: ctx.stdout_is_tty,
        stderr_is_tty: ctx.stderr_is_tty,
        pager: ctx.pager.clone(),
    };
    output::write_diff(&diff, color, &target, out, services.pager).await?;
    Ok(())
}
