mod api;
mod color;
mod command;
mod config;
mod git;
mod output;
mod pr;

use std::io::IsTerminal;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tracing::{debug, info_span, Instrument};
use tracing_subscriber::EnvFilter;

use api::{GitHubClient, ReqwestTransport};
use color::ColorMode;
use command::{CommandError, InvocationContext, Services};
use git::GitWorkspace;
use output::SystemPager;

/// ghpr: work with GitHub Pull Requests from the terminal.
#[derive(Parser, Debug)]
#[command(name = "ghpr", version, about)]
struct Cli {
    /// Select another repository using the OWNER/REPO format
    #[arg(short = 'R', long, global = true)]
    repo: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// View changes in a pull request
    ///
    /// Without an argument, the pull request that belongs to the current
    /// branch is selected.
    Diff(DiffArgs),
}

#[derive(Args, Debug)]
struct DiffArgs {
    /// Pull request number, URL or branch name
    selector: Option<String>,

    /// Use color in diff output: always, never or auto
    #[arg(long, value_name = "WHEN", default_value = "auto")]
    color: String,
}

#[derive(Debug, thiserror::Error)]
enum AppError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Command(#[from] CommandError),
}

#[tokio::main]
async fn main() -> ExitCode {
    let stderr_is_tty = std::io::stderr().is_terminal();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .with_ansi(stderr_is_tty)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli, stderr_is_tty).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, stderr_is_tty: bool) -> Result<(), AppError> {
    let Commands::Diff(args) = cli.command;
    let stdout_is_tty = std::io::stdout().is_terminal();
    let config = load_config(&args.color, stdout_is_tty, Path::new(".ghpr.toml"))?;
    debug!(host = config.host(), "loaded configuration");

    let span = info_span!("pr_diff", selector = ?args.selector);

    let ctx = InvocationContext {
        selector: args.selector,
        color: args.color,
        stdout_is_tty,
        stderr_is_tty,
        pager: config.pager_command(std::env::var("PAGER").ok()),
    };

    let client = GitHubClient::new(Arc::new(ReqwestTransport::new()), config.host(), config.github_token());
    let workspace = GitWorkspace::new(cli.repo.or_else(|| config.github.repo.clone()), config.host());
    let services = Services {
        client: &client,
        workspace: &workspace,
        pager: &SystemPager,
    };

    let mut stdout = std::io::stdout();
    command::run_diff(&ctx, &services, &mut stdout)
        .instrument(span)
        .await?;
    Ok(())
}

/// A bad `--color` value is reported before the config file is read, so it
/// wins over a broken `.ghpr.toml`.
fn load_config(color: &str, stdout_is_tty: bool, path: &Path) -> Result<config::Config, AppError> {
    ColorMode::resolve(color, stdout_is_tty).map_err(CommandError::from)?;
    Ok(config::Config::load_if_present(path)?)
}
