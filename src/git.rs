use std::path::PathBuf;
use std::process::Command;

use thiserror::Error;
use tracing::debug;

use crate::pr::RepoId;

#[derive(Debug, Error)]
pub enum GitError {
    #[error("failed to run git: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("git {args} failed: {stderr}")]
    Failed {
        args: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("could not determine current branch: HEAD is detached")]
    DetachedHead,

    #[error("could not determine base repository from remote \"{remote}\": {url}")]
    UnrecognizedRemote { remote: String, url: String },

    #[error("invalid repository: {0}")]
    InvalidRepo(String),
}

/// Where the command learns which repository and branch it runs against.
pub trait Workspace: Send + Sync {
    fn base_repo(&self) -> Result<RepoId, GitError>;
    fn current_branch(&self) -> Result<String, GitError>;
}

/// Reads the repository and branch from the local git checkout, unless a
/// repository was named explicitly.
pub struct GitWorkspace {
    repo_override: Option<String>,
    host: String,
    remote: String,
    dir: Option<PathBuf>,
}

impl GitWorkspace {
    pub fn new(repo_override: Option<String>, host: impl Into<String>) -> Self {
        Self {
            repo_override,
            host: host.into(),
            remote: "origin".to_string(),
            dir: None,
        }
    }

    /// Run git in `dir` instead of the process working directory.
    #[cfg(test)]
    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = Some(dir.into());
        self
    }

    fn git(&self, args: &[&str]) -> Result<String, GitError> {
        let mut git = Command::new("git");
        git.args(args);
        if let Some(dir) = &self.dir {
            git.current_dir(dir);
        }
        let output = git.output()?;
        if !output.status.success() {
            return Err(GitError::Failed {
                args: args.join(" "),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl Workspace for GitWorkspace {
    fn base_repo(&self) -> Result<RepoId, GitError> {
        if let Some(repo) = &self.repo_override {
            return repo.parse().map_err(GitError::InvalidRepo);
        }

        let url = self.git(&["remote", "get-url", self.remote.as_str()])?;
        debug!(remote = %self.remote, %url, "read git remote");
        parse_remote_url(&url, &self.host).ok_or_else(|| GitError::UnrecognizedRemote {
            remote: self.remote.clone(),
            url,
        })
    }

    fn current_branch(&self) -> Result<String, GitError> {
        branch_from_symbolic_ref(self.git(&["symbolic-ref", "--quiet", "--short", "HEAD"]))
    }
}

/// `symbolic-ref --quiet` exits 1 without output when HEAD is not a branch;
/// every other failure (not a repository, missing git) is passed on as is.
fn branch_from_symbolic_ref(result: Result<String, GitError>) -> Result<String, GitError> {
    match result {
        Ok(branch) if !branch.is_empty() => Ok(branch),
        Ok(_) => Err(GitError::DetachedHead),
        Err(GitError::Failed {
            code: Some(1),
            ref stderr,
            ..
        }) if stderr.is_empty() => Err(GitError::DetachedHead),
        Err(err) => Err(err),
    }
}

/// Extract OWNER/REPO from a remote URL on `host`. Accepts
/// `git@host:OWNER/REPO.git`, `ssh://git@host/OWNER/REPO.git` and
/// `https://host/OWNER/REPO(.git)`.
pub fn parse_remote_url(url: &str, host: &str) -> Option<RepoId> {
    let url = url.trim();
    let (url_host, path) = if let Some((scheme, rest)) = url.split_once("://") {
        if !matches!(scheme, "https" | "http" | "ssh" | "git") {
            return None;
        }
        rest.split_once('/')?
    } else {
        // scp-like syntax: [user@]host:path
        url.split_once(':')?
    };

    let url_host = url_host.rsplit('@').next()?;
    let url_host = url_host.split(':').next()?;
    if !url_host.eq_ignore_ascii_case(host) {
        return None;
    }

    let path = path.trim_matches('/');
    let path = path.strip_suffix(".git").unwrap_or(path);
    path.parse().ok()
}
