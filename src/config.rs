use serde::Deserialize;
use std::fs;
use std::path::Path;
use thiserror::Error;

pub const DEFAULT_HOST: &str = "github.com";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level configuration loaded from .ghpr.toml.
/// All fields are optional; the tool works with zero config.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub github: GitHubConfig,

    #[serde(default)]
    pub pager: PagerConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GitHubConfig {
    /// GitHub API token. If None, falls back to GITHUB_TOKEN / GH_TOKEN.
    pub token: Option<String>,
    /// Hostname of the GitHub instance (github.com or an Enterprise host)
    pub host: Option<String>,
    /// Default repository as OWNER/REPO, used when --repo is not given
    pub repo: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PagerConfig {
    /// Pager used when the PAGER environment variable is unset
    pub command: Option<String>,
}

impl Config {
    /// Load configuration from .ghpr.toml in the current directory.
    /// Returns default config if the file doesn't exist.
    pub fn load() -> Result<Config, ConfigError> {
        Self::load_if_present(Path::new(".ghpr.toml"))
    }

    /// Load from `path` when it exists, otherwise the default config.
    pub fn load_if_present(path: &Path) -> Result<Config, ConfigError> {
        if path.exists() {
            Self::load_from(path)
        } else {
            Ok(Config::default())
        }
    }

    /// Load from a specific path (useful for testing).
    pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Resolve the GitHub token: config file value takes precedence,
    /// then GITHUB_TOKEN, then GH_TOKEN.
    pub fn github_token(&self) -> Option<String> {
        self.github
            .token
            .clone()
            .or_else(|| std::env::var("GITHUB_TOKEN").ok())
            .or_else(|| std::env::var("GH_TOKEN").ok())
            .filter(|token| !token.is_empty())
    }

    pub fn host(&self) -> &str {
        self.github.host.as_deref().unwrap_or(DEFAULT_HOST)
    }

    /// Pick the pager command from the environment value, falling back to
    /// the config file. A PAGER that is set but empty disables paging.
    pub fn pager_command(&self, env_pager: Option<String>) -> Option<String> {
        env_pager
            .or_else(|| self.pager.command.clone())
            .map(|cmd| cmd.trim().to_string())
            .filter(|cmd| !cmd.is_empty())
    }
}
