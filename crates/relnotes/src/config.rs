use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

const DEFAULT_CONFIG_NAME: &str = "relnotes.toml";
const DEFAULT_SLACK_API_URL: &str = "https://slack.com/api/";

pub const ENV_ORGANIZATION_URL: &str = "AZDO_ORGANIZATION_URL";
pub const ENV_PROJECT: &str = "AZDO_ORGANIZATION_PROJECT";
pub const ENV_AZDO_TOKEN: &str = "AZDO_TOKEN";
pub const ENV_SLACK_CHANNEL: &str = "SLACK_CHANNEL";
pub const ENV_SLACK_TOKEN: &str = "SLACK_TOKEN";
pub const ENV_BRANCH: &str = "BRANCH_NAME";

/// On-disk shape of `relnotes.toml`. Every field is optional here; the
/// environment may fill in whatever the file leaves out.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub branch: Option<String>,
    #[serde(default)]
    pub azure_devops: AzureDevOpsSection,
    #[serde(default)]
    pub slack: SlackSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AzureDevOpsSection {
    pub organization_url: Option<String>,
    pub project: Option<String>,
    /// Release Management endpoint, when it can't be derived from the org URL.
    pub release_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SlackSection {
    pub channel: Option<String>,
    pub api_url: Option<String>,
}

/// Values given on the command line. They win over env and file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub branch: Option<String>,
    pub channel: Option<String>,
}

/// A credential that never shows up in logs or `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Token(String);

impl Token {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token(***)")
    }
}

/// Fully resolved settings for one run. Built once, then only borrowed.
#[derive(Debug, Clone)]
pub struct Config {
    pub branch: String,
    pub azure_devops: AzureDevOpsConfig,
    pub slack: SlackConfig,
}

#[derive(Debug, Clone)]
pub struct AzureDevOpsConfig {
    pub organization_url: String,
    pub project: String,
    pub release_url: Option<String>,
    pub token: Token,
}

#[derive(Debug, Clone)]
pub struct SlackConfig {
    pub channel: String,
    pub api_url: String,
    /// Absent only when the run never talks to Slack (`--dry-run`).
    pub token: Option<Token>,
}

impl SlackConfig {
    pub fn token(&self) -> Result<&Token> {
        self.token
            .as_ref()
            .with_context(|| format!("Missing Slack token (set {ENV_SLACK_TOKEN})"))
    }
}

impl FileConfig {
    /// Load the config file from an explicit path, or search upward from the
    /// current dir and then the user config dir. Only an explicit path that
    /// doesn't exist is an error.
    pub fn load(path_override: Option<PathBuf>) -> Result<Self> {
        match path_override {
            Some(path) => Self::read(&path),
            None => match find_config_file(DEFAULT_CONFIG_NAME) {
                Some(path) => Self::read(&path),
                None => {
                    tracing::debug!("No {DEFAULT_CONFIG_NAME} found, using environment only");
                    Ok(Self::default())
                }
            },
        }
    }

    fn read(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Reading config file {}", path.display()))?;
        let cfg: FileConfig = toml::from_str(&contents)
            .with_context(|| format!("Parsing TOML config {}", path.display()))?;
        tracing::debug!(path = %path.display(), "Loaded config file");
        Ok(cfg)
    }
}

impl Config {
    /// Load from file and process environment.
    pub fn load(path_override: Option<PathBuf>, overrides: Overrides, require_slack_token: bool) -> Result<Self> {
        let file = FileConfig::load(path_override)?;
        Self::resolve(file, |key| std::env::var(key).ok(), overrides, require_slack_token)
    }

    /// Merge file, environment lookup and CLI overrides into a complete config.
    pub fn resolve<F>(file: FileConfig, env: F, overrides: Overrides, require_slack_token: bool) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let branch = required(overrides.branch.or_else(|| lookup(ENV_BRANCH)).or(file.branch), "branch", ENV_BRANCH)?;
        let organization_url = required(
            lookup(ENV_ORGANIZATION_URL).or(file.azure_devops.organization_url),
            "azure_devops.organization_url",
            ENV_ORGANIZATION_URL,
        )?;
        let project = required(
            lookup(ENV_PROJECT).or(file.azure_devops.project),
            "azure_devops.project",
            ENV_PROJECT,
        )?;
        let channel = required(
            overrides.channel.or_else(|| lookup(ENV_SLACK_CHANNEL)).or(file.slack.channel),
            "slack.channel",
            ENV_SLACK_CHANNEL,
        )?;

        let Some(azdo_token) = lookup(ENV_AZDO_TOKEN) else {
            bail!("Missing Azure DevOps token (set {ENV_AZDO_TOKEN})");
        };
        let slack_token = lookup(ENV_SLACK_TOKEN).map(Token::new);
        if require_slack_token && slack_token.is_none() {
            bail!("Missing Slack token (set {ENV_SLACK_TOKEN})");
        }

        Ok(Config {
            branch,
            azure_devops: AzureDevOpsConfig {
                organization_url,
                project,
                release_url: file.azure_devops.release_url,
                token: Token::new(azdo_token),
            },
            slack: SlackConfig {
                channel,
                api_url: file
                    .slack
                    .api_url
                    .unwrap_or_else(|| DEFAULT_SLACK_API_URL.to_string()),
                token: slack_token,
            },
        })
    }
}

fn required(value: Option<String>, key: &str, env: &str) -> Result<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => bail!("Missing setting '{key}' (set it in {DEFAULT_CONFIG_NAME} or via {env})"),
    }
}

fn find_config_file(file_name: &str) -> Option<PathBuf> {
    find_upwards(file_name).or_else(|| {
        let candidate = dirs::config_dir()?.join("relnotes").join(file_name);
        candidate.exists().then_some(candidate)
    })
}

fn find_upwards(file_name: &str) -> Option<PathBuf> {
    let mut dir = std::env::current_dir().ok()?;
    loop {
        let candidate = dir.join(file_name);
        if candidate.exists() {
            return Some(candidate);
        }
        if !dir.pop() {
            break;
        }
    }
    None
}
