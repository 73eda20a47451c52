use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

pub const DEFAULT_SLACK_API_BASE: &str = "https://slack.com/api";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

// ---------------------------------------------------------------------------
// File layout — ~/.courier/config.toml
// ---------------------------------------------------------------------------

/// Optional on-disk configuration. Every field may be overridden by a CLI
/// flag or its environment variable.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub slack: SlackSection,
    pub sqlite: SqliteSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SlackSection {
    pub bot_token: Option<String>,
    pub team_id: Option<String>,
    pub api_base: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SqliteSection {
    pub path: Option<PathBuf>,
}

impl FileConfig {
    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).context("invalid config file")
    }

    /// Load the config file. An explicit path must exist; the default
    /// location is optional and yields an empty config when absent.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(p) => p.to_path_buf(),
            None => match default_config_path() {
                Some(p) if p.exists() => p,
                _ => return Ok(Self::default()),
            },
        };

        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        tracing::info!(path = %path.display(), "loaded config file");
        Self::parse(&text).with_context(|| format!("in {}", path.display()))
    }
}

/// `~/.courier/config.toml`, if a home directory can be determined.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".courier").join("config.toml"))
}

// ---------------------------------------------------------------------------
// Resolved settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SlackConfig {
    pub bot_token: String,
    pub team_id: String,
    pub api_base: String,
    pub timeout_secs: u64,
}

impl SlackConfig {
    /// Merge CLI/env values over the file section. Token and team ID are
    /// required.
    pub fn resolve(
        section: SlackSection,
        bot_token: Option<String>,
        team_id: Option<String>,
        api_base: Option<String>,
    ) -> Result<Self> {
        let bot_token = bot_token.or(section.bot_token).filter(|s| !s.is_empty());
        let team_id = team_id.or(section.team_id).filter(|s| !s.is_empty());

        let (Some(bot_token), Some(team_id)) = (bot_token, team_id) else {
            bail!("Please set SLACK_BOT_TOKEN and SLACK_TEAM_ID environment variables");
        };

        Ok(Self {
            bot_token,
            team_id,
            api_base: api_base
                .or(section.api_base)
                .unwrap_or_else(|| DEFAULT_SLACK_API_BASE.to_string()),
            timeout_secs: section.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
        })
    }
}

#[derive(Debug, Clone)]
pub struct SqliteConfig {
    pub path: PathBuf,
}

impl SqliteConfig {
    pub fn resolve(section: SqliteSection, path: Option<PathBuf>) -> Result<Self> {
        match path.or(section.path) {
            Some(path) => Ok(Self { path }),
            None => bail!("Please set SQLITE_DATABASE or [sqlite].path in the config file"),
        }
    }
}
