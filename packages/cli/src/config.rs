use std::{path::PathBuf, time::Duration};

use clap::Args;
use thiserror::Error;
use url::Url;
use ycnotice::FeedConfig;
use ycnotice_discord::GradeRoles;

/// Settings shared by every command. Each one can also come from the
/// environment or a `.env` file.
#[derive(Debug, Clone, Default, Args)]
pub struct ConfigArgs {
    /// Discord bot token.
    #[arg(long, env = "DISCORD_TOKEN", hide_env_values = true)]
    pub discord_token: Option<String>,

    /// Listing page of the school notice board.
    #[arg(long, env = "SCHOOL_NOTICE_URL")]
    pub school_notice_url: Option<String>,

    /// Listing page of the department notice board.
    #[arg(long, env = "DEPT_NOTICE_URL")]
    pub dept_notice_url: Option<String>,

    #[arg(long, env = "SCHOOL_NOTICE_CHANNEL_ID")]
    pub school_notice_channel_id: Option<u64>,

    #[arg(long, env = "DEPT_NOTICE_CHANNEL_ID")]
    pub dept_notice_channel_id: Option<u64>,

    /// Seconds between two polls of a board.
    #[arg(long, env = "CHECK_INTERVAL_SECONDS", default_value_t = 3600)]
    pub check_interval_seconds: u64,

    /// Newest notices read from a board per poll.
    #[arg(long, env = "NOTICE_LIMIT", default_value_t = FeedConfig::DEFAULT_LIMIT)]
    pub notice_limit: usize,

    /// Where the last announced notice ids are kept.
    #[arg(long, env = "STATE_FILE", default_value = "state.json")]
    pub state_file: PathBuf,

    /// Where the id of the role selection message is kept.
    #[arg(long, env = "ROLE_STATE_FILE", default_value = "role_state.json")]
    pub role_state_file: PathBuf,

    #[arg(long, env = "ROLE_CHANNEL_ID")]
    pub role_channel_id: Option<u64>,

    #[arg(long = "role-id-1", env = "ROLE_ID_1")]
    pub role_id_1: Option<u64>,
    #[arg(long = "role-id-2", env = "ROLE_ID_2")]
    pub role_id_2: Option<u64>,
    #[arg(long = "role-id-3", env = "ROLE_ID_3")]
    pub role_id_3: Option<u64>,
    #[arg(long = "role-id-4", env = "ROLE_ID_4")]
    pub role_id_4: Option<u64>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },

    #[error(
        "No notice board is configured: set SCHOOL_NOTICE_URL with SCHOOL_NOTICE_CHANNEL_ID, or DEPT_NOTICE_URL with DEPT_NOTICE_CHANNEL_ID"
    )]
    NoFeeds,
}

/// Everything `run` needs, checked up front.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub token: String,
    pub feeds: Vec<FeedConfig>,
    pub interval: Duration,
    pub state_file: PathBuf,
    pub roles: Option<RoleConfig>,
}

#[derive(Debug, Clone)]
pub struct RoleConfig {
    pub channel_id: u64,
    pub roles: GradeRoles,
    pub state_file: PathBuf,
}

impl ConfigArgs {
    pub fn token(&self) -> Result<&str, ConfigError> {
        self.discord_token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(ConfigError::Missing("DISCORD_TOKEN"))
    }

    /// Boards that have both a listing URL and a channel.
    pub fn feeds(&self) -> Result<Vec<FeedConfig>, ConfigError> {
        type Make = fn(Url, u64) -> FeedConfig;
        let boards = [
            (
                "SCHOOL_NOTICE_URL",
                &self.school_notice_url,
                self.school_notice_channel_id,
                FeedConfig::school as Make,
            ),
            (
                "DEPT_NOTICE_URL",
                &self.dept_notice_url,
                self.dept_notice_channel_id,
                FeedConfig::dept as Make,
            ),
        ];

        let mut feeds = Vec::new();
        for (name, url, channel_id, make) in boards {
            let url = url.as_deref().map(str::trim).filter(|url| !url.is_empty());
            match (url, channel_id) {
                (Some(url), Some(channel_id)) => {
                    let url = parse_url(name, url)?;
                    feeds.push(make(url, channel_id).with_limit(self.notice_limit));
                }
                (None, None) => {}
                _ => tracing::warn!(board = name, "board has only one of URL and channel, skipping"),
            }
        }
        Ok(feeds)
    }

    pub fn interval(&self) -> Result<Duration, ConfigError> {
        if self.check_interval_seconds == 0 {
            return Err(ConfigError::Invalid {
                name: "CHECK_INTERVAL_SECONDS",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(Duration::from_secs(self.check_interval_seconds))
    }

    pub fn grade_roles(&self) -> Result<GradeRoles, ConfigError> {
        let role = |id: Option<u64>, name| id.ok_or(ConfigError::Missing(name));
        Ok(GradeRoles::new([
            role(self.role_id_1, "ROLE_ID_1")?,
            role(self.role_id_2, "ROLE_ID_2")?,
            role(self.role_id_3, "ROLE_ID_3")?,
            role(self.role_id_4, "ROLE_ID_4")?,
        ]))
    }

    pub fn school_list_url(&self) -> Result<Url, ConfigError> {
        let url = self
            .school_notice_url
            .as_deref()
            .ok_or(ConfigError::Missing("SCHOOL_NOTICE_URL"))?;
        parse_url("SCHOOL_NOTICE_URL", url)
    }

    pub fn run_config(&self) -> Result<RunConfig, ConfigError> {
        let token = self.token()?.to_string();
        let feeds = self.feeds()?;
        if feeds.is_empty() {
            return Err(ConfigError::NoFeeds);
        }
        let roles = match self.role_channel_id {
            Some(channel_id) => Some(RoleConfig {
                channel_id,
                roles: self.grade_roles()?,
                state_file: self.role_state_file.clone(),
            }),
            None => None,
        };

        Ok(RunConfig {
            token,
            feeds,
            interval: self.interval()?,
            state_file: self.state_file.clone(),
            roles,
        })
    }
}

fn parse_url(name: &'static str, url: &str) -> Result<Url, ConfigError> {
    let parsed = Url::parse(url.trim()).map_err(|e| ConfigError::Invalid {
        name,
        reason: e.to_string(),
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::Invalid {
            name,
            reason: format!("unsupported scheme {}", parsed.scheme()),
        });
    }
    Ok(parsed)
}
