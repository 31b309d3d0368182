//! 配置加载 - `~/.config/network-announcer/config.json` + 环境变量覆盖
//!
//! 配置文件示例：
//! ```json
//! {
//!   "reddit": { "username": "ImagesOfNetwork", "client_id": "...", "client_secret": "..." },
//!   "network": {
//!     "name": "ImagesOf",
//!     "multireddit_owner": "amici_ursi",
//!     "stream_multireddits": ["imagesofthestates", "imagesofcanada"],
//!     "modlog_multireddits": ["imagesofthestates"]
//!   },
//!   "github": { "owner": "amici-ursi", "repo": "ImagesOfNetwork" },
//!   "discord": {
//!     "token": "...",
//!     "channels": {
//!       "inbox": "1", "false_positive": "2", "code_events": "3",
//!       "stream_posts": "4", "mod_actions": "5", "stats": "6"
//!     }
//!   },
//!   "schedule": { "run_interval_secs": 120, "stats_interval_secs": 900 }
//! }
//! ```
//!
//! 凭据可以用环境变量覆盖：`REDDIT_USERNAME`、`REDDIT_PASSWORD`、
//! `REDDIT_CLIENT_ID`、`REDDIT_CLIENT_SECRET`、`GITHUB_TOKEN`、`DISCORD_TOKEN`。

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::error::RelayError;
use crate::notification::{Channel, ChannelMap};
use crate::source::RedditCredentials;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub reddit: RedditSection,
    pub network: NetworkSection,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub github: Option<GithubSection>,
    pub discord: DiscordSection,
    pub schedule: ScheduleSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedditSection {
    pub username: String,
    pub password: String,
    pub client_id: String,
    pub client_secret: String,
    pub user_agent: String,
}

impl Default for RedditSection {
    fn default() -> Self {
        Self {
            username: String::new(),
            password: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            user_agent: format!("network-announcer/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSection {
    /// 版务通知标题中的网络名称
    pub name: String,
    pub multireddit_owner: String,
    pub stream_multireddits: Vec<String>,
    pub modlog_multireddits: Vec<String>,
}

impl Default for NetworkSection {
    fn default() -> Self {
        Self {
            name: "ImagesOf".to_string(),
            multireddit_owner: String::new(),
            stream_multireddits: Vec::new(),
            modlog_multireddits: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GithubSection {
    pub owner: String,
    pub repo: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// GitHub Enterprise 等自建实例的 API 地址
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
}

impl GithubSection {
    /// `owner/repo`
    pub fn repository(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    pub fn web_url(&self) -> String {
        format!("https://github.com/{}", self.repository())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscordSection {
    pub token: String,
    pub channels: DiscordChannelIds,
}

/// 六个逻辑频道对应的 Discord 频道 ID
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscordChannelIds {
    pub inbox: String,
    pub false_positive: String,
    pub code_events: String,
    pub stream_posts: String,
    pub mod_actions: String,
    pub stats: String,
}

impl DiscordChannelIds {
    pub fn get(&self, channel: Channel) -> &str {
        match channel {
            Channel::Inbox => &self.inbox,
            Channel::FalsePositive => &self.false_positive,
            Channel::CodeEvents => &self.code_events,
            Channel::StreamPosts => &self.stream_posts,
            Channel::ModActions => &self.mod_actions,
            Channel::Stats => &self.stats,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleSection {
    pub run_interval_secs: u64,
    pub stats_interval_secs: u64,
    pub request_timeout_secs: u64,
    /// 握手失败的最大重试次数，缺省为无限
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_connect_attempts: Option<u32>,
}

impl Default for ScheduleSection {
    fn default() -> Self {
        Self {
            run_interval_secs: 120,
            stats_interval_secs: 900,
            request_timeout_secs: 30,
            max_connect_attempts: None,
        }
    }
}

impl RelayConfig {
    /// 默认配置路径
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".config/network-announcer/config.json"))
    }

    /// 读取配置文件并应用环境变量覆盖
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_path().context("Cannot determine home directory")?,
        };

        let mut config = Self::from_file(&path)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        debug!(path = %path.display(), "Loaded config file");
        Ok(config)
    }

    /// 非空的环境变量覆盖文件中的值
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("REDDIT_USERNAME") {
            self.reddit.username = v;
        }
        if let Some(v) = get("REDDIT_PASSWORD") {
            self.reddit.password = v;
        }
        if let Some(v) = get("REDDIT_CLIENT_ID") {
            self.reddit.client_id = v;
        }
        if let Some(v) = get("REDDIT_CLIENT_SECRET") {
            self.reddit.client_secret = v;
        }
        if let Some(v) = get("DISCORD_TOKEN") {
            self.discord.token = v;
        }
        // 未配置仓库时不启用 GitHub 来源
        if let (Some(github), Some(v)) = (self.github.as_mut(), get("GITHUB_TOKEN")) {
            github.token = Some(v);
        }
    }

    /// 检查必填项，一次性列出所有缺失字段
    pub fn validate(&self) -> Result<(), RelayError> {
        let mut missing = Vec::new();

        let required = [
            ("reddit.username", &self.reddit.username),
            ("reddit.password", &self.reddit.password),
            ("reddit.client_id", &self.reddit.client_id),
            ("reddit.client_secret", &self.reddit.client_secret),
            ("network.multireddit_owner", &self.network.multireddit_owner),
            ("discord.token", &self.discord.token),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                missing.push(name.to_string());
            }
        }

        if let Some(github) = &self.github {
            if github.owner.trim().is_empty() || github.repo.trim().is_empty() {
                missing.push("github.owner/github.repo".to_string());
            }
        }

        for channel in Channel::ALL {
            if self.discord.channels.get(channel).trim().is_empty() {
                missing.push(format!("discord.channels.{}", channel.as_str()));
            }
        }

        if !missing.is_empty() {
            return Err(RelayError::Config(format!("missing required settings: {}", missing.join(", "))));
        }

        if self.schedule.run_interval_secs == 0 || self.schedule.stats_interval_secs == 0 {
            return Err(RelayError::Config("schedule intervals must be positive".to_string()));
        }

        Ok(())
    }

    pub fn channel_map(&self) -> Result<ChannelMap, RelayError> {
        ChannelMap::resolve(|channel| Some(self.discord.channels.get(channel).to_string()))
    }

    pub fn reddit_credentials(&self) -> RedditCredentials {
        RedditCredentials {
            username: self.reddit.username.clone(),
            password: self.reddit.password.clone(),
            client_id: self.reddit.client_id.clone(),
            client_secret: self.reddit.client_secret.clone(),
            user_agent: self.reddit.user_agent.clone(),
        }
    }

    pub fn run_interval(&self) -> Duration {
        Duration::from_secs(self.schedule.run_interval_secs)
    }

    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.schedule.stats_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.schedule.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn complete() -> RelayConfig {
        let mut config = RelayConfig::default();
        config.reddit.username = "bot".into();
        config.reddit.password = "pw".into();
        config.reddit.client_id = "id".into();
        config.reddit.client_secret = "secret".into();
        config.network.multireddit_owner = "owner".into();
        config.discord.token = "token".into();
        config.discord.channels = DiscordChannelIds {
            inbox: "1".into(),
            false_positive: "2".into(),
            code_events: "3".into(),
            stream_posts: "4".into(),
            mod_actions: "5".into(),
            stats: "6".into(),
        };
        config
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"network": {"multireddit_owner": "amici_ursi"}}"#).unwrap();

        let config = RelayConfig::from_file(&path).unwrap();

        assert_eq!(config.network.name, "ImagesOf");
        assert_eq!(config.network.multireddit_owner, "amici_ursi");
        assert_eq!(config.run_interval(), Duration::from_secs(120));
        assert_eq!(config.stats_interval(), Duration::from_secs(900));
        assert!(config.github.is_none());
        assert!(config.reddit.user_agent.starts_with("network-announcer/"));
    }

    #[test]
    fn test_missing_file_reports_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.json");
        let err = RelayConfig::from_file(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("absent.json"));
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(RelayConfig::from_file(&path).is_err());
    }

    #[test]
    fn test_env_overrides_secrets() {
        let mut config = complete();
        config.github = Some(GithubSection {
            owner: "o".into(),
            repo: "r".into(),
            token: None,
            api_base: None,
        });
        let env: HashMap<&str, &str> = [
            ("DISCORD_TOKEN", "from-env"),
            ("REDDIT_PASSWORD", ""),
            ("GITHUB_TOKEN", "gh"),
        ]
        .into_iter()
        .collect();

        config.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.discord.token, "from-env");
        assert_eq!(config.reddit.password, "pw");
        assert_eq!(config.github.unwrap().token.as_deref(), Some("gh"));
    }

    #[test]
    fn test_github_token_ignored_without_repository() {
        let mut config = complete();
        config.apply_env(|key| (key == "GITHUB_TOKEN").then(|| "gh".to_string()));
        assert!(config.github.is_none());
    }

    #[test]
    fn test_validate_lists_every_missing_setting() {
        let mut config = complete();
        assert!(config.validate().is_ok());

        config.reddit.client_secret.clear();
        config.discord.channels.stats.clear();
        let message = config.validate().unwrap_err().to_string();
        assert!(message.contains("reddit.client_secret"));
        assert!(message.contains("discord.channels.stats"));
    }

    #[test]
    fn test_channel_map_resolves_all_channels() {
        let map = complete().channel_map().unwrap();
        assert_eq!(map.id(Channel::FalsePositive), "2");
        assert_eq!(map.id(Channel::Stats), "6");
    }

    #[test]
    fn test_github_urls() {
        let github = GithubSection {
            owner: "amici-ursi".into(),
            repo: "ImagesOfNetwork".into(),
            token: None,
            api_base: None,
        };
        assert_eq!(github.repository(), "amici-ursi/ImagesOfNetwork");
        assert_eq!(github.web_url(), "https://github.com/amici-ursi/ImagesOfNetwork");
    }
}
