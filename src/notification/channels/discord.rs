//! Discord 渠道 - 通过 Bot REST API 发送消息

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

use crate::error::RelayError;
use crate::notification::channel::NotificationSink;

const SERVICE: &str = "discord";

/// Discord API 基础 URL
pub const DISCORD_API_BASE: &str = "https://discord.com/api/v10";

/// 单条消息字符上限
pub const MESSAGE_LIMIT: usize = 2000;

/// Discord 渠道配置
#[derive(Debug, Clone)]
pub struct DiscordConfig {
    /// Bot token
    pub token: String,
    /// API 基础 URL
    pub api_base: String,
    /// 超时时间 (秒)
    pub timeout_secs: u64,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            api_base: DISCORD_API_BASE.to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Serialize)]
struct CreateMessage<'a> {
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct CurrentUser {
    username: String,
}

/// Discord 渠道
#[derive(Debug)]
pub struct DiscordChannel {
    client: Client,
    config: DiscordConfig,
}

impl DiscordChannel {
    pub fn new(config: DiscordConfig) -> Result<Self, RelayError> {
        if config.token.is_empty() {
            return Err(RelayError::Config("discord token is required".to_string()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RelayError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn auth_header(&self) -> String {
        format!("Bot {}", self.config.token)
    }

    async fn post_message(&self, channel_id: &str, content: &str) -> Result<(), RelayError> {
        let url = format!("{}/channels/{}/messages", self.config.api_base, channel_id);

        let response = self
            .client
            .post(&url)
            .header("Authorization", self.auth_header())
            .json(&CreateMessage { content })
            .send()
            .await
            .map_err(|e| RelayError::from_reqwest(SERVICE, e))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(RelayError::from_status(SERVICE, status, &body))
        }
    }
}

#[async_trait]
impl NotificationSink for DiscordChannel {
    fn name(&self) -> &str {
        "discord"
    }

    async fn handshake(&self) -> Result<String, RelayError> {
        let url = format!("{}/users/@me", self.config.api_base);

        let response = self
            .client
            .get(&url)
            .header("Authorization", self.auth_header())
            .send()
            .await
            .map_err(|e| RelayError::from_reqwest(SERVICE, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RelayError::from_status(SERVICE, status, &body));
        }

        let user: CurrentUser = response
            .json()
            .await
            .map_err(|e| RelayError::from_reqwest(SERVICE, e))?;

        info!(user = %user.username, "[Discord] Logged in");
        Ok(user.username)
    }

    async fn deliver(&self, channel_id: &str, content: &str) -> Result<(), RelayError> {
        for chunk in split_message(content, MESSAGE_LIMIT) {
            self.post_message(channel_id, &chunk).await?;
        }
        Ok(())
    }
}

/// 按行切分超长消息，单行超长时按字符硬切
pub fn split_message(content: &str, limit: usize) -> Vec<String> {
    if content.chars().count() <= limit {
        return vec![content.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in content.split_inclusive('\n') {
        let line_len = line.chars().count();

        if current_len + line_len > limit && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if line_len > limit {
            let chars: Vec<char> = line.chars().collect();
            for piece in chars.chunks(limit) {
                chunks.push(piece.iter().collect());
            }
            continue;
        }

        current.push_str(line);
        current_len += line_len;
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}
