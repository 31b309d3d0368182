//! 通知渠道定义 - 逻辑频道、频道映射和投递 trait

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::error::RelayError;

/// 逻辑频道
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// 收件箱消息
    Inbox,
    /// 误报反馈
    FalsePositive,
    /// GitHub 事件
    CodeEvents,
    /// 多版块新帖
    StreamPosts,
    /// 版主变动
    ModActions,
    /// 统计与状态
    Stats,
}

impl Channel {
    pub const ALL: [Channel; 6] = [
        Channel::Inbox,
        Channel::FalsePositive,
        Channel::CodeEvents,
        Channel::StreamPosts,
        Channel::ModActions,
        Channel::Stats,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Inbox => "inbox",
            Channel::FalsePositive => "false_positive",
            Channel::CodeEvents => "code_events",
            Channel::StreamPosts => "stream_posts",
            Channel::ModActions => "mod_actions",
            Channel::Stats => "stats",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 逻辑频道 -> 具体频道 ID，启动时一次性解析
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelMap {
    ids: HashMap<Channel, String>,
}

impl ChannelMap {
    /// 每个逻辑频道都必须有映射
    pub fn resolve<F>(mut lookup: F) -> Result<Self, RelayError>
    where
        F: FnMut(Channel) -> Option<String>,
    {
        let mut ids = HashMap::new();
        let mut missing = Vec::new();

        for channel in Channel::ALL {
            match lookup(channel).filter(|id| !id.trim().is_empty()) {
                Some(id) => {
                    ids.insert(channel, id.trim().to_string());
                }
                None => missing.push(channel.as_str()),
            }
        }

        if !missing.is_empty() {
            return Err(RelayError::Config(format!(
                "discord channels not configured: {}",
                missing.join(", ")
            )));
        }

        Ok(Self { ids })
    }

    pub fn id(&self, channel: Channel) -> &str {
        // resolve() 保证所有频道都有映射
        self.ids.get(&channel).map(String::as_str).unwrap_or_default()
    }
}

/// 待投递的通知
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationMessage {
    pub channel: Channel,
    /// 已格式化的内容
    pub content: String,
}

impl NotificationMessage {
    pub fn new(channel: Channel, content: impl Into<String>) -> Self {
        Self {
            channel,
            content: content.into(),
        }
    }
}

/// 发送结果
#[derive(Debug, Clone, PartialEq)]
pub enum SendResult {
    /// 发送成功
    Sent,
    /// 跳过（dry-run 等）
    Skipped(String),
}

/// 消息平台投递接口
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// 渠道名称（用于日志）
    fn name(&self) -> &str;

    /// 验证凭据，返回登录的账号名
    async fn handshake(&self) -> Result<String, RelayError>;

    /// 投递到具体频道 ID
    async fn deliver(&self, channel_id: &str, content: &str) -> Result<(), RelayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_map_requires_every_channel() {
        let err = ChannelMap::resolve(|channel| match channel {
            Channel::Stats => None,
            Channel::Inbox => Some("  ".to_string()),
            other => Some(format!("{}-id", other)),
        })
        .unwrap_err();

        let text = err.to_string();
        assert!(text.contains("stats"));
        assert!(text.contains("inbox"));
        assert!(!text.contains("mod_actions"));
    }

    #[test]
    fn test_channel_map_lookup() {
        let map = ChannelMap::resolve(|channel| Some(format!("id-{}", channel))).unwrap();
        assert_eq!(map.id(Channel::ModActions), "id-mod_actions");
        assert_eq!(map.id(Channel::Stats), "id-stats");
    }
}
