//! 事件来源 - 原始条目类型和拉取适配器接口
//!
//! 适配器返回按时间倒序（最新在前）的一页条目。`cursor_hint` 只是分页提示，
//! 适配器可以忽略它，轮询器在页面重叠时依然保证正确。

pub mod github;
pub mod reddit;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::RelayError;

pub use github::GithubEvents;
pub use reddit::{RedditClient, RedditCredentials, RedditInbox, RedditModLog, RedditStream};

/// Reddit fullname 前缀对应的对象类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThingKind {
    Comment,
    Account,
    Link,
    Message,
    Subreddit,
    Award,
    PromoCampaign,
    Unknown,
}

impl ThingKind {
    /// 从 `t1_xxx` 形式的 fullname 解析类型
    pub fn from_fullname(fullname: &str) -> Self {
        match fullname.split('_').next().unwrap_or_default() {
            "t1" => Self::Comment,
            "t2" => Self::Account,
            "t3" => Self::Link,
            "t4" => Self::Message,
            "t5" => Self::Subreddit,
            "t6" => Self::Award,
            "t8" => Self::PromoCampaign,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Comment => "comment",
            Self::Account => "account",
            Self::Link => "link",
            Self::Message => "message",
            Self::Subreddit => "subreddit",
            Self::Award => "award",
            Self::PromoCampaign => "promocampaign",
            Self::Unknown => "item",
        }
    }
}

/// 收件箱消息（私信或评论回复）
#[derive(Debug, Clone, PartialEq)]
pub struct InboxMessage {
    /// fullname，如 `t1_abc123`
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub author: String,
    pub kind: ThingKind,
    /// 评论直接回复帖子（父级为 t3）
    pub is_root: bool,
    pub subject: String,
    pub body: String,
    pub permalink: String,
}

/// 多版块聚合流中的新帖子
#[derive(Debug, Clone, PartialEq)]
pub struct StreamSubmission {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub author: String,
    pub title: String,
    pub permalink: String,
}

/// 一次提交
#[derive(Debug, Clone, PartialEq)]
pub struct Commit {
    pub sha: String,
    pub author: String,
    pub message: String,
}

/// 代码仓库事件的具体类型
#[derive(Debug, Clone, PartialEq)]
pub enum CodeEventKind {
    Push {
        branch: String,
        commits: Vec<Commit>,
    },
    Issues {
        action: String,
        title: String,
        url: String,
    },
    PullRequest {
        action: String,
        title: String,
        url: String,
        merged: bool,
    },
    /// 未识别的事件类型，保留原始类型名
    Other(String),
}

/// 代码仓库事件
#[derive(Debug, Clone, PartialEq)]
pub struct CodeEvent {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub actor: String,
    pub kind: CodeEventKind,
}

/// 版务日志条目
#[derive(Debug, Clone, PartialEq)]
pub struct ModerationLogEntry {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub moderator: String,
    pub action: String,
    pub target: Option<String>,
    pub subreddit: String,
}

/// 无法解码的条目，只保留 ID，水位线仍可越过它
#[derive(Debug, Clone, PartialEq)]
pub struct UnreadableItem {
    pub id: String,
    pub created_at: Option<DateTime<Utc>>,
    pub reason: String,
}

/// 四种来源的原始条目
#[derive(Debug, Clone, PartialEq)]
pub enum RawItem {
    Inbox(InboxMessage),
    Submission(StreamSubmission),
    CodeEvent(CodeEvent),
    ModAction(ModerationLogEntry),
    Unreadable(UnreadableItem),
}

impl RawItem {
    pub fn id(&self) -> &str {
        match self {
            Self::Inbox(m) => &m.id,
            Self::Submission(s) => &s.id,
            Self::CodeEvent(e) => &e.id,
            Self::ModAction(a) => &a.id,
            Self::Unreadable(u) => &u.id,
        }
    }

    /// 创建时间；无法解码且来源未给出时间的条目为 `None`
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Inbox(m) => Some(m.created_at),
            Self::Submission(s) => Some(s.created_at),
            Self::CodeEvent(e) => Some(e.created_at),
            Self::ModAction(a) => Some(a.created_at),
            Self::Unreadable(u) => u.created_at,
        }
    }

    pub fn author(&self) -> &str {
        match self {
            Self::Inbox(m) => &m.author,
            Self::Submission(s) => &s.author,
            Self::CodeEvent(e) => &e.actor,
            Self::ModAction(a) => &a.moderator,
            Self::Unreadable(_) => "[unknown]",
        }
    }
}

/// 条目拉取适配器
#[async_trait]
pub trait ItemFetcher: Send + Sync {
    /// 拉取最多 `limit` 条，最新在前
    async fn fetch(
        &self,
        instance: &str,
        cursor_hint: Option<&str>,
        limit: usize,
    ) -> Result<Vec<RawItem>, RelayError>;

    /// 批次处理完成后确认条目（如标记已读），默认无操作
    async fn acknowledge(&self, _ids: &[String]) -> Result<(), RelayError> {
        Ok(())
    }
}
