//! 消息格式化模块 - 将原始条目转换为 Discord 通知文本
//!
//! 所有格式化函数都是纯函数：同一条目多次格式化得到完全相同的文本。

use chrono::{DateTime, Local};
use regex::Regex;

use crate::source::{Commit, InboxMessage, ModerationLogEntry, StreamSubmission, ThingKind};
use crate::stats::CounterSnapshot;

/// 通知文本中的固定片段
pub mod msg {
    pub const LINKS_HEADER: &str = "\r\n __*Links:*__\n";
    pub const PERMALINK_CONTEXT: &str = "?context=10";
    pub const POST_COMMENT: &str = "post comment";
    pub const COMMENT_REPLY: &str = "comment reply";
    pub const PUSH_FOOTER: &str = "\r\n---";
}

/// markdown 超链接 `[text](url)`
const MD_LINK_PATTERN: &str = r"(\[)([^\]()#\n]+)\]\(([^\]()#\n]+)\)";

/// 消息格式化器
pub struct MessageFormatter {
    /// 网络名称（版务通知标题）
    network_name: String,
    /// 仓库网页地址，如 `https://github.com/owner/repo`
    repo_url: String,
    md_link: Regex,
}

impl MessageFormatter {
    pub fn new(network_name: impl Into<String>, repo_url: impl Into<String>) -> Self {
        Self {
            network_name: network_name.into(),
            repo_url: repo_url.into().trim_end_matches('/').to_string(),
            md_link: Regex::new(MD_LINK_PATTERN).expect("markdown link pattern is valid"),
        }
    }

    /// 合并空行，把超链接替换为文字，并在末尾附上编号链接列表
    pub fn strip_links(&self, body: &str) -> String {
        let body = body.replace("\n\n", "\n");

        let links: Vec<String> = self
            .md_link
            .captures_iter(&body)
            .map(|caps| caps[3].to_string())
            .collect();

        if links.is_empty() {
            return body;
        }

        let mut stripped = self.md_link.replace_all(&body, "${2}").into_owned();
        stripped.push_str(msg::LINKS_HEADER);
        for (i, link) in links.iter().enumerate() {
            stripped.push_str(&format!("{}: {}\n", i + 1, link));
        }
        stripped
    }

    /// 收件箱消息分类标签
    pub fn inbox_label(message: &InboxMessage) -> &'static str {
        match message.kind {
            ThingKind::Comment if message.is_root => msg::POST_COMMENT,
            ThingKind::Comment => msg::COMMENT_REPLY,
            other => other.as_str(),
        }
    }

    pub fn format_inbox_message(&self, message: &InboxMessage) -> String {
        let body = self.strip_links(&message.body);

        let mut notification = format!(
            "New __{}__ from **/u/{}**: \n```\n{}\n```",
            Self::inbox_label(message),
            message.author,
            body
        );

        // 评论类消息附带上下文链接
        if message.kind == ThingKind::Comment {
            notification.push_str(&format!(
                "\n**Permalink:** {}{}\r\n ",
                message.permalink,
                msg::PERMALINK_CONTEXT
            ));
        }

        notification
    }

    pub fn format_false_positive(&self, message: &InboxMessage) -> String {
        format!(
            "New __false-positive__ report from **/u/{}**:\r\n{}\r\n ",
            message.author, message.permalink
        )
    }

    pub fn format_submission(&self, submission: &StreamSubmission) -> String {
        format!(
            "---\n**New __OC__** by **/u/{}**:\r\n{}",
            submission.author, submission.permalink
        )
    }

    pub fn format_push(&self, actor: &str, branch: &str, commits: &[Commit]) -> String {
        let mut message = format!("New Push to branch `{}` by **{}**:\r\n", branch, actor);

        for commit in commits {
            message.push_str(&format!(
                "\nCommit `{}` by `{}`:\n```\n{}```\n{}/commit/{}",
                commit.sha, commit.author, commit.message, self.repo_url, commit.sha
            ));
        }

        message.push_str(msg::PUSH_FOOTER);
        message
    }

    pub fn format_issue(&self, actor: &str, action: &str, title: &str, url: &str) -> String {
        format!(
            "GitHub Issue __{}__ by **{}**:\n```\n{}\n```\r\n**Link**: {}\n",
            action, actor, title, url
        )
    }

    /// 版主变动；不认识的动作返回 `None`
    pub fn format_mod_action(&self, entry: &ModerationLogEntry) -> Option<String> {
        let target = entry.target.as_deref().unwrap_or("[unknown]");
        let phrase = match entry.action.as_str() {
            "invitemoderator" => format!("invited /u/{} to be a moderator", target),
            "acceptmoderatorinvite" => "accepted a moderator invite".to_string(),
            "removemoderator" => format!("removed /u/{} as a moderator", target),
            _ => return None,
        };

        Some(format!(
            "__*{} Moderator Update*__:\r\n```\n/u/{} has {} for /r/{}\n```\r\n ",
            self.network_name, entry.moderator, phrase, entry.subreddit
        ))
    }

    pub fn format_stats(snapshot: &CounterSnapshot) -> String {
        format!(
            "Messages: **{}**\nMultireddit posts: **{}**\nGitHub Events: **{}**\nNetwork Modlog Actions: **{}**\r\n",
            snapshot.messages, snapshot.stream_posts, snapshot.code_events, snapshot.moderation_actions
        )
    }

    pub fn format_ready(at: DateTime<Local>) -> String {
        format!("Ready : {}", at.format("%Y-%m-%d %H:%M:%S"))
    }
}
