//! GitHub 适配器 - 仓库事件流
//!
//! `GET /repos/{owner}/{repo}/events`，事件 API 本身按时间倒序返回。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::{CodeEvent, CodeEventKind, Commit, ItemFetcher, RawItem};
use crate::error::RelayError;

const SERVICE: &str = "github";

/// GitHub API 基础 URL
pub const API_BASE: &str = "https://api.github.com";

/// 单页上限
const MAX_PAGE_SIZE: usize = 100;

#[derive(Debug, Deserialize)]
struct EventRecord {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    actor: Actor,
    created_at: DateTime<Utc>,
    #[serde(default)]
    payload: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct Actor {
    login: String,
}

#[derive(Debug, Deserialize)]
struct PushPayload {
    #[serde(rename = "ref")]
    git_ref: String,
    #[serde(default)]
    commits: Vec<CommitRecord>,
}

#[derive(Debug, Deserialize)]
struct CommitRecord {
    sha: String,
    author: CommitAuthor,
    message: String,
}

#[derive(Debug, Deserialize)]
struct CommitAuthor {
    name: String,
}

#[derive(Debug, Deserialize)]
struct IssuesPayload {
    action: String,
    issue: IssueRecord,
}

#[derive(Debug, Deserialize)]
struct IssueRecord {
    title: String,
    html_url: String,
}

#[derive(Debug, Deserialize)]
struct PullRequestPayload {
    action: String,
    pull_request: PullRequestRecord,
}

#[derive(Debug, Deserialize)]
struct PullRequestRecord {
    title: String,
    html_url: String,
    #[serde(default)]
    merged: Option<bool>,
}

impl From<EventRecord> for CodeEvent {
    fn from(record: EventRecord) -> Self {
        let kind = decode_kind(&record.event_type, record.payload).unwrap_or_else(|e| {
            // 载荷结构不认识时按未知类型处理，过滤阶段会跳过它
            warn!(event_id = %record.id, event_type = %record.event_type, error = %e, "Unrecognized GitHub event payload");
            CodeEventKind::Other(record.event_type.clone())
        });

        CodeEvent {
            id: record.id,
            created_at: record.created_at,
            actor: record.actor.login,
            kind,
        }
    }
}

fn decode_kind(event_type: &str, payload: serde_json::Value) -> Result<CodeEventKind, serde_json::Error> {
    let kind = match event_type {
        "PushEvent" => {
            let push: PushPayload = serde_json::from_value(payload)?;
            CodeEventKind::Push {
                branch: push.git_ref.trim_start_matches("refs/heads/").to_string(),
                commits: push
                    .commits
                    .into_iter()
                    .map(|c| Commit {
                        sha: c.sha,
                        author: c.author.name,
                        message: c.message,
                    })
                    .collect(),
            }
        }
        "IssuesEvent" => {
            let issues: IssuesPayload = serde_json::from_value(payload)?;
            CodeEventKind::Issues {
                action: issues.action,
                title: issues.issue.title,
                url: issues.issue.html_url,
            }
        }
        "PullRequestEvent" => {
            let pr: PullRequestPayload = serde_json::from_value(payload)?;
            CodeEventKind::PullRequest {
                action: pr.action,
                title: pr.pull_request.title,
                url: pr.pull_request.html_url,
                merged: pr.pull_request.merged.unwrap_or(false),
            }
        }
        other => CodeEventKind::Other(other.to_string()),
    };
    Ok(kind)
}

/// 仓库事件适配器（实例 = `owner/repo`）
pub struct GithubEvents {
    http: Client,
    token: Option<String>,
    api_base: String,
}

impl GithubEvents {
    pub fn new(token: Option<String>, user_agent: &str, timeout: Duration) -> Result<Self, RelayError> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent.to_string())
            .build()
            .map_err(|e| RelayError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            token: token.filter(|t| !t.is_empty()),
            api_base: API_BASE.to_string(),
        })
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }
}

#[async_trait]
impl ItemFetcher for GithubEvents {
    async fn fetch(
        &self,
        instance: &str,
        _cursor_hint: Option<&str>,
        limit: usize,
    ) -> Result<Vec<RawItem>, RelayError> {
        let url = format!("{}/repos/{}/events", self.api_base, instance);
        let per_page = limit.clamp(1, MAX_PAGE_SIZE);

        let mut request = self
            .http
            .get(&url)
            .header("Accept", "application/vnd.github+json")
            .query(&[("per_page", per_page.to_string())]);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| RelayError::from_reqwest(SERVICE, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RelayError::from_status(SERVICE, status, &body));
        }

        let records: Vec<EventRecord> = response
            .json()
            .await
            .map_err(|e| RelayError::from_reqwest(SERVICE, e))?;

        debug!(repo = %instance, received = records.len(), "Fetched GitHub events");

        Ok(records
            .into_iter()
            .take(limit)
            .map(|r| RawItem::CodeEvent(r.into()))
            .collect())
    }
}
