//! 代码仓库事件轮询器

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;

use super::{FilterDecision, PageLimits, SourcePoller};
use crate::error::RelayError;
use crate::notification::{Channel, MessageFormatter, NotificationMessage};
use crate::source::{CodeEventKind, ItemFetcher, RawItem};
use crate::stats::Counter;
use crate::watermark::source_key;

const BACKFILL_LIMIT: usize = 100;
const STEADY_PER_MINUTE: usize = 10;

/// 超过此时长的事件不再播报
const MAX_EVENT_AGE_HOURS: i64 = 24;

const ANNOUNCED_ISSUE_ACTIONS: &[&str] = &["opened", "closed", "reopened"];

pub struct CodeEventPoller {
    fetcher: Arc<dyn ItemFetcher>,
    formatter: Arc<MessageFormatter>,
    /// `owner/repo`
    repository: String,
    source_id: String,
    limits: PageLimits,
}

impl CodeEventPoller {
    pub fn new(
        fetcher: Arc<dyn ItemFetcher>,
        formatter: Arc<MessageFormatter>,
        repository: impl Into<String>,
        interval: Duration,
    ) -> Self {
        let repository = repository.into();
        Self {
            fetcher,
            formatter,
            source_id: source_key("code-events", &repository),
            repository,
            limits: PageLimits::scaled(BACKFILL_LIMIT, STEADY_PER_MINUTE, interval),
        }
    }
}

#[async_trait]
impl SourcePoller for CodeEventPoller {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    fn counter(&self) -> Counter {
        Counter::CodeEvents
    }

    fn limits(&self) -> PageLimits {
        self.limits
    }

    async fn fetch(&self, cursor_hint: Option<&str>, limit: usize) -> Result<Vec<RawItem>, RelayError> {
        self.fetcher.fetch(&self.repository, cursor_hint, limit).await
    }

    fn filter(&self, item: &RawItem, fetched_at: DateTime<Utc>) -> FilterDecision {
        let RawItem::CodeEvent(event) = item else {
            return FilterDecision::Suppress("not a code event");
        };

        if fetched_at - event.created_at > ChronoDuration::hours(MAX_EVENT_AGE_HOURS) {
            return FilterDecision::Suppress("older than 24h");
        }

        match &event.kind {
            CodeEventKind::Push { .. } | CodeEventKind::PullRequest { .. } => FilterDecision::Relay,
            CodeEventKind::Issues { action, .. } if ANNOUNCED_ISSUE_ACTIONS.contains(&action.as_str()) => {
                FilterDecision::Relay
            }
            CodeEventKind::Issues { .. } => FilterDecision::Suppress("issue action not announced"),
            CodeEventKind::Other(_) => FilterDecision::Suppress("unsupported event type"),
        }
    }

    fn format(&self, item: &RawItem) -> Option<NotificationMessage> {
        let RawItem::CodeEvent(event) = item else {
            return None;
        };

        let content = match &event.kind {
            CodeEventKind::Push { branch, commits } => {
                self.formatter.format_push(&event.actor, branch, commits)
            }
            CodeEventKind::Issues { action, title, url } => {
                self.formatter.format_issue(&event.actor, action, title, url)
            }
            // 拉取请求暂不播报
            CodeEventKind::PullRequest { .. } | CodeEventKind::Other(_) => return None,
        };

        Some(NotificationMessage::new(Channel::CodeEvents, content))
    }
}
