//! 收件箱轮询器

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

use super::{FilterDecision, PageLimits, SourcePoller};
use crate::error::RelayError;
use crate::notification::{Channel, MessageFormatter, NotificationMessage};
use crate::source::{ItemFetcher, RawItem};
use crate::stats::Counter;
use crate::watermark::source_key;

const BACKFILL_LIMIT: usize = 100;
const STEADY_PER_MINUTE: usize = 25;

/// 不转发的作者
const IGNORED_AUTHORS: &[&str] = &["AutoModerator", "reddit"];

pub struct InboxPoller {
    fetcher: Arc<dyn ItemFetcher>,
    formatter: Arc<MessageFormatter>,
    source_id: String,
    limits: PageLimits,
}

impl InboxPoller {
    pub fn new(
        fetcher: Arc<dyn ItemFetcher>,
        formatter: Arc<MessageFormatter>,
        interval: Duration,
    ) -> Self {
        Self {
            fetcher,
            formatter,
            source_id: source_key("inbox", ""),
            limits: PageLimits::scaled(BACKFILL_LIMIT, STEADY_PER_MINUTE, interval),
        }
    }

    fn is_false_positive(body: &str) -> bool {
        body.to_lowercase().contains("false positive")
    }
}

#[async_trait]
impl SourcePoller for InboxPoller {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    fn counter(&self) -> Counter {
        Counter::Messages
    }

    fn limits(&self) -> PageLimits {
        self.limits
    }

    async fn fetch(&self, cursor_hint: Option<&str>, limit: usize) -> Result<Vec<RawItem>, RelayError> {
        self.fetcher.fetch("", cursor_hint, limit).await
    }

    fn filter(&self, item: &RawItem, _fetched_at: DateTime<Utc>) -> FilterDecision {
        let RawItem::Inbox(message) = item else {
            return FilterDecision::Suppress("not an inbox message");
        };

        if message.body == "remove" {
            FilterDecision::Suppress("removal command")
        } else if message.body.contains("mod removal") {
            FilterDecision::Suppress("mod removal notice")
        } else if message.subject.to_lowercase() == "please blacklist me" {
            FilterDecision::Suppress("blacklist request")
        } else if IGNORED_AUTHORS.contains(&message.author.as_str()) {
            FilterDecision::Suppress("ignored author")
        } else {
            FilterDecision::Relay
        }
    }

    fn format(&self, item: &RawItem) -> Option<NotificationMessage> {
        let RawItem::Inbox(message) = item else {
            return None;
        };

        if Self::is_false_positive(&message.body) {
            return Some(NotificationMessage::new(
                Channel::FalsePositive,
                self.formatter.format_false_positive(message),
            ));
        }

        Some(NotificationMessage::new(
            Channel::Inbox,
            self.formatter.format_inbox_message(message),
        ))
    }

    /// 整批标记已读，包括被过滤的条目
    async fn acknowledge(&self, batch: &[RawItem]) -> Result<(), RelayError> {
        let ids: Vec<String> = batch.iter().map(|item| item.id().to_string()).collect();
        self.fetcher.acknowledge(&ids).await
    }
}
