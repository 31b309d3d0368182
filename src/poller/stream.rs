//! 多版块新帖流轮询器

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

const BACKFILL_LIMIT: usize = 125;
const STEADY_PER_MINUTE: usize = 25;

pub struct StreamPoller {
    fetcher: Arc<dyn ItemFetcher>,
    formatter: Arc<MessageFormatter>,
    multireddit: String,
    /// 机器人自己的账号，其帖子不转发
    own_account: String,
    source_id: String,
    limits: PageLimits,
}

impl StreamPoller {
    pub fn new(
        fetcher: Arc<dyn ItemFetcher>,
        formatter: Arc<MessageFormatter>,
        multireddit: impl Into<String>,
        own_account: impl Into<String>,
        interval: Duration,
    ) -> Self {
        let multireddit = multireddit.into();
        Self {
            fetcher,
            formatter,
            source_id: source_key("stream", &multireddit),
            multireddit,
            own_account: own_account.into(),
            limits: PageLimits::scaled(BACKFILL_LIMIT, STEADY_PER_MINUTE, interval),
        }
    }
}

#[async_trait]
impl SourcePoller for StreamPoller {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    fn counter(&self) -> Counter {
        Counter::StreamPosts
    }

    fn limits(&self) -> PageLimits {
        self.limits
    }

    async fn fetch(&self, cursor_hint: Option<&str>, limit: usize) -> Result<Vec<RawItem>, RelayError> {
        self.fetcher.fetch(&self.multireddit, cursor_hint, limit).await
    }

    fn filter(&self, item: &RawItem, _fetched_at: DateTime<Utc>) -> FilterDecision {
        match item {
            RawItem::Submission(post) if post.author.eq_ignore_ascii_case(&self.own_account) => {
                FilterDecision::Suppress("own post")
            }
            RawItem::Submission(_) => FilterDecision::Relay,
            _ => FilterDecision::Suppress("not a submission"),
        }
    }

    fn format(&self, item: &RawItem) -> Option<NotificationMessage> {
        match item {
            RawItem::Submission(post) => Some(NotificationMessage::new(
                Channel::StreamPosts,
                self.formatter.format_submission(post),
            )),
            _ => None,
        }
    }
}
