//! 版务日志轮询器 - 只播报版主变动

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

const ANNOUNCED_ACTIONS: &[&str] = &["invitemoderator", "acceptmoderatorinvite", "removemoderator"];

pub struct ModLogPoller {
    fetcher: Arc<dyn ItemFetcher>,
    formatter: Arc<MessageFormatter>,
    multireddit: String,
    source_id: String,
    limits: PageLimits,
}

impl ModLogPoller {
    pub fn new(
        fetcher: Arc<dyn ItemFetcher>,
        formatter: Arc<MessageFormatter>,
        owner: &str,
        multireddit: impl Into<String>,
        interval: Duration,
    ) -> Self {
        let multireddit = multireddit.into();
        Self {
            fetcher,
            formatter,
            source_id: source_key("modlog", &format!("{}/{}", owner, multireddit)),
            multireddit,
            limits: PageLimits::scaled(BACKFILL_LIMIT, STEADY_PER_MINUTE, interval),
        }
    }
}

#[async_trait]
impl SourcePoller for ModLogPoller {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    fn counter(&self) -> Counter {
        Counter::ModerationActions
    }

    fn limits(&self) -> PageLimits {
        self.limits
    }

    async fn fetch(&self, cursor_hint: Option<&str>, limit: usize) -> Result<Vec<RawItem>, RelayError> {
        self.fetcher.fetch(&self.multireddit, cursor_hint, limit).await
    }

    fn filter(&self, item: &RawItem, _fetched_at: DateTime<Utc>) -> FilterDecision {
        match item {
            RawItem::ModAction(entry) if ANNOUNCED_ACTIONS.contains(&entry.action.as_str()) => {
                FilterDecision::Relay
            }
            RawItem::ModAction(_) => FilterDecision::Suppress("routine moderation action"),
            _ => FilterDecision::Suppress("not a moderation log entry"),
        }
    }

    fn format(&self, item: &RawItem) -> Option<NotificationMessage> {
        let RawItem::ModAction(entry) = item else {
            return None;
        };
        self.formatter
            .format_mod_action(entry)
            .map(|content| NotificationMessage::new(Channel::ModActions, content))
    }
}
