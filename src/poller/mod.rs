//! 来源轮询器 - 基于水位线的增量拉取、过滤、格式化和投递
//!
//! 四种轮询器共享同一套流程（[`poll_source`]）：
//! 1. 水位线为空时使用较大的回填页长，否则使用与轮询间隔成比例的稳态页长
//! 2. 拉取一页（最新在前），把上一次的水位线作为分页提示传给适配器
//! 3. 从最新往旧遍历，遇到水位线条目或比水位线更旧的条目即停止，得到本批新条目
//! 4. 反转为从旧到新，逐条过滤、格式化、投递；投递失败立即中止本批，
//!    无法解码的条目直接跳过
//! 5. 整批成功后把水位线设为本页最新条目的 ID 和创建时间
//! 6. 按本批条目数累加计数器

pub mod code_events;
pub mod inbox;
pub mod modlog;
pub mod stream;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::RelayError;
use crate::notification::{NotificationDispatcher, NotificationMessage, SendResult};
use crate::source::RawItem;
use crate::stats::{Counter, CycleCounters};
use crate::watermark::{Watermark, WatermarkStore};

pub use code_events::CodeEventPoller;
pub use inbox::InboxPoller;
pub use modlog::ModLogPoller;
pub use stream::StreamPoller;

/// 单个条目的过滤结论
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterDecision {
    Relay,
    Suppress(&'static str),
}

impl FilterDecision {
    pub fn is_suppressed(&self) -> bool {
        matches!(self, Self::Suppress(_))
    }
}

/// 回填页长和稳态页长
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub backfill: usize,
    pub steady: usize,
}

impl PageLimits {
    /// 稳态页长 = 每分钟条目数 × 轮询间隔（分钟），至少为 1
    pub fn scaled(backfill: usize, per_minute: usize, interval: Duration) -> Self {
        let minutes = interval.as_secs_f64() / 60.0;
        let steady = (per_minute as f64 * minutes).round().max(1.0) as usize;
        Self { backfill, steady }
    }

    pub fn limit_for(&self, watermark: Option<&str>) -> usize {
        match watermark {
            None => self.backfill,
            Some(_) => self.steady,
        }
    }
}

/// 一次轮询的结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollReport {
    pub source_id: String,
    /// 本页原始条目数
    pub fetched: usize,
    /// 水位线之前的新条目数
    pub observed: usize,
    pub dispatched: usize,
    pub suppressed: usize,
    pub watermark: Option<String>,
}

/// 单个来源实例的轮询器
#[async_trait]
pub trait SourcePoller: Send + Sync {
    /// 稳定的来源 ID（水位线键）
    fn source_id(&self) -> &str;

    fn counter(&self) -> Counter;

    fn limits(&self) -> PageLimits;

    async fn fetch(&self, cursor_hint: Option<&str>, limit: usize) -> Result<Vec<RawItem>, RelayError>;

    fn filter(&self, item: &RawItem, fetched_at: DateTime<Utc>) -> FilterDecision;

    /// 返回 `None` 表示该条目没有可发送的格式（等同于静默跳过）
    fn format(&self, item: &RawItem) -> Option<NotificationMessage>;

    /// 整批处理完成后调用
    async fn acknowledge(&self, _batch: &[RawItem]) -> Result<(), RelayError> {
        Ok(())
    }
}

/// 从最新往旧取，直到遇到水位线条目或严格早于水位线时间的条目（不含）
///
/// 水位线条目被删除后 ID 不再出现，此时靠时间截断。
pub fn unseen_prefix<'a>(page: &'a [RawItem], watermark: Option<&Watermark>) -> &'a [RawItem] {
    let Some(watermark) = watermark else {
        return page;
    };
    let end = page
        .iter()
        .position(|item| {
            item.id() == watermark.id
                || matches!(
                    (item.created_at(), watermark.created_at),
                    (Some(item_at), Some(mark_at)) if item_at < mark_at
                )
        })
        .unwrap_or(page.len());
    &page[..end]
}

/// 执行一次完整轮询
///
/// 投递失败时返回错误，水位线和计数器保持不变，下一轮会重新看到整批条目。
pub async fn poll_source(
    poller: &dyn SourcePoller,
    watermarks: &mut WatermarkStore,
    dispatcher: &NotificationDispatcher,
    counters: &CycleCounters,
) -> Result<PollReport, RelayError> {
    let source_id = poller.source_id().to_string();
    let watermark = watermarks.mark(&source_id).cloned();
    let cursor = watermark.as_ref().map(|mark| mark.id.as_str());
    let limit = poller.limits().limit_for(cursor);

    debug!(source = %source_id, watermark = ?cursor, limit, "Polling source");

    let page = poller.fetch(cursor, limit).await?;
    let fetched_at = Utc::now();

    let batch = unseen_prefix(&page, watermark.as_ref());
    if watermark.is_some() && batch.len() == page.len() && page.len() >= limit {
        warn!(
            source = %source_id,
            limit,
            "Watermark not found in a full page; older unseen items may have been skipped"
        );
    }

    let mut report = PollReport {
        source_id: source_id.clone(),
        fetched: page.len(),
        observed: batch.len(),
        ..Default::default()
    };

    // 从旧到新播报
    for item in batch.iter().rev() {
        if let RawItem::Unreadable(unreadable) = item {
            debug!(source = %source_id, item = %item.id(), reason = %unreadable.reason, "Skipped unreadable item");
            report.suppressed += 1;
            continue;
        }

        if let FilterDecision::Suppress(reason) = poller.filter(item, fetched_at) {
            debug!(source = %source_id, item = %item.id(), reason, "Suppressed item");
            report.suppressed += 1;
            continue;
        }

        let Some(message) = poller.format(item) else {
            debug!(source = %source_id, item = %item.id(), "No formatter for item; skipping");
            report.suppressed += 1;
            continue;
        };

        if dispatcher.dispatch(&message).await? == SendResult::Sent {
            info!(source = %source_id, item = %item.id(), channel = %message.channel, "Announced item");
        }
        report.dispatched += 1;
    }

    if !batch.is_empty() {
        if let Err(e) = poller.acknowledge(batch).await {
            warn!(source = %source_id, error = %e, "Failed to acknowledge batch");
        }
    }

    if let Some(newest) = page.first() {
        watermarks.advance(&source_id, Watermark::at(newest.id(), newest.created_at()));
        report.watermark = Some(newest.id().to_string());
    } else {
        report.watermark = watermark.map(|mark| mark.id);
    }

    counters.add(poller.counter(), batch.len() as u64);

    info!(
        source = %source_id,
        fetched = report.fetched,
        observed = report.observed,
        dispatched = report.dispatched,
        suppressed = report.suppressed,
        "Processed source"
    );

    Ok(report)
}
