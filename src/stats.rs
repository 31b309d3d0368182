//! 统计计数 - 轮询器累加，统计任务定期读取并清零

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::RelayError;
use crate::notification::{Channel, MessageFormatter, NotificationDispatcher};

/// 计数类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    Messages,
    StreamPosts,
    CodeEvents,
    ModerationActions,
}

/// 某一时刻的计数快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub messages: u64,
    pub stream_posts: u64,
    pub code_events: u64,
    pub moderation_actions: u64,
}

impl CounterSnapshot {
    pub fn total(&self) -> u64 {
        self.messages + self.stream_posts + self.code_events + self.moderation_actions
    }
}

/// 调度任务和统计任务共享的计数器
///
/// 增加和读取清零各自是单个原子操作，两个任务并发运行也不会丢计数。
#[derive(Debug, Default)]
pub struct CycleCounters {
    messages: AtomicU64,
    stream_posts: AtomicU64,
    code_events: AtomicU64,
    moderation_actions: AtomicU64,
}

impl CycleCounters {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, counter: Counter) -> &AtomicU64 {
        match counter {
            Counter::Messages => &self.messages,
            Counter::StreamPosts => &self.stream_posts,
            Counter::CodeEvents => &self.code_events,
            Counter::ModerationActions => &self.moderation_actions,
        }
    }

    pub fn add(&self, counter: Counter, n: u64) {
        self.slot(counter).fetch_add(n, Ordering::SeqCst);
    }

    pub fn get(&self, counter: Counter) -> u64 {
        self.slot(counter).load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            messages: self.get(Counter::Messages),
            stream_posts: self.get(Counter::StreamPosts),
            code_events: self.get(Counter::CodeEvents),
            moderation_actions: self.get(Counter::ModerationActions),
        }
    }

    /// 读取并清零
    pub fn take(&self) -> CounterSnapshot {
        CounterSnapshot {
            messages: self.messages.swap(0, Ordering::SeqCst),
            stream_posts: self.stream_posts.swap(0, Ordering::SeqCst),
            code_events: self.code_events.swap(0, Ordering::SeqCst),
            moderation_actions: self.moderation_actions.swap(0, Ordering::SeqCst),
        }
    }

    /// 把未能发出的快照加回去
    pub fn restore(&self, snapshot: &CounterSnapshot) {
        self.add(Counter::Messages, snapshot.messages);
        self.add(Counter::StreamPosts, snapshot.stream_posts);
        self.add(Counter::CodeEvents, snapshot.code_events);
        self.add(Counter::ModerationActions, snapshot.moderation_actions);
    }
}

/// 统计汇报任务，与调度器独立运行
pub struct StatsReporter {
    counters: Arc<CycleCounters>,
    dispatcher: Arc<NotificationDispatcher>,
    interval: Duration,
}

impl StatsReporter {
    pub fn new(
        counters: Arc<CycleCounters>,
        dispatcher: Arc<NotificationDispatcher>,
        interval: Duration,
    ) -> Self {
        Self {
            counters,
            dispatcher,
            interval,
        }
    }

    /// 汇报一次；发送失败时计数原样保留到下一次
    pub async fn report_once(&self) -> Result<CounterSnapshot, RelayError> {
        let snapshot = self.counters.take();
        let summary = MessageFormatter::format_stats(&snapshot);

        match self.dispatcher.send_text(Channel::Stats, summary).await {
            Ok(_) => {
                info!(
                    messages = snapshot.messages,
                    stream_posts = snapshot.stream_posts,
                    code_events = snapshot.code_events,
                    moderation_actions = snapshot.moderation_actions,
                    "Reported relay stats"
                );
                Ok(snapshot)
            }
            Err(e) => {
                self.counters.restore(&snapshot);
                Err(e)
            }
        }
    }

    /// 先等待一个周期再汇报，永不返回
    pub async fn run(self) {
        info!(interval_secs = self.interval.as_secs(), "Stats reporter started");
        loop {
            sleep(self.interval).await;
            if let Err(e) = self.report_once().await {
                warn!(error = %e, "Failed to report stats; counts carried over");
            }
        }
    }
}
