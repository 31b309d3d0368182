//! 轮次调度器 - 按固定间隔、固定顺序运行所有轮询器

use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::error::RelayError;
use crate::notification::NotificationDispatcher;
use crate::poller::{poll_source, PollReport, SourcePoller};
use crate::stats::CycleCounters;
use crate::watermark::WatermarkStore;

/// 一轮调度的结果
#[derive(Debug, Default)]
pub struct CycleReport {
    pub polled: Vec<PollReport>,
    /// 中止本轮的来源和错误
    pub failure: Option<(String, RelayError)>,
}

impl CycleReport {
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }
}

/// 轮次调度器，独占水位线存储
pub struct CycleScheduler {
    pollers: Vec<Box<dyn SourcePoller>>,
    watermarks: WatermarkStore,
    dispatcher: Arc<NotificationDispatcher>,
    counters: Arc<CycleCounters>,
    interval: Duration,
}

impl CycleScheduler {
    pub fn new(
        dispatcher: Arc<NotificationDispatcher>,
        counters: Arc<CycleCounters>,
        interval: Duration,
    ) -> Self {
        Self {
            pollers: Vec::new(),
            watermarks: WatermarkStore::new(),
            dispatcher,
            counters,
            interval,
        }
    }

    /// 按添加顺序执行
    pub fn add_poller(&mut self, poller: Box<dyn SourcePoller>) {
        info!(source = poller.source_id(), "Registered source");
        self.pollers.push(poller);
    }

    pub fn source_ids(&self) -> Vec<&str> {
        self.pollers.iter().map(|p| p.source_id()).collect()
    }

    pub fn watermarks(&self) -> &WatermarkStore {
        &self.watermarks
    }

    /// 运行一轮；任一来源失败即记录日志并结束本轮
    pub async fn run_once(&mut self) -> CycleReport {
        let mut report = CycleReport::default();

        for poller in &self.pollers {
            match poll_source(
                poller.as_ref(),
                &mut self.watermarks,
                &self.dispatcher,
                &self.counters,
            )
            .await
            {
                Ok(polled) => report.polled.push(polled),
                Err(e) => {
                    if e.is_transient() {
                        warn!(source = poller.source_id(), error = %e, "Cycle aborted by transient failure");
                    } else {
                        error!(source = poller.source_id(), error = %e, "Cycle aborted");
                    }
                    report.failure = Some((poller.source_id().to_string(), e));
                    break;
                }
            }
        }

        report
    }

    /// 持续运行，上一轮结束后才开始下一轮
    ///
    /// 只有在某轮因认证失败中止、且消息平台握手也失败时才返回，
    /// 由连接监督器负责重连。
    pub async fn run(&mut self) -> RelayError {
        info!(
            interval_secs = self.interval.as_secs(),
            sources = self.pollers.len(),
            "Cycle scheduler started"
        );

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let report = self.run_once().await;

            if let Some((_, RelayError::Auth { .. })) = &report.failure {
                if let Err(e) = self.dispatcher.handshake().await {
                    return e;
                }
            }
        }
    }
}
