//! 连接监督器 - 消息平台握手、退避重连、启动调度
//!
//! 状态机：`Connecting → Ready | Backoff → Connecting`。
//! 调度器（以及它的水位线）归监督器所有，重连后继续使用。

use chrono::Local;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::error::RelayError;
use crate::notification::{Channel, MessageFormatter, NotificationDispatcher};
use crate::scheduler::CycleScheduler;
use crate::stats::StatsReporter;

/// 指数退避策略
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    pub initial_delay: Duration,
    pub multiplier: u32,
    pub max_delay: Duration,
    /// `None` 表示无限重试
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(5),
            multiplier: 2,
            max_delay: Duration::from_secs(300),
            max_attempts: None,
        }
    }
}

impl ReconnectPolicy {
    /// 第 `attempt` 次失败（从 1 开始）之后的等待时长
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self
            .multiplier
            .checked_pow(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.initial_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    pub fn exhausted(&self, attempt: u32) -> bool {
        self.max_attempts.is_some_and(|max| attempt >= max)
    }
}

/// 连接状态
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionState {
    Connecting { attempt: u32 },
    Ready { identity: String },
    Backoff { attempt: u32, delay: Duration },
}

pub struct ConnectionSupervisor {
    dispatcher: Arc<NotificationDispatcher>,
    scheduler: CycleScheduler,
    /// 首次就绪时启动，之后重连不再重复启动
    stats: Option<StatsReporter>,
    policy: ReconnectPolicy,
    state: ConnectionState,
}

impl ConnectionSupervisor {
    pub fn new(
        dispatcher: Arc<NotificationDispatcher>,
        scheduler: CycleScheduler,
        stats: StatsReporter,
        policy: ReconnectPolicy,
    ) -> Self {
        Self {
            dispatcher,
            scheduler,
            stats: Some(stats),
            policy,
            state: ConnectionState::Connecting { attempt: 1 },
        }
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    fn transition(&mut self, next: ConnectionState) {
        debug!(from = ?self.state, to = ?next, "Connection state change");
        self.state = next;
    }

    /// 握手直到成功；超过最大尝试次数时返回最后一次错误
    pub async fn connect(&mut self) -> Result<String, RelayError> {
        let mut attempt = 1;

        loop {
            self.transition(ConnectionState::Connecting { attempt });

            match self.dispatcher.handshake().await {
                Ok(identity) => {
                    info!(identity = %identity, attempt, "Connected to messaging platform");
                    self.transition(ConnectionState::Ready {
                        identity: identity.clone(),
                    });
                    return Ok(identity);
                }
                Err(e) => {
                    if self.policy.exhausted(attempt) {
                        error!(attempt, error = %e, "Giving up on messaging platform connection");
                        return Err(e);
                    }
                    let delay = self.policy.delay_for(attempt);
                    warn!(attempt, delay_secs = delay.as_secs_f64(), error = %e, "Handshake failed; backing off");
                    self.transition(ConnectionState::Backoff { attempt, delay });
                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// 就绪时：发送 Ready 消息，启动统计任务，运行调度器
    async fn on_ready(&mut self) {
        let ready = MessageFormatter::format_ready(Local::now());
        if let Err(e) = self.dispatcher.send_text(Channel::Stats, ready).await {
            warn!(error = %e, "Failed to announce readiness");
        }

        if let Some(stats) = self.stats.take() {
            tokio::spawn(stats.run());
        }
    }

    /// 只在重连次数耗尽时返回
    pub async fn run(mut self) -> Result<(), RelayError> {
        loop {
            self.connect().await?;
            self.on_ready().await;

            let lost = self.scheduler.run().await;
            warn!(error = %lost, "Lost messaging platform connection; reconnecting");
        }
    }
}
