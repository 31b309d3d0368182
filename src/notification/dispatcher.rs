//! 通知分发器 - 解析逻辑频道并交给投递渠道

use super::channel::{Channel, ChannelMap, NotificationMessage, NotificationSink, SendResult};
use crate::error::RelayError;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 通知分发器
///
/// 投递失败直接返回错误，不在这里重试：水位线没有前进，
/// 下一轮调度会重新发现同一批条目。
pub struct NotificationDispatcher {
    sink: Arc<dyn NotificationSink>,
    channels: ChannelMap,
    /// 是否为 dry-run 模式
    dry_run: bool,
}

impl NotificationDispatcher {
    pub fn new(sink: Arc<dyn NotificationSink>, channels: ChannelMap) -> Self {
        info!(sink = sink.name(), "Registering notification sink");
        Self {
            sink,
            channels,
            dry_run: false,
        }
    }

    /// 设置 dry-run 模式
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// 验证消息平台凭据
    pub async fn handshake(&self) -> Result<String, RelayError> {
        if self.dry_run {
            return Ok("dry-run".to_string());
        }
        self.sink.handshake().await
    }

    pub async fn dispatch(&self, message: &NotificationMessage) -> Result<SendResult, RelayError> {
        let channel_id = self.channels.id(message.channel);

        if self.dry_run {
            info!(
                channel = %message.channel,
                channel_id = %channel_id,
                content = %message.content,
                "[DRY-RUN] Would send notification"
            );
            return Ok(SendResult::Skipped("dry-run".to_string()));
        }

        match self.sink.deliver(channel_id, &message.content).await {
            Ok(()) => {
                debug!(channel = %message.channel, sink = self.sink.name(), "Notification delivered");
                Ok(SendResult::Sent)
            }
            Err(e) => {
                warn!(channel = %message.channel, sink = self.sink.name(), error = %e, "Notification delivery failed");
                Err(e)
            }
        }
    }

    /// 便捷方法：直接发送文本
    pub async fn send_text(
        &self,
        channel: Channel,
        content: impl Into<String>,
    ) -> Result<SendResult, RelayError> {
        self.dispatch(&NotificationMessage::new(channel, content)).await
    }
}
