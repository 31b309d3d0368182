//! 通知层 - 逻辑频道、格式化和投递
//!
//! 轮询器产出 [`NotificationMessage`]，由 [`NotificationDispatcher`]
//! 把逻辑频道解析成具体频道 ID 后交给 [`NotificationSink`] 投递。
//!
//! # 使用示例
//! ```ignore
//! use network_announcer::notification::{Channel, ChannelMap, DiscordChannel, DiscordConfig, NotificationDispatcher};
//!
//! let sink = Arc::new(DiscordChannel::new(DiscordConfig { token, ..Default::default() })?);
//! let channels = ChannelMap::resolve(|c| config.discord.channels.get(c))?;
//! let dispatcher = NotificationDispatcher::new(sink, channels);
//! dispatcher.send_text(Channel::Stats, "hello").await?;
//! ```

pub mod channel;
pub mod channels;
pub mod dispatcher;
pub mod formatter;

pub use channel::{Channel, ChannelMap, NotificationMessage, NotificationSink, SendResult};
pub use channels::{DiscordChannel, DiscordConfig};
pub use dispatcher::NotificationDispatcher;
pub use formatter::{msg, MessageFormatter};
