//! Network Announcer - 把 Reddit 收件箱、多版块新帖、版务日志和 GitHub 事件转发到 Discord

pub mod config;
pub mod error;
pub mod notification;
pub mod poller;
pub mod runtime;
pub mod scheduler;
pub mod source;
pub mod stats;
pub mod supervisor;
pub mod watermark;

#[cfg(test)]
mod testing;

pub use config::RelayConfig;
pub use error::RelayError;
pub use notification::{
    Channel, ChannelMap, MessageFormatter, NotificationDispatcher, NotificationMessage,
    NotificationSink, SendResult,
};
pub use poller::{poll_source, FilterDecision, PageLimits, PollReport, SourcePoller};
pub use runtime::RelayRuntime;
pub use scheduler::{CycleReport, CycleScheduler};
pub use source::{
    CodeEvent, CodeEventKind, Commit, InboxMessage, ItemFetcher, ModerationLogEntry, RawItem,
    StreamSubmission, ThingKind, UnreadableItem,
};
pub use stats::{Counter, CounterSnapshot, CycleCounters, StatsReporter};
pub use supervisor::{ConnectionState, ConnectionSupervisor, ReconnectPolicy};
pub use watermark::{source_key, Watermark, WatermarkStore};
