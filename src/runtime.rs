//! 组装 - 根据配置创建适配器、轮询器、调度器和监督器

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use crate::config::RelayConfig;
use crate::notification::{
    DiscordChannel, DiscordConfig, MessageFormatter, NotificationDispatcher, NotificationSink,
};
use crate::poller::{CodeEventPoller, InboxPoller, ModLogPoller, StreamPoller};
use crate::scheduler::CycleScheduler;
use crate::source::{GithubEvents, ItemFetcher, RedditClient, RedditInbox, RedditModLog, RedditStream};
use crate::stats::{CycleCounters, StatsReporter};
use crate::supervisor::{ConnectionSupervisor, ReconnectPolicy};

/// 完整组装好的中继
pub struct RelayRuntime {
    pub dispatcher: Arc<NotificationDispatcher>,
    pub counters: Arc<CycleCounters>,
    pub scheduler: CycleScheduler,
    stats_interval: std::time::Duration,
    policy: ReconnectPolicy,
}

impl RelayRuntime {
    pub fn from_config(config: &RelayConfig, dry_run: bool) -> Result<Self> {
        config.validate().context("Invalid configuration")?;

        let sink: Arc<dyn NotificationSink> = Arc::new(
            DiscordChannel::new(DiscordConfig {
                token: config.discord.token.clone(),
                timeout_secs: config.schedule.request_timeout_secs,
                ..Default::default()
            })
            .context("Failed to create Discord client")?,
        );
        let dispatcher = Arc::new(
            NotificationDispatcher::new(sink, config.channel_map()?).with_dry_run(dry_run),
        );

        let reddit = Arc::new(
            RedditClient::new(config.reddit_credentials(), config.request_timeout())
                .context("Failed to create Reddit client")?,
        );

        let github = match &config.github {
            Some(section) => {
                let mut events = GithubEvents::new(
                    section.token.clone(),
                    &config.reddit.user_agent,
                    config.request_timeout(),
                )
                .context("Failed to create GitHub client")?;
                if let Some(api_base) = &section.api_base {
                    events = events.with_api_base(api_base.clone());
                }
                Some((section, Arc::new(events) as Arc<dyn ItemFetcher>))
            }
            None => None,
        };

        let repo_url = config
            .github
            .as_ref()
            .map(|g| g.web_url())
            .unwrap_or_default();
        let formatter = Arc::new(MessageFormatter::new(config.network.name.clone(), repo_url));

        let counters = Arc::new(CycleCounters::new());
        let interval = config.run_interval();
        let mut scheduler = CycleScheduler::new(dispatcher.clone(), counters.clone(), interval);

        // 顺序：收件箱、聚合流、代码事件、版务日志
        scheduler.add_poller(Box::new(InboxPoller::new(
            Arc::new(RedditInbox::new(reddit.clone())),
            formatter.clone(),
            interval,
        )));

        let owner = &config.network.multireddit_owner;
        let stream_fetcher: Arc<dyn ItemFetcher> = Arc::new(RedditStream::new(reddit.clone(), owner.clone()));
        for multireddit in &config.network.stream_multireddits {
            scheduler.add_poller(Box::new(StreamPoller::new(
                stream_fetcher.clone(),
                formatter.clone(),
                multireddit.clone(),
                reddit.username(),
                interval,
            )));
        }

        if let Some((section, fetcher)) = github {
            scheduler.add_poller(Box::new(CodeEventPoller::new(
                fetcher,
                formatter.clone(),
                section.repository(),
                interval,
            )));
        }

        let modlog_fetcher: Arc<dyn ItemFetcher> = Arc::new(RedditModLog::new(reddit, owner.clone()));
        for multireddit in &config.network.modlog_multireddits {
            scheduler.add_poller(Box::new(ModLogPoller::new(
                modlog_fetcher.clone(),
                formatter.clone(),
                owner,
                multireddit.clone(),
                interval,
            )));
        }

        info!(
            sources = scheduler.source_ids().len(),
            dry_run,
            "Relay assembled"
        );

        Ok(Self {
            dispatcher,
            counters,
            scheduler,
            stats_interval: config.stats_interval(),
            policy: ReconnectPolicy {
                max_attempts: config.schedule.max_connect_attempts,
                ..Default::default()
            },
        })
    }

    pub fn into_supervisor(self) -> ConnectionSupervisor {
        let stats = StatsReporter::new(self.counters, self.dispatcher.clone(), self.stats_interval);
        ConnectionSupervisor::new(self.dispatcher, self.scheduler, stats, self.policy)
    }
}
