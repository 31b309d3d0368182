//! 端到端：假适配器 + 记录型投递渠道，跑完整的调度轮次

use async_trait::async_trait;
use chrono::Utc;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use network_announcer::{
    Channel, ChannelMap, CodeEvent, CodeEventKind, Commit, Counter, CycleCounters, CycleScheduler,
    InboxMessage, ItemFetcher, MessageFormatter, ModerationLogEntry, NotificationDispatcher,
    NotificationSink, RawItem, RelayError, StatsReporter, StreamSubmission, ThingKind,
};
use network_announcer::poller::{CodeEventPoller, InboxPoller, ModLogPoller, StreamPoller};

#[derive(Default)]
struct FakeFetcher {
    pages: Mutex<VecDeque<Result<Vec<RawItem>, RelayError>>>,
}

impl FakeFetcher {
    fn with_pages(pages: Vec<Vec<RawItem>>) -> Arc<Self> {
        Arc::new(Self {
            pages: Mutex::new(pages.into_iter().map(Ok).collect()),
        })
    }
}

#[async_trait]
impl ItemFetcher for FakeFetcher {
    async fn fetch(&self, _instance: &str, _hint: Option<&str>, _limit: usize) -> Result<Vec<RawItem>, RelayError> {
        self.pages.lock().unwrap().pop_front().unwrap_or(Ok(Vec::new()))
    }
}

#[derive(Default)]
struct CollectingSink {
    sent: Mutex<Vec<(String, String)>>,
    broken: Mutex<bool>,
}

#[async_trait]
impl NotificationSink for CollectingSink {
    fn name(&self) -> &str {
        "collecting"
    }

    async fn handshake(&self) -> Result<String, RelayError> {
        Ok("bot".to_string())
    }

    async fn deliver(&self, channel_id: &str, content: &str) -> Result<(), RelayError> {
        if *self.broken.lock().unwrap() {
            return Err(RelayError::transient("collecting", "gateway timeout"));
        }
        self.sent.lock().unwrap().push((channel_id.to_string(), content.to_string()));
        Ok(())
    }
}

fn channel_ids() -> ChannelMap {
    ChannelMap::resolve(|c| Some(format!("#{}", c.as_str()))).unwrap()
}

fn message(id: &str, body: &str) -> RawItem {
    RawItem::Inbox(InboxMessage {
        id: id.to_string(),
        created_at: Utc::now(),
        author: "visitor".to_string(),
        kind: ThingKind::from_fullname(id),
        is_root: true,
        subject: "post reply".to_string(),
        body: body.to_string(),
        permalink: format!("https://www.reddit.com/r/ImagesOfOhio/comments/p/t/{}/", id),
    })
}

fn post(id: &str) -> RawItem {
    RawItem::Submission(StreamSubmission {
        id: id.to_string(),
        created_at: Utc::now(),
        author: "photographer".to_string(),
        title: "Sunset".to_string(),
        permalink: format!("https://www.reddit.com/r/ImagesOfOhio/comments/{}/", id),
    })
}

fn push(id: &str) -> RawItem {
    RawItem::CodeEvent(CodeEvent {
        id: id.to_string(),
        created_at: Utc::now(),
        actor: "maintainer".to_string(),
        kind: CodeEventKind::Push {
            branch: "master".to_string(),
            commits: vec![Commit {
                sha: "abc123".to_string(),
                author: "maintainer".to_string(),
                message: "Fix typo".to_string(),
            }],
        },
    })
}

fn mod_action(id: &str, action: &str) -> RawItem {
    RawItem::ModAction(ModerationLogEntry {
        id: id.to_string(),
        created_at: Utc::now(),
        moderator: "lead".to_string(),
        action: action.to_string(),
        target: Some("helper".to_string()),
        subreddit: "ImagesOfOhio".to_string(),
    })
}

#[tokio::test]
async fn test_full_cycle_then_stats_summary() {
    let sink = Arc::new(CollectingSink::default());
    let dispatcher = Arc::new(NotificationDispatcher::new(sink.clone(), channel_ids()));
    let counters = Arc::new(CycleCounters::new());
    let formatter = Arc::new(MessageFormatter::new("ImagesOf", "https://github.com/o/r"));
    let interval = Duration::from_secs(120);

    let mut scheduler = CycleScheduler::new(dispatcher.clone(), counters.clone(), interval);
    scheduler.add_poller(Box::new(InboxPoller::new(
        FakeFetcher::with_pages(vec![vec![message("t1_2", "remove"), message("t1_1", "nice shot")]]),
        formatter.clone(),
        interval,
    )));
    scheduler.add_poller(Box::new(StreamPoller::new(
        FakeFetcher::with_pages(vec![vec![post("t3_1")]]),
        formatter.clone(),
        "imagesofohio",
        "ImagesOfNetwork",
        interval,
    )));
    scheduler.add_poller(Box::new(CodeEventPoller::new(
        FakeFetcher::with_pages(vec![vec![push("9001")]]),
        formatter.clone(),
        "o/r",
        interval,
    )));
    scheduler.add_poller(Box::new(ModLogPoller::new(
        FakeFetcher::with_pages(vec![vec![
            mod_action("ModAction_2", "approvelink"),
            mod_action("ModAction_1", "invitemoderator"),
        ]]),
        formatter,
        "amici_ursi",
        "imagesofohio",
        interval,
    )));

    let report = scheduler.run_once().await;
    assert!(report.is_complete());

    let sent = sink.sent.lock().unwrap().clone();
    let channels: Vec<&str> = sent.iter().map(|(c, _)| c.as_str()).collect();
    assert_eq!(channels, vec!["#inbox", "#stream_posts", "#code_events", "#mod_actions"]);
    assert!(sent[0].1.starts_with("New __post comment__ from **/u/visitor**"));
    assert!(sent[2].1.contains("https://github.com/o/r/commit/abc123"));
    assert!(sent[3].1.contains("/u/lead has invited /u/helper to be a moderator"));

    assert_eq!(scheduler.watermarks().get("inbox"), Some("t1_2"));
    assert_eq!(scheduler.watermarks().get("modlog:amici_ursi/imagesofohio"), Some("ModAction_2"));

    let stats = StatsReporter::new(counters.clone(), dispatcher, Duration::from_secs(900));
    let snapshot = stats.report_once().await.unwrap();
    assert_eq!(snapshot.messages, 2);
    assert_eq!(snapshot.stream_posts, 1);
    assert_eq!(snapshot.code_events, 1);
    assert_eq!(snapshot.moderation_actions, 2);
    assert_eq!(counters.get(Counter::Messages), 0);

    let sent = sink.sent.lock().unwrap().clone();
    let (channel, summary) = sent.last().unwrap();
    assert_eq!(channel, "#stats");
    assert_eq!(
        summary,
        "Messages: **2**\nMultireddit posts: **1**\nGitHub Events: **1**\nNetwork Modlog Actions: **2**\r\n"
    );
}

#[tokio::test]
async fn test_stats_failure_carries_counts_forward() {
    let sink = Arc::new(CollectingSink::default());
    let dispatcher = Arc::new(NotificationDispatcher::new(sink.clone(), channel_ids()));
    let counters = Arc::new(CycleCounters::new());
    counters.add(Counter::StreamPosts, 7);

    let stats = StatsReporter::new(counters.clone(), dispatcher, Duration::from_secs(900));
    *sink.broken.lock().unwrap() = true;
    assert!(stats.report_once().await.is_err());
    assert_eq!(counters.get(Counter::StreamPosts), 7);

    *sink.broken.lock().unwrap() = false;
    counters.add(Counter::StreamPosts, 1);
    let snapshot = stats.report_once().await.unwrap();
    assert_eq!(snapshot.stream_posts, 8);
}

#[tokio::test]
async fn test_dry_run_announces_nothing_but_advances() {
    let sink = Arc::new(CollectingSink::default());
    let dispatcher = Arc::new(NotificationDispatcher::new(sink.clone(), channel_ids()).with_dry_run(true));
    let counters = Arc::new(CycleCounters::new());
    let formatter = Arc::new(MessageFormatter::new("ImagesOf", ""));
    let interval = Duration::from_secs(60);

    let mut scheduler = CycleScheduler::new(dispatcher.clone(), counters.clone(), interval);
    scheduler.add_poller(Box::new(StreamPoller::new(
        FakeFetcher::with_pages(vec![vec![post("t3_2"), post("t3_1")]]),
        formatter,
        "multi",
        "bot",
        interval,
    )));

    let report = scheduler.run_once().await;

    assert!(report.is_complete());
    assert!(sink.sent.lock().unwrap().is_empty());
    assert_eq!(scheduler.watermarks().get("stream:multi"), Some("t3_2"));
    assert_eq!(dispatcher.handshake().await.unwrap(), "dry-run");
    assert_eq!(Channel::ALL.len(), 6);
}
