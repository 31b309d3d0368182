//! 单元测试共用的假适配器和条目构造函数

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::RelayError;
use crate::notification::{ChannelMap, NotificationDispatcher, NotificationSink};
use crate::source::{
    CodeEvent, CodeEventKind, Commit, InboxMessage, ItemFetcher, ModerationLogEntry, RawItem,
    StreamSubmission, ThingKind,
};

/// 记录投递内容，可在第 N 次投递时失败一次
#[derive(Default)]
pub(crate) struct RecordingSink {
    delivered: Mutex<Vec<(String, String)>>,
    attempts: AtomicUsize,
    fail_on_attempt: Mutex<Option<usize>>,
    failing_handshakes: AtomicUsize,
    handshakes: AtomicUsize,
}

impl RecordingSink {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// 第 `attempt` 次（从 1 开始）投递返回瞬时错误
    pub(crate) fn fail_on(&self, attempt: usize) {
        let base = self.attempts.load(Ordering::SeqCst);
        *self.fail_on_attempt.lock().unwrap() = Some(base + attempt);
    }

    /// 接下来 `count` 次握手返回认证错误
    pub(crate) fn fail_handshakes(&self, count: usize) {
        self.failing_handshakes.store(count, Ordering::SeqCst);
    }

    pub(crate) fn handshakes(&self) -> usize {
        self.handshakes.load(Ordering::SeqCst)
    }

    pub(crate) fn delivered(&self) -> Vec<(String, String)> {
        self.delivered.lock().unwrap().clone()
    }

    pub(crate) fn contents(&self) -> Vec<String> {
        self.delivered().into_iter().map(|(_, c)| c).collect()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    async fn handshake(&self) -> Result<String, RelayError> {
        self.handshakes.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failing_handshakes.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_handshakes.store(remaining - 1, Ordering::SeqCst);
            return Err(RelayError::auth("recording", "401 Unauthorized"));
        }
        Ok("relay-bot".to_string())
    }

    async fn deliver(&self, channel_id: &str, content: &str) -> Result<(), RelayError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        let mut fail = self.fail_on_attempt.lock().unwrap();
        if *fail == Some(attempt) {
            fail.take();
            return Err(RelayError::transient("recording", "simulated timeout"));
        }
        self.delivered
            .lock()
            .unwrap()
            .push((channel_id.to_string(), content.to_string()));
        Ok(())
    }
}

/// 频道 ID 与逻辑频道名相同
pub(crate) fn test_channels() -> ChannelMap {
    ChannelMap::resolve(|c| Some(c.as_str().to_string())).unwrap()
}

pub(crate) fn dispatcher_for(sink: Arc<RecordingSink>) -> NotificationDispatcher {
    NotificationDispatcher::new(sink, test_channels())
}

/// 按顺序返回预设页面，耗尽后返回空页
#[derive(Default)]
pub(crate) struct ScriptedFetcher {
    pages: Mutex<VecDeque<Result<Vec<RawItem>, RelayError>>>,
    calls: Mutex<Vec<(String, Option<String>, usize)>>,
    acknowledged: Mutex<Vec<String>>,
    ack_failures: Mutex<usize>,
}

impl ScriptedFetcher {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn push_page(&self, page: Vec<RawItem>) {
        self.pages.lock().unwrap().push_back(Ok(page));
    }

    pub(crate) fn push_error(&self, error: RelayError) {
        self.pages.lock().unwrap().push_back(Err(error));
    }

    /// (instance, cursor_hint, limit)
    pub(crate) fn calls(&self) -> Vec<(String, Option<String>, usize)> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn acknowledged(&self) -> Vec<String> {
        self.acknowledged.lock().unwrap().clone()
    }

    /// 接下来 `n` 次确认失败
    pub(crate) fn fail_acks(&self, n: usize) {
        *self.ack_failures.lock().unwrap() = n;
    }
}

#[async_trait]
impl ItemFetcher for ScriptedFetcher {
    async fn fetch(
        &self,
        instance: &str,
        cursor_hint: Option<&str>,
        limit: usize,
    ) -> Result<Vec<RawItem>, RelayError> {
        self.calls.lock().unwrap().push((
            instance.to_string(),
            cursor_hint.map(str::to_string),
            limit,
        ));
        self.pages.lock().unwrap().pop_front().unwrap_or(Ok(Vec::new()))
    }

    async fn acknowledge(&self, ids: &[String]) -> Result<(), RelayError> {
        let mut failures = self.ack_failures.lock().unwrap();
        if *failures > 0 {
            *failures -= 1;
            return Err(RelayError::transient("scripted", "mark read failed"));
        }
        self.acknowledged.lock().unwrap().extend(ids.iter().cloned());
        Ok(())
    }
}

pub(crate) fn inbox_item(id: &str, author: &str, body: &str) -> RawItem {
    RawItem::Inbox(InboxMessage {
        id: id.to_string(),
        created_at: Utc::now(),
        author: author.to_string(),
        kind: ThingKind::from_fullname(id),
        is_root: false,
        subject: "comment reply".to_string(),
        body: body.to_string(),
        permalink: format!("https://www.reddit.com/r/test/comments/x/y/{}/", id),
    })
}

pub(crate) fn submission(id: &str, author: &str) -> RawItem {
    RawItem::Submission(StreamSubmission {
        id: id.to_string(),
        created_at: Utc::now(),
        author: author.to_string(),
        title: format!("post {}", id),
        permalink: format!("https://www.reddit.com/r/test/comments/{}/", id),
    })
}

pub(crate) fn push_event(id: &str, commits: usize, age_hours: i64) -> RawItem {
    RawItem::CodeEvent(CodeEvent {
        id: id.to_string(),
        created_at: Utc::now() - ChronoDuration::hours(age_hours),
        actor: "dev".to_string(),
        kind: CodeEventKind::Push {
            branch: "master".to_string(),
            commits: (0..commits)
                .map(|i| Commit {
                    sha: format!("sha{}{}", id, i),
                    author: format!("author{}", i),
                    message: format!("commit message {}", i),
                })
                .collect(),
        },
    })
}

pub(crate) fn issue_event(id: &str, action: &str) -> RawItem {
    RawItem::CodeEvent(CodeEvent {
        id: id.to_string(),
        created_at: Utc::now(),
        actor: "reporter".to_string(),
        kind: CodeEventKind::Issues {
            action: action.to_string(),
            title: format!("issue {}", id),
            url: format!("https://github.com/o/r/issues/{}", id),
        },
    })
}

pub(crate) fn mod_entry(id: &str, action: &str) -> RawItem {
    RawItem::ModAction(ModerationLogEntry {
        id: id.to_string(),
        created_at: Utc::now(),
        moderator: "headmod".to_string(),
        action: action.to_string(),
        target: Some("someone".to_string()),
        subreddit: "ImagesOfTest".to_string(),
    })
}
