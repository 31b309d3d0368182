//! Reddit 适配器 - 收件箱、多版块新帖流、多版块版务日志
//!
//! 使用 script 类型应用的 password grant 获取 OAuth token，
//! 通过 `oauth.reddit.com` 读取 listing。单次请求最多 100 条，
//! 超出时沿 `after` 翻页，遇到 `cursor_hint` 即停止翻页。

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{
    InboxMessage, ItemFetcher, ModerationLogEntry, RawItem, StreamSubmission, ThingKind,
    UnreadableItem,
};
use crate::error::RelayError;

const SERVICE: &str = "reddit";

/// OAuth token 端点
pub const TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";

/// OAuth API 基础 URL
pub const API_BASE: &str = "https://oauth.reddit.com";

/// 网页链接基础 URL
pub const WEB_BASE: &str = "https://www.reddit.com";

/// 收件箱 listing（含已读，水位线条目在标记已读后仍留在列表中）
const INBOX_PATH: &str = "/message/inbox";

/// listing 单页上限
const MAX_PAGE_SIZE: usize = 100;

/// token 提前刷新的余量
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Reddit 凭据
#[derive(Debug, Clone)]
pub struct RedditCredentials {
    pub username: String,
    pub password: String,
    pub client_id: String,
    pub client_secret: String,
    pub user_agent: String,
}

#[derive(Debug)]
struct AccessToken {
    value: String,
    expires_at: Instant,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<u64>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Listing<T> {
    data: ListingData<T>,
}

#[derive(Debug, Deserialize)]
struct ListingData<T> {
    #[serde(default = "Vec::new")]
    children: Vec<Thing<T>>,
    after: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Thing<T> {
    data: T,
}

/// listing 条目在 `cursor_hint` 中使用的标识字段
trait ListingId {
    const ID_FIELD: &'static str;
}

/// `null` 与缺失字段一样按空字符串处理
fn nullable<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Deserialize)]
struct InboxThing {
    id: String,
    name: String,
    author: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    subject: String,
    #[serde(default, deserialize_with = "nullable")]
    body: String,
    created_utc: f64,
    #[serde(default, deserialize_with = "nullable")]
    context: String,
    parent_id: Option<String>,
}

impl ListingId for InboxThing {
    const ID_FIELD: &'static str = "name";
}

impl From<InboxThing> for InboxMessage {
    fn from(thing: InboxThing) -> Self {
        let permalink = if thing.context.is_empty() {
            format!("{}/message/messages/{}", WEB_BASE, thing.id)
        } else {
            let path = thing.context.split('?').next().unwrap_or_default();
            format!("{}{}", WEB_BASE, path)
        };

        InboxMessage {
            kind: ThingKind::from_fullname(&thing.name),
            is_root: thing
                .parent_id
                .as_deref()
                .is_some_and(|p| p.starts_with("t3_")),
            created_at: utc_from_epoch(thing.created_utc),
            author: author_or_deleted(thing.author),
            id: thing.name,
            subject: thing.subject,
            body: thing.body,
            permalink,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SubmissionThing {
    id: String,
    author: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    title: String,
    #[serde(default, deserialize_with = "nullable")]
    permalink: String,
    created_utc: f64,
}

impl ListingId for SubmissionThing {
    const ID_FIELD: &'static str = "id";
}

impl From<SubmissionThing> for StreamSubmission {
    fn from(thing: SubmissionThing) -> Self {
        StreamSubmission {
            id: thing.id,
            created_at: utc_from_epoch(thing.created_utc),
            author: author_or_deleted(thing.author),
            title: thing.title,
            permalink: format!("{}{}", WEB_BASE, thing.permalink),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ModActionThing {
    id: String,
    action: String,
    #[serde(rename = "mod")]
    moderator: String,
    target_author: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    subreddit: String,
    created_utc: f64,
}

impl ListingId for ModActionThing {
    const ID_FIELD: &'static str = "id";
}

impl From<ModActionThing> for ModerationLogEntry {
    fn from(thing: ModActionThing) -> Self {
        ModerationLogEntry {
            id: thing.id,
            created_at: utc_from_epoch(thing.created_utc),
            moderator: thing.moderator,
            action: thing.action,
            target: thing.target_author.filter(|t| !t.is_empty()),
            subreddit: thing.subreddit,
        }
    }
}

fn utc_from_epoch(secs: f64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs as i64, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

fn author_or_deleted(author: Option<String>) -> String {
    author
        .filter(|a| !a.is_empty())
        .unwrap_or_else(|| "[deleted]".to_string())
}

/// Reddit OAuth 客户端，三个适配器共享
pub struct RedditClient {
    http: Client,
    credentials: RedditCredentials,
    api_base: String,
    token_url: String,
    token: Mutex<Option<AccessToken>>,
}

impl RedditClient {
    pub fn new(credentials: RedditCredentials, timeout: Duration) -> Result<Self, RelayError> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(credentials.user_agent.clone())
            .build()
            .map_err(|e| RelayError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            credentials,
            api_base: API_BASE.to_string(),
            token_url: TOKEN_URL.to_string(),
            token: Mutex::new(None),
        })
    }

    /// 登录账号，用于识别自己发的帖子
    pub fn username(&self) -> &str {
        &self.credentials.username
    }

    async fn access_token(&self) -> Result<String, RelayError> {
        let mut guard = self.token.lock().await;
        if let Some(token) = guard.as_ref() {
            if Instant::now() + TOKEN_REFRESH_MARGIN < token.expires_at {
                return Ok(token.value.clone());
            }
        }

        debug!("Requesting Reddit access token");
        let form = [
            ("grant_type", "password"),
            ("username", self.credentials.username.as_str()),
            ("password", self.credentials.password.as_str()),
        ];
        let response = self
            .http
            .post(&self.token_url)
            .basic_auth(&self.credentials.client_id, Some(&self.credentials.client_secret))
            .form(&form)
            .send()
            .await
            .map_err(|e| RelayError::from_reqwest(SERVICE, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RelayError::from_status(SERVICE, status, &body));
        }

        let parsed: TokenResponse = response
            .json()
            .await
            .map_err(|e| RelayError::from_reqwest(SERVICE, e))?;

        // 凭据错误时 Reddit 依然返回 200，只在 body 中给出 error
        let value = match (parsed.access_token, parsed.error) {
            (Some(value), _) => value,
            (None, Some(error)) => return Err(RelayError::auth(SERVICE, error)),
            (None, None) => return Err(RelayError::decode(SERVICE, "token response without access_token")),
        };

        let expires_in = Duration::from_secs(parsed.expires_in.unwrap_or(3600));
        info!(user = %self.credentials.username, "Obtained Reddit access token");
        *guard = Some(AccessToken {
            value: value.clone(),
            expires_at: Instant::now() + expires_in,
        });

        Ok(value)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, RelayError> {
        let token = self.access_token().await?;
        let url = format!("{}{}", self.api_base, path);

        let response = self
            .http
            .get(&url)
            .bearer_auth(token)
            .query(query)
            .send()
            .await
            .map_err(|e| RelayError::from_reqwest(SERVICE, e))?;

        let status = response.status();
        if !status.is_success() {
            if status.as_u16() == 401 {
                self.token.lock().await.take();
            }
            let body = response.text().await.unwrap_or_default();
            return Err(RelayError::from_status(SERVICE, status, &body));
        }

        response
            .json()
            .await
            .map_err(|e| RelayError::from_reqwest(SERVICE, e))
    }

    async fn post_form(&self, path: &str, form: &[(&str, String)]) -> Result<(), RelayError> {
        let token = self.access_token().await?;
        let url = format!("{}{}", self.api_base, path);

        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .form(form)
            .send()
            .await
            .map_err(|e| RelayError::from_reqwest(SERVICE, e))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(RelayError::from_status(SERVICE, status, &body))
        }
    }

    /// 读取一个 listing，最新在前，最多 `limit` 条
    ///
    /// 逐条解码：解码失败的条目以 [`UnreadableItem`] 形式保留其 ID。
    async fn listing<T>(
        &self,
        path: &str,
        cursor_hint: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Result<T, UnreadableItem>>, RelayError>
    where
        T: DeserializeOwned + ListingId,
    {
        let mut items: Vec<Result<T, UnreadableItem>> = Vec::new();
        let mut after: Option<String> = None;

        while items.len() < limit {
            let page_size = (limit - items.len()).min(MAX_PAGE_SIZE);
            let mut query = vec![
                ("limit", page_size.to_string()),
                ("raw_json", "1".to_string()),
            ];
            if let Some(after) = &after {
                query.push(("after", after.clone()));
            }

            let listing: Listing<Value> = self.get_json(path, &query).await?;
            let received = listing.data.children.len();
            let (decoded, reached_hint) = decode_children::<T>(listing.data.children, cursor_hint);
            items.extend(decoded);

            debug!(path = %path, received, reached_hint, "Fetched Reddit listing page");

            if reached_hint || received == 0 {
                break;
            }
            match listing.data.after {
                Some(next) => after = Some(next),
                None => break,
            }
        }

        items.truncate(limit);
        Ok(items)
    }
}

/// 逐条解码一页 listing，返回解码结果以及是否遇到了 `cursor_hint`
///
/// 连 ID 都没有的条目无法追踪，直接丢弃。
fn decode_children<T>(
    children: Vec<Thing<Value>>,
    cursor_hint: Option<&str>,
) -> (Vec<Result<T, UnreadableItem>>, bool)
where
    T: DeserializeOwned + ListingId,
{
    let mut reached_hint = false;
    let mut decoded = Vec::with_capacity(children.len());

    for child in children {
        let Some(id) = child.data.get(T::ID_FIELD).and_then(Value::as_str).map(str::to_string) else {
            warn!(field = T::ID_FIELD, "Dropping listing entry without an id");
            continue;
        };
        if cursor_hint == Some(id.as_str()) {
            reached_hint = true;
        }
        let created_at = child
            .data
            .get("created_utc")
            .and_then(Value::as_f64)
            .map(utc_from_epoch);

        match serde_json::from_value::<T>(child.data) {
            Ok(thing) => decoded.push(Ok(thing)),
            Err(e) => {
                warn!(id = %id, error = %e, "Skipping undecodable listing entry");
                decoded.push(Err(UnreadableItem {
                    id,
                    created_at,
                    reason: e.to_string(),
                }));
            }
        }
    }

    (decoded, reached_hint)
}

/// 把解码结果转换成原始条目
fn into_raw<T>(entries: Vec<Result<T, UnreadableItem>>, wrap: impl Fn(T) -> RawItem) -> Vec<RawItem> {
    entries
        .into_iter()
        .map(|entry| match entry {
            Ok(thing) => wrap(thing),
            Err(unreadable) => RawItem::Unreadable(unreadable),
        })
        .collect()
}

/// 收件箱
pub struct RedditInbox {
    client: Arc<RedditClient>,
}

impl RedditInbox {
    pub fn new(client: Arc<RedditClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ItemFetcher for RedditInbox {
    async fn fetch(
        &self,
        _instance: &str,
        cursor_hint: Option<&str>,
        limit: usize,
    ) -> Result<Vec<RawItem>, RelayError> {
        let things = self
            .client
            .listing::<InboxThing>(INBOX_PATH, cursor_hint, limit)
            .await?;
        Ok(into_raw(things, |t| RawItem::Inbox(t.into())))
    }

    /// 标记为已读（仅影响 Reddit 端未读提示，去重由水位线负责）
    async fn acknowledge(&self, ids: &[String]) -> Result<(), RelayError> {
        if ids.is_empty() {
            return Ok(());
        }
        self.client
            .post_form("/api/read_message", &[("id", ids.join(","))])
            .await
    }
}

/// 多版块新帖流（实例 = 多版块名称）
pub struct RedditStream {
    client: Arc<RedditClient>,
    owner: String,
}

impl RedditStream {
    pub fn new(client: Arc<RedditClient>, owner: impl Into<String>) -> Self {
        Self {
            client,
            owner: owner.into(),
        }
    }
}

#[async_trait]
impl ItemFetcher for RedditStream {
    async fn fetch(
        &self,
        instance: &str,
        cursor_hint: Option<&str>,
        limit: usize,
    ) -> Result<Vec<RawItem>, RelayError> {
        let path = format!("/user/{}/m/{}/new", self.owner, instance);
        let things = self
            .client
            .listing::<SubmissionThing>(&path, cursor_hint, limit)
            .await?;
        Ok(into_raw(things, |t| RawItem::Submission(t.into())))
    }
}

/// 多版块版务日志（实例 = 多版块名称）
pub struct RedditModLog {
    client: Arc<RedditClient>,
    owner: String,
}

impl RedditModLog {
    pub fn new(client: Arc<RedditClient>, owner: impl Into<String>) -> Self {
        Self {
            client,
            owner: owner.into(),
        }
    }
}

#[async_trait]
impl ItemFetcher for RedditModLog {
    async fn fetch(
        &self,
        instance: &str,
        cursor_hint: Option<&str>,
        limit: usize,
    ) -> Result<Vec<RawItem>, RelayError> {
        let path = format!("/user/{}/m/{}/about/log", self.owner, instance);
        let things = self
            .client
            .listing::<ModActionThing>(&path, cursor_hint, limit)
            .await?;
        Ok(into_raw(things, |t| RawItem::ModAction(t.into())))
    }
}
