//! Slack transport: `auth.test` on connect, `conversations.history` polling per channel,
//! and threaded `chat.postMessage` replies via the Web API.

use crate::config::SlackConfig;
use crate::error::TransportError;
use crate::events::InboundEvent;
use crate::transport::{ChatTransport, PostedReply};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

const DEFAULT_RETRY_AFTER_SECS: u64 = 1;
/// Upper bound on `users.conversations` pages followed during channel discovery.
const MAX_DISCOVERY_PAGES: usize = 20;
/// Upper bound on `conversations.history` pages followed per channel per read.
const MAX_HISTORY_PAGES: usize = 20;

/// Common Slack response envelope: `ok`, optional `error`, method-specific fields.
#[derive(Debug, Deserialize)]
struct SlackResponse<T> {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(flatten)]
    data: T,
}

#[derive(Debug, Default, Deserialize)]
struct AuthTest {
    #[serde(default)]
    user_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct History {
    #[serde(default)]
    messages: Vec<InboundEvent>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    response_metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Default, Deserialize)]
struct Conversations {
    #[serde(default)]
    channels: Vec<ConversationRef>,
    #[serde(default)]
    response_metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Deserialize)]
struct ConversationRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ResponseMetadata {
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PostMessage {
    #[serde(default)]
    ts: Option<String>,
    #[serde(default)]
    channel: Option<String>,
}

/// Slack Web API client holding per-channel read cursors.
pub struct SlackTransport {
    client: reqwest::Client,
    api_base: String,
    token: String,
    channels: Vec<String>,
    history_limit: u32,
    /// channel id -> newest `ts` already delivered (exclusive lower bound for the next read).
    cursors: HashMap<String, String>,
}

impl SlackTransport {
    pub fn new(token: impl Into<String>, config: &SlackConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms.max(1)))
            .build()?;
        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token: token.into().trim().to_string(),
            channels: config.channels.clone(),
            history_limit: config.history_limit.max(1),
            cursors: HashMap::new(),
        })
    }

    /// Channels currently being watched.
    pub fn channels(&self) -> &[String] {
        &self.channels
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{}", self.api_base, method)
    }

    /// Send a request and decode the Slack envelope, mapping `ok: false`, HTTP errors and 429s.
    async fn call<T>(&self, method: &str, req: reqwest::RequestBuilder) -> Result<T, TransportError>
    where
        T: DeserializeOwned,
    {
        let res = req.bearer_auth(&self.token).send().await?;
        let status = res.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = res
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
            return Err(TransportError::RateLimited {
                retry_after: Duration::from_secs(retry_after),
            });
        }
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(TransportError::Http {
                method: method.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        let data: SlackResponse<T> = res.json().await?;
        if !data.ok {
            return Err(TransportError::from_api(
                method,
                data.error.unwrap_or_else(|| "unknown_error".to_string()),
            ));
        }
        Ok(data.data)
    }

    /// Channels the bot is a member of (`users.conversations`), following pagination.
    async fn discover_channels(&self) -> Result<Vec<String>, TransportError> {
        let mut channels = Vec::new();
        let mut cursor: Option<String> = None;
        for _ in 0..MAX_DISCOVERY_PAGES {
            let mut query = vec![
                ("types", "public_channel,private_channel".to_string()),
                ("exclude_archived", "true".to_string()),
                ("limit", "200".to_string()),
            ];
            if let Some(c) = &cursor {
                query.push(("cursor", c.clone()));
            }
            let page: Conversations = self
                .call(
                    "users.conversations",
                    self.client.get(self.url("users.conversations")).query(&query),
                )
                .await?;
            channels.extend(page.channels.into_iter().map(|c| c.id));
            cursor = page
                .response_metadata
                .and_then(|m| m.next_cursor)
                .filter(|c| !c.is_empty());
            if cursor.is_none() {
                break;
            }
        }
        Ok(channels)
    }

    /// Messages newer than `oldest` in one channel, oldest first, tagged with the channel id.
    ///
    /// Follows `next_cursor` while Slack reports `has_more`, so a window holding more than
    /// `history_limit` messages is read in full before the caller advances its cursor.
    async fn channel_history(
        &self,
        channel: &str,
        oldest: Option<&str>,
    ) -> Result<Vec<InboundEvent>, TransportError> {
        let mut events = Vec::new();
        let mut cursor: Option<String> = None;
        let mut pages = 0;
        loop {
            let mut query = vec![
                ("channel", channel.to_string()),
                ("limit", self.history_limit.to_string()),
            ];
            if let Some(ts) = oldest {
                query.push(("oldest", ts.to_string()));
            }
            if let Some(c) = &cursor {
                query.push(("cursor", c.clone()));
            }
            let page: History = self
                .call(
                    "conversations.history",
                    self.client.get(self.url("conversations.history")).query(&query),
                )
                .await?;
            pages += 1;
            events.extend(page.messages);
            cursor = page
                .response_metadata
                .and_then(|m| m.next_cursor)
                .filter(|c| !c.is_empty());
            if !page.has_more || cursor.is_none() {
                break;
            }
            if pages >= MAX_HISTORY_PAGES {
                log::warn!(
                    "slack: {} has more than {} pages of new history; older messages skipped",
                    channel,
                    MAX_HISTORY_PAGES
                );
                break;
            }
        }
        // Slack returns newest first.
        let mut events: Vec<InboundEvent> = events
            .into_iter()
            .filter(|e| oldest.map_or(true, |o| ts_after(&e.timestamp, o)))
            .map(|mut e| {
                if e.channel_id.is_empty() {
                    e.channel_id = channel.to_string();
                }
                e
            })
            .collect();
        events.sort_by(|a, b| ts_key(&a.timestamp).cmp(&ts_key(&b.timestamp)));
        events.dedup_by(|a, b| a.timestamp == b.timestamp);
        Ok(events)
    }
}

#[async_trait]
impl ChatTransport for SlackTransport {
    async fn connect(&mut self) -> Result<String, TransportError> {
        let auth: AuthTest = self
            .call("auth.test", self.client.post(self.url("auth.test")))
            .await
            .map_err(|e| match e {
                TransportError::Api { method, error } => {
                    TransportError::Auth(format!("{}: {}", method, error))
                }
                other => other,
            })?;
        let user_id = auth
            .user_id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| TransportError::Auth("auth.test did not return user_id".to_string()))?;

        if self.channels.is_empty() {
            self.channels = self.discover_channels().await?;
            if self.channels.is_empty() {
                return Err(TransportError::NoChannels);
            }
            log::info!(
                "slack: watching {} channel(s) the bot is a member of",
                self.channels.len()
            );
        } else {
            log::info!("slack: watching configured channels {:?}", self.channels);
        }

        // Only messages posted after connecting are considered.
        let now = slack_ts_now();
        self.cursors = self
            .channels
            .iter()
            .map(|c| (c.clone(), now.clone()))
            .collect();
        Ok(user_id)
    }

    async fn read_events(&mut self) -> Result<Vec<InboundEvent>, TransportError> {
        let mut batch = Vec::new();
        let mut advanced = Vec::new();
        for channel in &self.channels {
            let oldest = self.cursors.get(channel).map(String::as_str);
            match self.channel_history(channel, oldest).await {
                Ok(events) => {
                    if let Some(last) = events.last() {
                        advanced.push((channel.clone(), last.timestamp.clone()));
                    }
                    batch.extend(events);
                }
                Err(TransportError::Api { method, error }) => {
                    log::warn!("slack {} for {} failed: {}", method, channel, error);
                }
                // Cursors stay put so the next read sees the same messages.
                Err(e) => return Err(e),
            }
        }
        for (channel, ts) in advanced {
            self.cursors.insert(channel, ts);
        }
        Ok(batch)
    }

    async fn post_message(
        &self,
        channel_id: &str,
        thread_ts: &str,
        text: &str,
    ) -> Result<PostedReply, TransportError> {
        let body = serde_json::json!({
            "channel": channel_id,
            "thread_ts": thread_ts,
            "text": text,
        });
        let posted: PostMessage = self
            .call(
                "chat.postMessage",
                self.client.post(self.url("chat.postMessage")).json(&body),
            )
            .await?;
        Ok(PostedReply {
            channel_id: posted.channel.unwrap_or_else(|| channel_id.to_string()),
            thread_ts: thread_ts.to_string(),
            ts: posted.ts,
        })
    }
}

/// Current time as a Slack `ts` (`<seconds>.<microseconds>`).
pub fn slack_ts_now() -> String {
    let now = chrono::Utc::now();
    format!("{}.{:06}", now.timestamp(), now.timestamp_subsec_micros())
}

/// Numeric ordering key for a Slack `ts`; unparsable parts sort as zero.
fn ts_key(ts: &str) -> (u64, u64) {
    let (secs, frac) = ts.split_once('.').unwrap_or((ts, "0"));
    (secs.parse().unwrap_or(0), frac.parse().unwrap_or(0))
}

fn ts_after(ts: &str, than: &str) -> bool {
    ts_key(ts) > ts_key(than)
}
