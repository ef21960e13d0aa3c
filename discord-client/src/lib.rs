//! Discord REST client for polling channels and replying to messages.
//!
//! Only the HTTP API is used; no gateway connection is held open.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use netia_core::{
    truncate_text, ContentItem, ContentKind, CoreError, DiscordApiError, DiscordConfig, Platform,
    PlatformClient, RequestThrottle, Scope,
};
use reqwest::{Client, Method, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};
use url::Url;

const DISCORD_API_BASE: &str = "https://discord.com/api/v10/";
/// Discord rejects message content longer than this.
pub const MAX_MESSAGE_CHARS: usize = 2000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordUser {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub bot: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordMessage {
    pub id: String,
    pub channel_id: String,
    #[serde(default)]
    pub content: String,
    pub author: DiscordUser,
    pub timestamp: DateTime<Utc>,
}

#[derive(Serialize)]
struct CreateMessage<'a> {
    content: &'a str,
    message_reference: MessageReference<'a>,
    allowed_mentions: AllowedMentions,
}

#[derive(Serialize)]
struct MessageReference<'a> {
    message_id: &'a str,
    channel_id: &'a str,
    fail_if_not_exists: bool,
}

#[derive(Serialize)]
struct AllowedMentions {
    parse: Vec<String>,
    replied_user: bool,
}

#[derive(Deserialize)]
struct RateLimitBody {
    retry_after: f64,
}

pub struct DiscordClient {
    http_client: Client,
    base_url: Url,
    token: String,
    throttle: Arc<RequestThrottle>,
    bot_user: RwLock<Option<DiscordUser>>,
}

impl DiscordClient {
    pub fn new(token: String, throttle: Arc<RequestThrottle>) -> Result<Self, CoreError> {
        Self::with_base_url(token, throttle, DISCORD_API_BASE)
    }

    pub fn from_config(config: &DiscordConfig, throttle: Arc<RequestThrottle>) -> Result<Self, CoreError> {
        if !config.enabled {
            return Err(CoreError::DiscordApi(DiscordApiError::Disabled));
        }
        Self::new(config.bot_token.clone(), throttle)
    }

    pub fn with_base_url(
        token: String,
        throttle: Arc<RequestThrottle>,
        base_url: &str,
    ) -> Result<Self, CoreError> {
        let mut base_url = Url::parse(base_url).map_err(|e| CoreError::InvalidInput {
            message: format!("invalid Discord API base URL: {}", e),
        })?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http_client = Client::builder()
            .user_agent(concat!(
                "DiscordBot (https://netiawebsite.vercel.app, ",
                env!("CARGO_PKG_VERSION"),
                ")"
            ))
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http_client,
            base_url,
            token,
            throttle,
            bot_user: RwLock::new(None),
        })
    }

    pub async fn bot_user(&self) -> Option<DiscordUser> {
        self.bot_user.read().await.clone()
    }

    async fn request<B: Serialize + ?Sized>(
        &self,
        method: Method,
        endpoint: &str,
        query: Option<&[(&str, &str)]>,
        body: Option<&B>,
        channel_id: Option<&str>,
    ) -> Result<Response, CoreError> {
        let url = self
            .base_url
            .join(endpoint.trim_start_matches('/'))
            .map_err(|e| CoreError::InvalidInput {
                message: format!("invalid Discord endpoint {}: {}", endpoint, e),
            })?;

        self.throttle.acquire().await;

        let mut builder = self
            .http_client
            .request(method.clone(), url)
            .header(reqwest::header::AUTHORIZATION, format!("Bot {}", self.token));
        if let Some(query) = query {
            builder = builder.query(query);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        debug!("Making Discord API request: {} {}", method, endpoint);
        let response = builder.send().await.map_err(|e| {
            error!("Network error for {} {}: {}", method, endpoint, e);
            CoreError::Network(e)
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        warn!("Discord request failed with status: {} for {}", status, endpoint);
        Err(self.status_error(status, response, endpoint, channel_id).await)
    }

    async fn status_error(
        &self,
        status: StatusCode,
        response: Response,
        endpoint: &str,
        channel_id: Option<&str>,
    ) -> CoreError {
        let error = match status.as_u16() {
            401 => DiscordApiError::Unauthorized,
            403 => DiscordApiError::Forbidden {
                resource: endpoint.to_string(),
            },
            404 => match channel_id {
                Some(channel_id) => DiscordApiError::ChannelNotFound {
                    channel_id: channel_id.to_string(),
                },
                None => {
                    return CoreError::NotFound {
                        resource: endpoint.to_string(),
                    }
                }
            },
            429 => {
                let retry_after = response
                    .json::<RateLimitBody>()
                    .await
                    .map(|body| body.retry_after)
                    .unwrap_or(1.0);
                DiscordApiError::RateLimited {
                    retry_after_ms: (retry_after * 1000.0).ceil() as u64,
                }
            }
            code if status.is_server_error() => DiscordApiError::ServerError { status_code: code },
            code => {
                return CoreError::RequestFailed {
                    message: format!("Discord {} returned HTTP {}", endpoint, code),
                    status_code: Some(code),
                }
            }
        };
        CoreError::DiscordApi(error)
    }

    pub async fn get_current_user(&self) -> Result<DiscordUser, CoreError> {
        let response = self
            .request::<()>(Method::GET, "/users/@me", None, None, None)
            .await?;
        response.json().await.map_err(|e| {
            error!("Failed to parse current user: {}", e);
            CoreError::DiscordApi(DiscordApiError::InvalidResponse {
                details: "Failed to parse current user".to_string(),
            })
        })
    }

    pub async fn get_channel_messages(
        &self,
        channel_id: &str,
        limit: u32,
    ) -> Result<Vec<DiscordMessage>, CoreError> {
        let limit = limit.clamp(1, 100).to_string();
        let endpoint = format!("/channels/{}/messages", channel_id);
        let response = self
            .request::<()>(
                Method::GET,
                &endpoint,
                Some(&[("limit", limit.as_str())]),
                None,
                Some(channel_id),
            )
            .await?;

        response.json().await.map_err(|e| {
            error!("Failed to parse messages for channel {}: {}", channel_id, e);
            CoreError::DiscordApi(DiscordApiError::InvalidResponse {
                details: format!("Failed to parse messages for channel {}", channel_id),
            })
        })
    }

    /// Returns the content as sent, after truncation.
    pub async fn reply_to_message(
        &self,
        channel_id: &str,
        message_id: &str,
        content: &str,
    ) -> Result<String, CoreError> {
        let content = truncate_text(content, MAX_MESSAGE_CHARS);
        let body = CreateMessage {
            content: &content,
            message_reference: MessageReference {
                message_id,
                channel_id,
                fail_if_not_exists: false,
            },
            allowed_mentions: AllowedMentions {
                parse: Vec::new(),
                replied_user: false,
            },
        };
        let endpoint = format!("/channels/{}/messages", channel_id);
        self.request(Method::POST, &endpoint, None, Some(&body), Some(channel_id))
            .await?;
        info!("Replied to message {} in channel {}", message_id, channel_id);
        Ok(content)
    }

    async fn is_own(&self, author: &DiscordUser) -> bool {
        if author.bot {
            return true;
        }
        matches!(self.bot_user.read().await.as_ref(), Some(me) if me.id == author.id)
    }
}

#[async_trait]
impl PlatformClient for DiscordClient {
    fn platform(&self) -> Platform {
        Platform::Discord
    }

    async fn verify(&self) -> Result<(), CoreError> {
        let me = self.get_current_user().await?;
        info!("Discord credentials verified for {} ({})", me.username, me.id);
        *self.bot_user.write().await = Some(me);
        Ok(())
    }

    async fn recent_content(
        &self,
        scope: &Scope,
        limit: u32,
    ) -> Result<Vec<ContentItem>, CoreError> {
        let Scope::Channel {
            guild_id,
            channel_id,
        } = scope
        else {
            return Err(CoreError::InvalidInput {
                message: format!("{} is not a Discord channel", scope),
            });
        };

        let messages = self.get_channel_messages(channel_id, limit).await?;
        let mut items = Vec::with_capacity(messages.len());
        for message in messages {
            if self.is_own(&message.author).await {
                continue;
            }
            items.push(ContentItem {
                id: message.id,
                kind: ContentKind::Message,
                author: message.author.username,
                title: None,
                body: message.content,
                scope: Scope::channel(guild_id.clone(), message.channel_id),
                parent_id: None,
                created_at: message.timestamp,
            });
        }
        debug!("{} candidate messages in {}", items.len(), scope);
        Ok(items)
    }

    async fn reply(&self, item: &ContentItem, text: &str) -> Result<String, CoreError> {
        match &item.scope {
            Scope::Channel { channel_id, .. } => {
                self.reply_to_message(channel_id, &item.id, text).await
            }
            other => Err(CoreError::InvalidInput {
                message: format!("{} is not a Discord channel", other),
            }),
        }
    }
}
