use chrono::{DateTime, Utc};
use netia_core::{ContentItem, ContentKind, CoreError, RedditApiError, Scope};
use reqwest::{Client, Method, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use url::Url;

const REDDIT_API_BASE: &str = "https://oauth.reddit.com/";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListing<T> {
    pub kind: String,
    pub data: RedditListingData<T>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListingData<T> {
    pub children: Vec<RedditListingChild<T>>,
    pub after: Option<String>,
    pub before: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListingChild<T> {
    pub kind: String,
    pub data: T,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditPostData {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub selftext: String,
    pub author: String,
    pub subreddit: String,
    #[serde(default)]
    pub permalink: String,
    pub created_utc: f64,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub archived: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditCommentData {
    pub id: String,
    pub body: String,
    pub author: String,
    pub subreddit: String,
    /// Fullname of the post the comment belongs to (`t3_...`).
    pub link_id: String,
    pub created_utc: f64,
    #[serde(default)]
    pub locked: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditUserData {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct CommentResponse {
    json: CommentResponseBody,
}

#[derive(Debug, Deserialize)]
struct CommentResponseBody {
    #[serde(default)]
    errors: Vec<Vec<serde_json::Value>>,
}

#[derive(Debug)]
pub struct RedditApiClient {
    http_client: Client,
    base_url: Url,
    user_agent: String,
}

impl RedditApiClient {
    pub fn new(user_agent: String) -> Result<Self, CoreError> {
        Self::with_base_url(user_agent, REDDIT_API_BASE)
    }

    pub fn with_base_url(user_agent: String, base_url: &str) -> Result<Self, CoreError> {
        let mut base_url = Url::parse(base_url).map_err(|e| CoreError::InvalidInput {
            message: format!("invalid Reddit API base URL: {}", e),
        })?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http_client = Client::builder()
            .user_agent(&user_agent)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http_client,
            base_url,
            user_agent,
        })
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    fn endpoint_url(&self, endpoint: &str) -> Result<Url, CoreError> {
        self.base_url
            .join(endpoint.trim_start_matches('/'))
            .map_err(|e| CoreError::InvalidInput {
                message: format!("invalid Reddit endpoint {}: {}", endpoint, e),
            })
    }

    pub async fn make_request(
        &self,
        method: Method,
        endpoint: &str,
        access_token: &str,
        query_params: Option<&[(&str, &str)]>,
        form: Option<&[(&str, &str)]>,
    ) -> Result<Response, CoreError> {
        let url = self.endpoint_url(endpoint)?;

        let mut request_builder = self
            .http_client
            .request(method.clone(), url)
            .bearer_auth(access_token);

        if let Some(params) = query_params {
            request_builder = request_builder.query(params);
        }
        if let Some(fields) = form {
            request_builder = request_builder.form(fields);
        }

        debug!("Making Reddit API request: {} {}", method, endpoint);
        let response = match request_builder.send().await {
            Ok(response) => response,
            Err(e) => {
                error!("Network error for {} {}: {}", method, endpoint, e);
                if e.is_timeout() {
                    return Err(CoreError::RedditApi(RedditApiError::RequestTimeout));
                }
                return Err(CoreError::Network(e));
            }
        };

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        warn!("Request failed with status: {} for {}", status, endpoint);
        let error = match status.as_u16() {
            429 => {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.trim().parse::<f64>().ok())
                    .map(|secs| secs.ceil() as u64)
                    .unwrap_or(60);
                CoreError::RedditApi(RedditApiError::RateLimitExceeded { retry_after })
            }
            401 => CoreError::RedditApi(RedditApiError::InvalidToken),
            403 => CoreError::RedditApi(RedditApiError::Forbidden {
                resource: endpoint.to_string(),
            }),
            404 => CoreError::NotFound {
                resource: endpoint.to_string(),
            },
            code if status.is_server_error() => {
                CoreError::RedditApi(RedditApiError::ServerError { status_code: code })
            }
            code => CoreError::RequestFailed {
                message: format!("{} {} returned HTTP {}", method, endpoint, code),
                status_code: Some(code),
            },
        };
        Err(error)
    }

    pub async fn get_user_info(&self, access_token: &str) -> Result<RedditUserData, CoreError> {
        let response = self
            .make_request(Method::GET, "/api/v1/me", access_token, None, None)
            .await?;

        let user_data: RedditUserData = response.json().await.map_err(|e| {
            error!("Failed to parse user data: {}", e);
            CoreError::RedditApi(RedditApiError::InvalidResponse {
                details: "Failed to parse user data".to_string(),
            })
        })?;

        debug!("Retrieved user info for: {}", user_data.name);
        Ok(user_data)
    }

    pub async fn get_new_posts(
        &self,
        access_token: &str,
        subreddit: &str,
        limit: u32,
    ) -> Result<RedditListing<RedditPostData>, CoreError> {
        let listing = self
            .get_listing(access_token, subreddit, &format!("/r/{}/new", subreddit), limit)
            .await?;
        info!(
            "Retrieved {} new posts from r/{}",
            listing.data.children.len(),
            subreddit
        );
        Ok(listing)
    }

    pub async fn get_new_comments(
        &self,
        access_token: &str,
        subreddit: &str,
        limit: u32,
    ) -> Result<RedditListing<RedditCommentData>, CoreError> {
        let listing = self
            .get_listing(
                access_token,
                subreddit,
                &format!("/r/{}/comments", subreddit),
                limit,
            )
            .await?;
        info!(
            "Retrieved {} new comments from r/{}",
            listing.data.children.len(),
            subreddit
        );
        Ok(listing)
    }

    async fn get_listing<T: serde::de::DeserializeOwned>(
        &self,
        access_token: &str,
        subreddit: &str,
        endpoint: &str,
        limit: u32,
    ) -> Result<RedditListing<T>, CoreError> {
        let limit = limit.clamp(1, 100).to_string();
        let params = [("limit", limit.as_str()), ("raw_json", "1")];

        let response = self
            .make_request(Method::GET, endpoint, access_token, Some(&params), None)
            .await
            .map_err(|e| match e {
                CoreError::NotFound { .. } => {
                    CoreError::RedditApi(RedditApiError::SubredditNotFound {
                        subreddit: subreddit.to_string(),
                    })
                }
                other => other,
            })?;

        response.json().await.map_err(|e| {
            error!("Failed to parse listing {}: {}", endpoint, e);
            CoreError::RedditApi(RedditApiError::InvalidResponse {
                details: format!("Failed to parse listing for r/{}", subreddit),
            })
        })
    }

    /// Posts `text` as a reply to the thing with fullname `thing_id`.
    pub async fn submit_comment(
        &self,
        access_token: &str,
        thing_id: &str,
        text: &str,
    ) -> Result<(), CoreError> {
        let form = [("api_type", "json"), ("thing_id", thing_id), ("text", text)];
        let response = self
            .make_request(Method::POST, "/api/comment", access_token, None, Some(&form))
            .await?;

        let body: CommentResponse = response.json().await.map_err(|e| {
            error!("Failed to parse comment response: {}", e);
            CoreError::RedditApi(RedditApiError::InvalidResponse {
                details: "Failed to parse comment response".to_string(),
            })
        })?;

        if let Some(first) = body.json.errors.first() {
            let reason = first
                .iter()
                .filter_map(|v| v.as_str())
                .collect::<Vec<_>>()
                .join(": ");
            return Err(CoreError::RedditApi(RedditApiError::ReplyRejected { reason }));
        }

        info!("Posted reply to {}", thing_id);
        Ok(())
    }
}

fn timestamp(created_utc: f64) -> DateTime<Utc> {
    DateTime::from_timestamp(created_utc as i64, 0).unwrap_or_else(Utc::now)
}

impl From<RedditPostData> for ContentItem {
    fn from(post: RedditPostData) -> Self {
        Self {
            id: post.id,
            kind: ContentKind::Post,
            author: post.author,
            title: Some(post.title),
            body: post.selftext,
            scope: Scope::subreddit(&post.subreddit),
            parent_id: None,
            created_at: timestamp(post.created_utc),
        }
    }
}

impl From<RedditCommentData> for ContentItem {
    fn from(comment: RedditCommentData) -> Self {
        let parent = comment
            .link_id
            .strip_prefix("t3_")
            .unwrap_or(&comment.link_id)
            .to_string();
        Self {
            id: comment.id,
            kind: ContentKind::Comment,
            author: comment.author,
            title: None,
            body: comment.body,
            scope: Scope::subreddit(&comment.subreddit),
            parent_id: Some(parent),
            created_at: timestamp(comment.created_utc),
        }
    }
}

/// Reddit fullname for a reply target.
pub fn thing_id(item: &ContentItem) -> Result<String, CoreError> {
    match item.kind {
        ContentKind::Post => Ok(format!("t3_{}", item.id)),
        ContentKind::Comment => Ok(format!("t1_{}", item.id)),
        ContentKind::Message => Err(CoreError::InvalidInput {
            message: format!("{} is not a Reddit post or comment", item.id),
        }),
    }
}
