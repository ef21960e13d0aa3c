pub mod api;
pub mod auth;
mod tests;

pub use api::{RedditApiClient, RedditCommentData, RedditPostData};
pub use auth::{AuthState, RedditAuth, RedditOAuth2Config, RedditToken};

use async_trait::async_trait;
use netia_core::{
    ContentItem, CoreError, Platform, PlatformClient, RedditApiError, RequestThrottle, Scope,
};
use std::sync::Arc;
use tracing::{debug, info};

/// Reddit bot account: reads new posts and comments, replies as the account user.
pub struct RedditClient {
    auth: RedditAuth,
    api: RedditApiClient,
    throttle: Arc<RequestThrottle>,
}

impl RedditClient {
    pub fn new(config: RedditOAuth2Config, throttle: Arc<RequestThrottle>) -> Result<Self, CoreError> {
        let api = RedditApiClient::new(config.user_agent.clone())?;
        Ok(Self::with_api(config, api, throttle))
    }

    pub fn with_api(
        config: RedditOAuth2Config,
        api: RedditApiClient,
        throttle: Arc<RequestThrottle>,
    ) -> Self {
        Self {
            auth: RedditAuth::new(config),
            api,
            throttle,
        }
    }

    pub fn username(&self) -> &str {
        &self.auth.config().username
    }

    pub async fn auth_state(&self) -> AuthState {
        self.auth.auth_state().await
    }

    fn is_own(&self, author: &str) -> bool {
        author.eq_ignore_ascii_case(self.username())
    }

    fn should_skip(&self, author: &str) -> bool {
        self.is_own(author) || author == "[deleted]" || author == "AutoModerator"
    }

    /// Runs `call` with a fresh token, re-authenticating once when Reddit
    /// reports the cached token as invalid. The caller acquires the throttle
    /// for the first attempt; the retry waits for its own slot.
    async fn with_token<T, F, Fut>(&self, call: F) -> Result<T, CoreError>
    where
        F: Fn(String) -> Fut,
        Fut: std::future::Future<Output = Result<T, CoreError>>,
    {
        let token = self.auth.access_token().await?;
        match call(token).await {
            Err(CoreError::RedditApi(RedditApiError::InvalidToken)) => {
                debug!("Reddit token rejected, re-authenticating");
                self.auth.invalidate().await;
                let token = self.auth.access_token().await?;
                self.throttle.acquire().await;
                call(token).await
            }
            other => other,
        }
    }
}

#[async_trait]
impl PlatformClient for RedditClient {
    fn platform(&self) -> Platform {
        Platform::Reddit
    }

    async fn verify(&self) -> Result<(), CoreError> {
        self.throttle.acquire().await;
        let me = self
            .with_token(|token| async move { self.api.get_user_info(&token).await })
            .await?;
        if !self.is_own(&me.name) {
            return Err(CoreError::RedditApi(RedditApiError::AuthenticationFailed {
                reason: format!(
                    "token belongs to u/{}, expected u/{}",
                    me.name,
                    self.username()
                ),
            }));
        }
        info!("Reddit credentials verified for u/{}", me.name);
        Ok(())
    }

    async fn recent_content(
        &self,
        scope: &Scope,
        limit: u32,
    ) -> Result<Vec<ContentItem>, CoreError> {
        let Scope::Subreddit(subreddit) = scope else {
            return Err(CoreError::InvalidInput {
                message: format!("{} is not a subreddit", scope),
            });
        };

        self.throttle.acquire().await;
        let posts = self
            .with_token(|token| async move {
                self.api.get_new_posts(&token, subreddit, limit).await
            })
            .await?;

        self.throttle.acquire().await;
        let comments = self
            .with_token(|token| async move {
                self.api.get_new_comments(&token, subreddit, limit).await
            })
            .await?;

        let items: Vec<ContentItem> = posts
            .data
            .children
            .into_iter()
            .map(|child| child.data)
            .filter(|post| !post.locked && !post.archived)
            .map(ContentItem::from)
            .chain(
                comments
                    .data
                    .children
                    .into_iter()
                    .map(|child| child.data)
                    .filter(|comment| !comment.locked)
                    .map(ContentItem::from),
            )
            .filter(|item| !self.should_skip(&item.author))
            .collect();

        debug!("{} candidate items in r/{}", items.len(), subreddit);
        Ok(items)
    }

    async fn reply(&self, item: &ContentItem, text: &str) -> Result<String, CoreError> {
        let thing_id = api::thing_id(item)?;
        self.throttle.acquire().await;
        self.with_token(|token| {
            let thing_id = thing_id.clone();
            async move { self.api.submit_comment(&token, &thing_id, text).await }
        })
        .await?;
        Ok(text.to_string())
    }

    /// A scoped rule watches exactly the subreddit it names.
    fn scopes_for_rule(&self, filter: Option<&str>, defaults: &[Scope]) -> Vec<Scope> {
        match filter.map(str::trim) {
            None | Some("") => defaults.to_vec(),
            Some(subreddit) => vec![Scope::subreddit(subreddit)],
        }
    }
}
