use crate::{ContentItem, CoreError, Platform, Scope};
use async_trait::async_trait;

/// Read and reply surface of a chat or forum platform.
#[async_trait]
pub trait PlatformClient: Send + Sync {
    fn platform(&self) -> Platform;

    /// Confirms credentials work. Called once before the first tick.
    async fn verify(&self) -> Result<(), CoreError>;

    /// Newest content in `scope`, at most `limit` items. Content authored by
    /// the bot itself is never returned.
    async fn recent_content(&self, scope: &Scope, limit: u32)
        -> Result<Vec<ContentItem>, CoreError>;

    /// Posts `text` as a reply and returns the text the platform received,
    /// which may be shortened to fit its message limit.
    async fn reply(&self, item: &ContentItem, text: &str) -> Result<String, CoreError>;

    /// Scopes to poll on behalf of a rule with the given scope filter.
    ///
    /// Without a filter the defaults are polled. A filter keeps the defaults it
    /// selects.
    fn scopes_for_rule(&self, filter: Option<&str>, defaults: &[Scope]) -> Vec<Scope> {
        match filter.map(str::trim) {
            None | Some("") => defaults.to_vec(),
            Some(filter) => defaults
                .iter()
                .filter(|scope| scope.matches_filter(filter))
                .cloned()
                .collect(),
        }
    }
}
