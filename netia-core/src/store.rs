use crate::{BusinessProfile, CoreError, KeywordRule, NewActivity, Platform, PlatformActivityCounts, Scope};
use async_trait::async_trait;

/// Persistence the dispatch loop depends on.
#[async_trait]
pub trait BotStore: Send + Sync {
    async fn active_rules(&self) -> Result<Vec<KeywordRule>, CoreError>;

    /// Falls back to [`BusinessProfile::default`] when none is stored.
    async fn business_profile(&self) -> Result<BusinessProfile, CoreError>;

    /// Extra scopes configured in storage, e.g. enabled Discord channels.
    async fn monitored_scopes(&self, platform: Platform) -> Result<Vec<Scope>, CoreError>;

    async fn append_activity(&self, activity: &NewActivity) -> Result<(), CoreError>;

    async fn platform_counts(&self, platform: Platform)
        -> Result<PlatformActivityCounts, CoreError>;

    async fn count_active_rules(&self) -> Result<u64, CoreError>;

    async fn close(&self);
}
