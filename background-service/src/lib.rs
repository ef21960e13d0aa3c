mod activity_log;
mod context;

pub use activity_log::ActivityLog;
pub use context::DispatchContext;

use content_matcher::ContentMatcher;
use llm_interface::ResponseGenerator;
use netia_core::{
    BotStore, BusinessProfile, ContentItem, CoreError, DispatchError, ErrorExt, KeywordRule,
    NewActivity, Platform, PlatformClient, Scope,
};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Counters for one poll cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickReport {
    pub rules: usize,
    pub scopes_checked: usize,
    pub scopes_failed: usize,
    pub items_seen: usize,
    pub duplicates_skipped: usize,
    pub matched: usize,
    pub replied: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotStats {
    pub platform: Platform,
    pub total_activities: u64,
    pub successful: u64,
    pub failed: u64,
    pub success_rate: f64,
    pub last_24h: u64,
    pub active_keywords: u64,
    pub is_running: bool,
    pub voice_enabled: bool,
    pub handled_items: usize,
}

/// Polls one platform on a fixed interval and answers content that matches
/// an active keyword rule.
pub struct BackgroundService {
    platform: Arc<dyn PlatformClient>,
    store: Arc<dyn BotStore>,
    generator: ResponseGenerator,
    matcher: ContentMatcher,
    activity_log: ActivityLog,
    default_scopes: Vec<Scope>,
    polling_interval: Duration,
    fetch_limit: u32,
    is_running: AtomicBool,
    shutdown: CancellationToken,
    context: Mutex<DispatchContext>,
}

impl BackgroundService {
    pub fn new(
        platform: Arc<dyn PlatformClient>,
        store: Arc<dyn BotStore>,
        generator: ResponseGenerator,
        polling_interval: Duration,
    ) -> Self {
        Self {
            platform,
            activity_log: ActivityLog::new(store.clone()),
            store,
            generator,
            matcher: ContentMatcher::new(),
            default_scopes: Vec::new(),
            polling_interval,
            fetch_limit: 10,
            is_running: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
            context: Mutex::new(DispatchContext::new()),
        }
    }

    pub fn with_default_scopes(mut self, scopes: Vec<Scope>) -> Self {
        self.default_scopes = scopes;
        self
    }

    pub fn with_fetch_limit(mut self, limit: u32) -> Self {
        self.fetch_limit = limit.max(1);
        self
    }

    pub fn with_matcher(mut self, matcher: ContentMatcher) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn platform(&self) -> Platform {
        self.platform.platform()
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    /// Verifies credentials, then polls until [`stop`](Self::stop) is called.
    ///
    /// Only a failed credential check is returned as an error. Calling this
    /// while the service is already running does nothing.
    pub async fn start(&self) -> Result<(), CoreError> {
        let platform = self.platform();
        if self.shutdown.is_cancelled() {
            warn!("{} bot was stopped and cannot be restarted", platform);
            return Ok(());
        }
        if self.is_running.swap(true, Ordering::SeqCst) {
            warn!("{} bot is already running", platform);
            return Ok(());
        }

        if let Err(e) = self.platform.verify().await {
            self.is_running.store(false, Ordering::SeqCst);
            e.log_error();
            return Err(e);
        }

        info!(
            "{} bot started, polling every {}s",
            platform,
            self.polling_interval.as_secs()
        );

        let mut ticker = tokio::time::interval(self.polling_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let report = self.run_tick().await;
                    info!(
                        "{} poll: {} scopes ({} failed), {} items, {} matched, {} replied, {} failed",
                        platform,
                        report.scopes_checked,
                        report.scopes_failed,
                        report.items_seen,
                        report.matched,
                        report.replied,
                        report.failed
                    );
                }
            }
        }

        info!("{} bot polling loop exited", platform);
        Ok(())
    }

    /// Stops future ticks and closes the store. A tick already in progress runs to completion.
    pub async fn stop(&self) {
        self.is_running.store(false, Ordering::SeqCst);
        self.shutdown.cancel();
        self.store.close().await;
        info!("{} bot stopped", self.platform());
    }

    /// One full poll cycle. Errors are logged and counted, never returned.
    pub async fn run_tick(&self) -> TickReport {
        let mut context = self.context.lock().await;
        let mut report = TickReport::default();
        let platform = self.platform();

        let rules = match self.store.active_rules().await {
            Ok(rules) => rules,
            Err(source) => {
                DispatchError::Persistence { source }.log_error();
                return report;
            }
        };
        report.rules = rules.len();
        if rules.is_empty() {
            info!("No active keyword rules, skipping {} poll", platform);
            return report;
        }

        let profile = match self.store.business_profile().await {
            Ok(profile) => profile,
            Err(e) => {
                e.log_warn();
                warn!("Using the default business profile");
                BusinessProfile::default()
            }
        };

        let defaults = self.monitored_scopes().await;
        let scopes = self.target_scopes(&rules, &defaults);
        debug!("{} poll covers {} scopes", platform, scopes.len());

        for scope in &scopes {
            report.scopes_checked += 1;
            let items = match self.platform.recent_content(scope, self.fetch_limit).await {
                Ok(items) => items,
                Err(source) => {
                    DispatchError::Fetch {
                        scope: scope.to_string(),
                        source,
                    }
                    .log_warn();
                    report.scopes_failed += 1;
                    continue;
                }
            };

            for item in &items {
                report.items_seen += 1;
                if context.is_handled(&item.id) {
                    report.duplicates_skipped += 1;
                    continue;
                }

                let Some(rule) = self.matcher.first_match(item, &rules) else {
                    continue;
                };
                report.matched += 1;

                if self.dispatch(item, rule, &profile).await {
                    context.mark_handled(&item.id);
                    report.replied += 1;
                } else {
                    report.failed += 1;
                }
            }
        }

        report
    }

    /// Generates, posts and logs one reply. Returns whether the reply was posted.
    async fn dispatch(
        &self,
        item: &ContentItem,
        rule: &KeywordRule,
        profile: &BusinessProfile,
    ) -> bool {
        let response = self.generator.generate(item, rule, profile).await;

        match self.platform.reply(item, &response).await {
            Ok(sent) => {
                info!(
                    "Replied to {} in {} (keyword '{}')",
                    item.id,
                    item.scope.label(),
                    rule.keyword
                );
                self.activity_log
                    .record(&NewActivity::succeeded(item, rule, sent))
                    .await;
                true
            }
            Err(source) => {
                DispatchError::Post {
                    content_id: item.id.clone(),
                    source,
                }
                .log_error();
                self.activity_log
                    .record(&NewActivity::failed(item, rule))
                    .await;
                false
            }
        }
    }

    /// Configured defaults followed by scopes enabled in the store.
    async fn monitored_scopes(&self) -> Vec<Scope> {
        let mut scopes = self.default_scopes.clone();
        match self.store.monitored_scopes(self.platform()).await {
            Ok(stored) => {
                for scope in stored {
                    if !scopes.contains(&scope) {
                        scopes.push(scope);
                    }
                }
            }
            Err(e) => {
                e.log_warn();
            }
        }
        scopes
    }

    /// Every scope some rule wants polled, each once, in rule order.
    fn target_scopes(&self, rules: &[KeywordRule], defaults: &[Scope]) -> Vec<Scope> {
        let mut scopes: Vec<Scope> = Vec::new();
        for rule in rules.iter().filter(|rule| rule.is_active) {
            for scope in self.platform.scopes_for_rule(rule.scope.as_deref(), defaults) {
                if !scopes.contains(&scope) {
                    scopes.push(scope);
                }
            }
        }
        scopes
    }

    pub async fn stats(&self) -> Result<BotStats, CoreError> {
        let platform = self.platform();
        let counts = self.store.platform_counts(platform).await?;
        let active_keywords = self.store.count_active_rules().await?;
        let handled_items = self.context.lock().await.len();

        let success_rate = if counts.total == 0 {
            0.0
        } else {
            (counts.successful as f64 / counts.total as f64 * 10_000.0).round() / 100.0
        };

        Ok(BotStats {
            platform,
            total_activities: counts.total,
            successful: counts.successful,
            failed: counts.total.saturating_sub(counts.successful),
            success_rate,
            last_24h: counts.last_24h,
            active_keywords,
            is_running: self.is_running(),
            voice_enabled: self.generator.voice_enabled(),
            handled_items,
        })
    }
}
