mod activity;
mod rules;
mod tests;

pub use activity::{ActivityPage, ActivityQuery, ActivityStats, CountEntry};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use netia_core::{
    BotStore, BusinessProfile, CoreError, DatabaseError, DiscordChannelConfig, KeywordRule,
    NewActivity, NewVoiceInteraction, Platform, PlatformActivityCounts, Scope, VoiceInteraction,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use std::str::FromStr;
use tracing::{debug, info};

const BUSINESS_PROFILE_KEY: &str = "business_profile";

pub struct Database {
    connection_string: String,
    pool: Option<SqlitePool>,
}

impl Database {
    pub fn new(connection_string: String) -> Self {
        Self {
            connection_string,
            pool: None,
        }
    }

    /// Opens the pool, creating the database file when it does not exist.
    pub async fn connect(&mut self) -> Result<(), CoreError> {
        let options = SqliteConnectOptions::from_str(&self.connection_string)
            .map_err(|e| DatabaseError::ConnectionFailed {
                reason: e.to_string(),
            })?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| DatabaseError::ConnectionFailed {
                reason: e.to_string(),
            })?;

        info!("Connected to database {}", self.connection_string);
        self.pool = Some(pool);
        Ok(())
    }

    pub async fn run_migrations(&self) -> Result<(), CoreError> {
        sqlx::migrate!("./migrations")
            .run(self.pool()?)
            .await
            .map_err(|e| DatabaseError::MigrationFailed {
                migration: e.to_string(),
            })?;
        debug!("Database migrations applied");
        Ok(())
    }

    pub(crate) fn pool(&self) -> Result<&SqlitePool, CoreError> {
        self.pool
            .as_ref()
            .ok_or(CoreError::Database(DatabaseError::NotConnected))
    }

    pub async fn close(&self) {
        if let Some(pool) = &self.pool {
            pool.close().await;
            debug!("Database pool closed");
        }
    }

    pub async fn save_setting(&self, key: &str, value: &str) -> Result<(), CoreError> {
        sqlx::query(
            "INSERT INTO settings (key, value, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .bind(now_millis())
        .execute(self.pool()?)
        .await
        .map_err(DatabaseError::from)?;
        Ok(())
    }

    pub async fn get_setting(&self, key: &str) -> Result<Option<String>, CoreError> {
        let value = sqlx::query_scalar::<_, String>("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(self.pool()?)
            .await
            .map_err(DatabaseError::from)?;
        Ok(value)
    }

    /// The stored profile, or the built-in Netia profile when none was saved.
    pub async fn get_business_profile(&self) -> Result<BusinessProfile, CoreError> {
        match self.get_setting(BUSINESS_PROFILE_KEY).await? {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(BusinessProfile::default()),
        }
    }

    pub async fn save_business_profile(&self, profile: &BusinessProfile) -> Result<(), CoreError> {
        profile.validate()?;
        let json = serde_json::to_string(profile)?;
        self.save_setting(BUSINESS_PROFILE_KEY, &json).await?;
        info!("Saved business profile for {}", profile.name);
        Ok(())
    }

    /// Stores `profile` only when no profile has been saved yet. Returns whether it was stored.
    pub async fn seed_business_profile(&self, profile: &BusinessProfile) -> Result<bool, CoreError> {
        if self.get_setting(BUSINESS_PROFILE_KEY).await?.is_some() {
            return Ok(false);
        }
        self.save_business_profile(profile).await?;
        Ok(true)
    }

    pub async fn upsert_discord_config(
        &self,
        config: &DiscordChannelConfig,
    ) -> Result<(), CoreError> {
        if config.guild_id.trim().is_empty() {
            return Err(CoreError::InvalidInput {
                message: "guild id is required".to_string(),
            });
        }
        let channels = serde_json::to_string(&config.channels)?;
        sqlx::query(
            "INSERT INTO discord_channel_configs (guild_id, channels, enabled, updated_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(guild_id) DO UPDATE SET
                channels = excluded.channels,
                enabled = excluded.enabled,
                updated_at = excluded.updated_at",
        )
        .bind(config.guild_id.trim())
        .bind(channels)
        .bind(config.enabled)
        .bind(now_millis())
        .execute(self.pool()?)
        .await
        .map_err(DatabaseError::from)?;
        Ok(())
    }

    pub async fn list_discord_configs(&self) -> Result<Vec<DiscordChannelConfig>, CoreError> {
        let rows = sqlx::query_as::<_, DiscordConfigRow>(
            "SELECT guild_id, channels, enabled FROM discord_channel_configs ORDER BY guild_id",
        )
        .fetch_all(self.pool()?)
        .await
        .map_err(DatabaseError::from)?;

        rows.into_iter()
            .map(|row| -> Result<DiscordChannelConfig, CoreError> {
                Ok(DiscordChannelConfig {
                    channels: serde_json::from_str(&row.channels)?,
                    guild_id: row.guild_id,
                    enabled: row.enabled,
                })
            })
            .collect()
    }

    pub async fn enabled_discord_scopes(&self) -> Result<Vec<Scope>, CoreError> {
        Ok(self
            .list_discord_configs()
            .await?
            .into_iter()
            .filter(|config| config.enabled)
            .flat_map(|config| config.scopes())
            .collect())
    }

    pub async fn record_voice_interaction(
        &self,
        interaction: &NewVoiceInteraction,
    ) -> Result<VoiceInteraction, CoreError> {
        let record = VoiceInteraction {
            id: uuid::Uuid::new_v4().to_string(),
            post_id: interaction.post_id.clone(),
            comment_id: interaction.comment_id.clone(),
            scope: interaction.scope.clone(),
            transcription: interaction.transcription.clone(),
            ai_response: interaction.ai_response.clone(),
            success: interaction.success,
            timestamp: from_millis(now_millis()),
        };

        sqlx::query(
            "INSERT INTO voice_interactions
                (id, post_id, comment_id, scope, transcription, ai_response, success, timestamp)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.id)
        .bind(&record.post_id)
        .bind(&record.comment_id)
        .bind(&record.scope)
        .bind(&record.transcription)
        .bind(&record.ai_response)
        .bind(record.success)
        .bind(record.timestamp.timestamp_millis())
        .execute(self.pool()?)
        .await
        .map_err(DatabaseError::from)?;

        Ok(record)
    }

    /// Newest first.
    pub async fn list_voice_interactions(
        &self,
        limit: u32,
    ) -> Result<Vec<VoiceInteraction>, CoreError> {
        let rows = sqlx::query_as::<_, VoiceRow>(
            "SELECT id, post_id, comment_id, scope, transcription, ai_response, success, timestamp
             FROM voice_interactions ORDER BY timestamp DESC, rowid DESC LIMIT ?",
        )
        .bind(i64::from(limit.clamp(1, 1000)))
        .fetch_all(self.pool()?)
        .await
        .map_err(DatabaseError::from)?;
        Ok(rows.into_iter().map(VoiceInteraction::from).collect())
    }
}

#[async_trait]
impl BotStore for Database {
    async fn active_rules(&self) -> Result<Vec<KeywordRule>, CoreError> {
        self.list_rules(true).await
    }

    async fn business_profile(&self) -> Result<BusinessProfile, CoreError> {
        self.get_business_profile().await
    }

    async fn monitored_scopes(&self, platform: Platform) -> Result<Vec<Scope>, CoreError> {
        match platform {
            Platform::Discord => self.enabled_discord_scopes().await,
            Platform::Reddit => Ok(Vec::new()),
        }
    }

    async fn append_activity(&self, activity: &NewActivity) -> Result<(), CoreError> {
        self.record_activity(activity).await.map(|_| ())
    }

    async fn platform_counts(
        &self,
        platform: Platform,
    ) -> Result<PlatformActivityCounts, CoreError> {
        self.activity_counts(platform).await
    }

    async fn count_active_rules(&self) -> Result<u64, CoreError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM keyword_rules WHERE is_active = 1",
        )
        .fetch_one(self.pool()?)
        .await
        .map_err(DatabaseError::from)?;
        Ok(count.max(0) as u64)
    }

    async fn close(&self) {
        Database::close(self).await
    }
}

#[derive(FromRow)]
struct DiscordConfigRow {
    guild_id: String,
    channels: String,
    enabled: bool,
}

#[derive(FromRow)]
struct VoiceRow {
    id: String,
    post_id: Option<String>,
    comment_id: Option<String>,
    scope: String,
    transcription: Option<String>,
    ai_response: Option<String>,
    success: bool,
    timestamp: i64,
}

impl From<VoiceRow> for VoiceInteraction {
    fn from(row: VoiceRow) -> Self {
        Self {
            id: row.id,
            post_id: row.post_id,
            comment_id: row.comment_id,
            scope: row.scope,
            transcription: row.transcription,
            ai_response: row.ai_response,
            success: row.success,
            timestamp: from_millis(row.timestamp),
        }
    }
}

pub(crate) fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

pub(crate) fn from_millis(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}
