//! Application configuration: a TOML file overlaid with environment variables.

use crate::{BusinessProfile, ConfigError, Platform, Scope};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub reddit: RedditConfig,
    pub discord: DiscordConfig,
    pub llm: LlmConfig,
    pub bot: BotConfig,
    pub business: BusinessProfile,
    pub database_url: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            reddit: RedditConfig::default(),
            discord: DiscordConfig::default(),
            llm: LlmConfig::default(),
            bot: BotConfig::default(),
            business: BusinessProfile::default(),
            database_url: "sqlite://netia.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedditConfig {
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
    pub user_agent: String,
}

impl Default for RedditConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            username: String::new(),
            password: String::new(),
            user_agent: format!("netia-bot/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscordConfig {
    pub enabled: bool,
    pub bot_token: String,
    pub application_id: Option<String>,
    /// Channels to monitor, each as `guild_id/channel_id`.
    pub channels: Vec<String>,
}

impl DiscordConfig {
    pub fn channel_scopes(&self) -> Vec<Scope> {
        self.channels
            .iter()
            .filter_map(|entry| {
                let scope = Scope::parse_channel(entry);
                if scope.is_none() {
                    tracing::warn!("Ignoring malformed Discord channel entry '{}'", entry);
                }
                scope
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProviderKind {
    #[default]
    OpenAi,
    Claude,
}

impl LlmProviderKind {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" => Some(LlmProviderKind::OpenAi),
            "claude" | "anthropic" => Some(LlmProviderKind::Claude),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: LlmProviderKind,
    pub api_key: String,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub tts_model: String,
    pub transcription_model: String,
    pub voice: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProviderKind::OpenAi,
            api_key: String::new(),
            model: None,
            base_url: None,
            max_tokens: 200,
            temperature: 0.7,
            tts_model: "tts-1".to_string(),
            transcription_model: "whisper-1".to_string(),
            voice: "alloy".to_string(),
        }
    }
}

impl LlmConfig {
    pub fn model(&self) -> String {
        match (&self.model, self.provider) {
            (Some(model), _) if !model.trim().is_empty() => model.clone(),
            (_, LlmProviderKind::OpenAi) => "gpt-4".to_string(),
            (_, LlmProviderKind::Claude) => "claude-3-5-sonnet-latest".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub reddit_poll_interval_secs: u64,
    pub reddit_fetch_limit: u32,
    pub discord_poll_interval_secs: u64,
    pub discord_fetch_limit: u32,
    /// Minimum gap between outbound platform calls.
    pub request_delay_ms: u64,
    pub default_subreddits: Vec<String>,
    pub voice_enabled: bool,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            reddit_poll_interval_secs: 180,
            reddit_fetch_limit: 10,
            discord_poll_interval_secs: 300,
            discord_fetch_limit: 20,
            request_delay_ms: 1000,
            default_subreddits: [
                "technology",
                "programming",
                "webdev",
                "javascript",
                "entrepreneur",
                "startups",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            voice_enabled: false,
        }
    }
}

impl BotConfig {
    pub fn poll_interval(&self, platform: Platform) -> Duration {
        let secs = match platform {
            Platform::Reddit => self.reddit_poll_interval_secs,
            Platform::Discord => self.discord_poll_interval_secs,
        };
        Duration::from_secs(secs.max(1))
    }

    pub fn fetch_limit(&self, platform: Platform) -> u32 {
        match platform {
            Platform::Reddit => self.reddit_fetch_limit,
            Platform::Discord => self.discord_fetch_limit,
        }
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn default_subreddit_scopes(&self) -> Vec<Scope> {
        self.default_subreddits
            .iter()
            .filter(|s| !s.trim().is_empty())
            .map(|s| Scope::subreddit(s))
            .collect()
    }
}

impl AppConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.display().to_string(),
        })?;
        Self::from_toml_str(&content)
    }

    /// Reads the optional file, then applies the process environment on top.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Overrides fields from variables returned by `lookup`. Unset or empty
    /// variables leave the field alone.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(v) = get("REDDIT_CLIENT_ID") {
            self.reddit.client_id = v;
        }
        if let Some(v) = get("REDDIT_CLIENT_SECRET") {
            self.reddit.client_secret = v;
        }
        if let Some(v) = get("REDDIT_USERNAME") {
            self.reddit.username = v;
        }
        if let Some(v) = get("REDDIT_PASSWORD") {
            self.reddit.password = v;
        }
        if let Some(v) = get("REDDIT_USER_AGENT") {
            self.reddit.user_agent = v;
        }

        if let Some(v) = get("DISCORD_ENABLED") {
            self.discord.enabled = parse_bool("DISCORD_ENABLED", &v)?;
        }
        if let Some(v) = get("DISCORD_BOT_TOKEN") {
            self.discord.bot_token = v;
        }
        if let Some(v) = get("DISCORD_APPLICATION_ID") {
            self.discord.application_id = Some(v);
        }
        if let Some(v) = get("DISCORD_CHANNELS") {
            self.discord.channels = split_list(&v);
        }

        if let Some(v) = get("AI_PROVIDER") {
            self.llm.provider =
                LlmProviderKind::parse(&v).ok_or_else(|| ConfigError::InvalidValue {
                    field: "AI_PROVIDER".to_string(),
                    value: v.clone(),
                })?;
        }
        if let Some(v) = get("AI_API_KEY") {
            self.llm.api_key = v;
        }
        if let Some(v) = get("AI_MODEL") {
            self.llm.model = Some(v);
        }
        if let Some(v) = get("AI_MAX_TOKENS") {
            self.llm.max_tokens = parse_number("AI_MAX_TOKENS", &v)?;
        }
        if let Some(v) = get("AI_TEMPERATURE") {
            self.llm.temperature = parse_number("AI_TEMPERATURE", &v)?;
        }
        if let Some(v) = get("TTS_MODEL") {
            self.llm.tts_model = v;
        }
        if let Some(v) = get("VOICE_MODEL") {
            self.llm.transcription_model = v;
        }
        if let Some(v) = get("VOICE_ENABLED") {
            self.bot.voice_enabled = parse_bool("VOICE_ENABLED", &v)?;
        }

        if let Some(v) = get("DATABASE_URL") {
            self.database_url = v;
        }

        if let Some(v) = get("BUSINESS_NAME") {
            self.business.name = v;
        }
        if let Some(v) = get("BUSINESS_SERVICES") {
            self.business.services = split_list(&v);
        }
        if let Some(v) = get("BUSINESS_HOURS") {
            self.business.hours = v;
        }
        if let Some(v) = get("BUSINESS_CONTACT") {
            self.business.contact = v;
        }
        if let Some(v) = get("BUSINESS_PRICING") {
            self.business.pricing = serde_json::from_str::<BTreeMap<String, String>>(&v)
                .map_err(|_| ConfigError::InvalidValue {
                    field: "BUSINESS_PRICING".to_string(),
                    value: v.clone(),
                })?;
        }

        Ok(())
    }

    /// Checks that the credentials the given bot needs are present.
    pub fn validate_for(&self, platform: Platform) -> Result<(), ConfigError> {
        match platform {
            Platform::Reddit => {
                require("reddit.client_id", &self.reddit.client_id)?;
                require("reddit.client_secret", &self.reddit.client_secret)?;
                require("reddit.username", &self.reddit.username)?;
                require("reddit.password", &self.reddit.password)?;
                require("reddit.user_agent", &self.reddit.user_agent)?;
            }
            Platform::Discord => {
                if !self.discord.enabled {
                    return Err(ConfigError::InvalidValue {
                        field: "discord.enabled".to_string(),
                        value: "false".to_string(),
                    });
                }
                require("discord.bot_token", &self.discord.bot_token)?;
            }
        }
        require("llm.api_key", &self.llm.api_key)
    }
}

fn require(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::MissingField {
            field: field.to_string(),
        });
    }
    Ok(())
}

fn parse_bool(field: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
        }),
    }
}

fn parse_number<T: std::str::FromStr>(field: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
    })
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
