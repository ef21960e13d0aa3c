use crate::CoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub const MAX_KEYWORD_LEN: usize = 100;
pub const MAX_TEMPLATE_LEN: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Reddit,
    Discord,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Reddit => "reddit",
            Platform::Discord => "discord",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "reddit" => Some(Platform::Reddit),
            "discord" => Some(Platform::Discord),
            _ => None,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a piece of content lives on its platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scope {
    Subreddit(String),
    Channel { guild_id: String, channel_id: String },
}

impl Scope {
    pub fn subreddit(name: &str) -> Self {
        let name = name.trim();
        let name = name
            .strip_prefix("r/")
            .or_else(|| name.strip_prefix("/r/"))
            .unwrap_or(name);
        Scope::Subreddit(name.to_string())
    }

    pub fn channel(guild_id: impl Into<String>, channel_id: impl Into<String>) -> Self {
        Scope::Channel {
            guild_id: guild_id.into(),
            channel_id: channel_id.into(),
        }
    }

    /// Parses the `guild/channel` form used in configuration files.
    pub fn parse_channel(value: &str) -> Option<Self> {
        let (guild_id, channel_id) = value.trim().split_once('/')?;
        let (guild_id, channel_id) = (guild_id.trim(), channel_id.trim());
        if guild_id.is_empty() || channel_id.is_empty() {
            return None;
        }
        Some(Scope::channel(guild_id, channel_id))
    }

    pub fn platform(&self) -> Platform {
        match self {
            Scope::Subreddit(_) => Platform::Reddit,
            Scope::Channel { .. } => Platform::Discord,
        }
    }

    pub fn label(&self) -> String {
        match self {
            Scope::Subreddit(name) => name.clone(),
            Scope::Channel {
                guild_id,
                channel_id,
            } => format!("{guild_id}/{channel_id}"),
        }
    }

    /// Whether a keyword rule's scope filter selects this scope.
    ///
    /// Subreddits compare case-insensitively. A Discord filter may name the
    /// guild, the channel, or the `guild/channel` pair.
    pub fn matches_filter(&self, filter: &str) -> bool {
        let filter = filter.trim();
        match self {
            Scope::Subreddit(name) => match Scope::subreddit(filter) {
                Scope::Subreddit(wanted) => name.eq_ignore_ascii_case(&wanted),
                Scope::Channel { .. } => false,
            },
            Scope::Channel {
                guild_id,
                channel_id,
            } => {
                filter == guild_id
                    || filter == channel_id
                    || Scope::parse_channel(filter).as_ref() == Some(self)
            }
        }
    }
}

/// Same text as [`Scope::label`], which is what activity records store.
impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Post,
    Comment,
    Message,
}

/// A post, comment or chat message as seen by the dispatch loop.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentItem {
    pub id: String,
    pub kind: ContentKind,
    pub author: String,
    pub title: Option<String>,
    pub body: String,
    pub scope: Scope,
    pub parent_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ContentItem {
    /// Title and body joined with a space; just the body for comments and messages.
    pub fn text(&self) -> String {
        match self.title.as_deref() {
            Some(title) if self.body.is_empty() => title.to_string(),
            Some(title) => format!("{} {}", title, self.body),
            None => self.body.clone(),
        }
    }

    pub fn platform(&self) -> Platform {
        self.scope.platform()
    }

    pub fn content_ref(&self) -> ContentRef {
        match self.kind {
            ContentKind::Post => ContentRef::Post(self.id.clone()),
            ContentKind::Comment => ContentRef::Comment(self.id.clone()),
            ContentKind::Message => ContentRef::Message(self.id.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordRule {
    pub id: String,
    pub keyword: String,
    pub scope: Option<String>,
    pub response_template: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl KeywordRule {
    /// A rule without a scope is global.
    pub fn applies_to(&self, scope: &Scope) -> bool {
        match self.scope.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(filter) => scope.matches_filter(filter),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewKeywordRule {
    pub keyword: String,
    pub scope: Option<String>,
    pub response_template: String,
    pub is_active: bool,
}

impl NewKeywordRule {
    pub fn new(keyword: impl Into<String>, response_template: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            scope: None,
            response_template: response_template.into(),
            is_active: true,
        }
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        validate_keyword(&self.keyword)?;
        validate_template(&self.response_template)
    }
}

/// Partial update; `scope: Some(None)` clears the scope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeywordRuleUpdate {
    pub keyword: Option<String>,
    pub scope: Option<Option<String>>,
    pub response_template: Option<String>,
    pub is_active: Option<bool>,
}

impl KeywordRuleUpdate {
    pub fn validate(&self) -> Result<(), CoreError> {
        if let Some(keyword) = &self.keyword {
            validate_keyword(keyword)?;
        }
        if let Some(template) = &self.response_template {
            validate_template(template)?;
        }
        Ok(())
    }
}

fn validate_keyword(keyword: &str) -> Result<(), CoreError> {
    let len = keyword.trim().chars().count();
    if len == 0 || len > MAX_KEYWORD_LEN {
        return Err(CoreError::InvalidInput {
            message: format!("keyword must be 1-{MAX_KEYWORD_LEN} characters"),
        });
    }
    Ok(())
}

fn validate_template(template: &str) -> Result<(), CoreError> {
    let len = template.trim().chars().count();
    if len == 0 || len > MAX_TEMPLATE_LEN {
        return Err(CoreError::InvalidInput {
            message: format!("response template must be 1-{MAX_TEMPLATE_LEN} characters"),
        });
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessProfile {
    pub name: String,
    pub services: Vec<String>,
    pub hours: String,
    pub contact: String,
    #[serde(default)]
    pub pricing: BTreeMap<String, String>,
}

impl Default for BusinessProfile {
    fn default() -> Self {
        Self {
            name: "Netia AI Receptionist".to_string(),
            services: vec![
                "Customer Support".to_string(),
                "AI Receptionist".to_string(),
                "24/7 Assistance".to_string(),
                "Voice Reception".to_string(),
            ],
            hours: "24/7 Available".to_string(),
            contact: "Visit netiawebsite.vercel.app for more information".to_string(),
            pricing: BTreeMap::new(),
        }
    }
}

impl BusinessProfile {
    pub fn validate(&self) -> Result<(), CoreError> {
        let invalid = |message: &str| {
            Err(CoreError::InvalidInput {
                message: message.to_string(),
            })
        };
        if self.name.trim().is_empty() || self.name.chars().count() > 100 {
            return invalid("business name must be 1-100 characters");
        }
        if self.services.iter().all(|s| s.trim().is_empty()) {
            return invalid("at least one service is required");
        }
        if self.hours.trim().is_empty() || self.hours.chars().count() > 200 {
            return invalid("business hours must be 1-200 characters");
        }
        if self.contact.trim().is_empty() || self.contact.chars().count() > 500 {
            return invalid("contact must be 1-500 characters");
        }
        Ok(())
    }
}

/// Which platform object an activity refers to. Exactly one id per record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum ContentRef {
    Post(String),
    Comment(String),
    Message(String),
}

impl ContentRef {
    pub fn id(&self) -> &str {
        match self {
            ContentRef::Post(id) | ContentRef::Comment(id) | ContentRef::Message(id) => id,
        }
    }

    pub fn post_id(&self) -> Option<&str> {
        match self {
            ContentRef::Post(id) => Some(id),
            _ => None,
        }
    }

    pub fn comment_id(&self) -> Option<&str> {
        match self {
            ContentRef::Comment(id) => Some(id),
            _ => None,
        }
    }

    pub fn message_id(&self) -> Option<&str> {
        match self {
            ContentRef::Message(id) => Some(id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewActivity {
    pub platform: Platform,
    pub content: ContentRef,
    pub rule_id: Option<String>,
    pub keyword: String,
    pub response: String,
    pub scope: String,
    pub author: String,
    pub success: bool,
}

impl NewActivity {
    pub fn succeeded(item: &ContentItem, rule: &KeywordRule, response: String) -> Self {
        Self::from_item(item, rule, response, true)
    }

    /// Failed attempts never carry response text.
    pub fn failed(item: &ContentItem, rule: &KeywordRule) -> Self {
        Self::from_item(item, rule, String::new(), false)
    }

    fn from_item(item: &ContentItem, rule: &KeywordRule, response: String, success: bool) -> Self {
        Self {
            platform: item.platform(),
            content: item.content_ref(),
            rule_id: Some(rule.id.clone()),
            keyword: rule.keyword.clone(),
            response,
            scope: item.scope.label(),
            author: item.author.clone(),
            success,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub id: String,
    pub platform: Platform,
    pub content: ContentRef,
    pub rule_id: Option<String>,
    pub keyword: String,
    pub response: String,
    pub scope: String,
    pub author: String,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformActivityCounts {
    pub total: u64,
    pub successful: u64,
    pub last_24h: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscordChannelConfig {
    pub guild_id: String,
    pub channels: Vec<String>,
    pub enabled: bool,
}

impl DiscordChannelConfig {
    pub fn scopes(&self) -> Vec<Scope> {
        self.channels
            .iter()
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .map(|c| Scope::channel(self.guild_id.clone(), c))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewVoiceInteraction {
    pub post_id: Option<String>,
    pub comment_id: Option<String>,
    pub scope: String,
    pub transcription: Option<String>,
    pub ai_response: Option<String>,
    pub success: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceInteraction {
    pub id: String,
    pub post_id: Option<String>,
    pub comment_id: Option<String>,
    pub scope: String,
    pub transcription: Option<String>,
    pub ai_response: Option<String>,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
}

/// Cuts `text` to at most `max_chars` characters, ending in "..." when shortened.
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(3);
    let mut out: String = text.chars().take(keep).collect();
    out.push_str("...");
    out
}
