//! Reply drafting for matched content.

use crate::LlmProvider;
use netia_core::{
    truncate_text, BusinessProfile, ContentItem, CoreError, DispatchError, ErrorExt, KeywordRule,
    Platform,
};
use std::sync::Arc;

pub const FALLBACK_RESPONSE: &str = "I apologize, but I couldn't generate a response right now. Feel free to reach out through our website for assistance!";

pub const REDDIT_VOICE_SUFFIX: &str = "\n\n🎤 *Netia now supports natural voice conversations! Reply with voice messages for a more personal experience.*";

pub const DISCORD_SUFFIX: &str = "\n\n💬 *Netia AI Receptionist - Available 24/7 for your business needs!*";

/// Longest slice of the matched content quoted into the prompt.
pub const MAX_CONTEXT_CHARS: usize = 500;

pub struct ResponseGenerator {
    provider: Arc<dyn LlmProvider>,
    voice_enabled: bool,
}

impl ResponseGenerator {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            provider,
            voice_enabled: false,
        }
    }

    pub fn with_voice(mut self, enabled: bool) -> Self {
        self.voice_enabled = enabled;
        self
    }

    pub fn voice_enabled(&self) -> bool {
        self.voice_enabled
    }

    /// Drafts a reply. Upstream failures become [`FALLBACK_RESPONSE`]; the
    /// platform suffix is appended either way.
    pub async fn generate(
        &self,
        content: &ContentItem,
        rule: &KeywordRule,
        profile: &BusinessProfile,
    ) -> String {
        let body = match self.try_generate(content, rule, profile).await {
            Ok(text) => text,
            Err(source) => {
                DispatchError::Generation { source }.log_warn();
                FALLBACK_RESPONSE.to_string()
            }
        };

        let mut reply = body;
        reply.push_str(platform_suffix(content.platform(), self.voice_enabled));
        reply
    }

    /// The raw completion without fallback or suffix.
    pub async fn try_generate(
        &self,
        content: &ContentItem,
        rule: &KeywordRule,
        profile: &BusinessProfile,
    ) -> Result<String, CoreError> {
        let platform = content.platform();
        let system = system_prompt(profile, platform);
        let user = user_prompt(content, rule);
        tracing::debug!(
            "Requesting {} reply for {} (keyword '{}')",
            platform,
            content.id,
            rule.keyword
        );
        self.provider.complete(&system, &user).await
    }
}

pub fn system_prompt(profile: &BusinessProfile, platform: Platform) -> String {
    let audience = match platform {
        Platform::Reddit => "Reddit discussions",
        Platform::Discord => "Discord conversations",
    };
    format!(
        "You are Netia, an AI receptionist that provides 24/7 customer support. \
You are helpful, professional, and always available. Your responses should be:
- Natural and conversational
- Helpful and informative
- Consistent with Netia branding
- Appropriate for {audience}
- Focused on providing value to the community

Business Profile:
Name: {name}
Services: {services}
Hours: {hours}
Contact: {contact}",
        audience = audience,
        name = profile.name,
        services = profile.services.join(", "),
        hours = profile.hours,
        contact = profile.contact,
    )
}

pub fn user_prompt(content: &ContentItem, rule: &KeywordRule) -> String {
    let platform = match content.platform() {
        Platform::Reddit => "Reddit",
        Platform::Discord => "Discord",
    };
    let context = truncate_text(&content.text(), MAX_CONTEXT_CHARS);
    format!(
        "{platform} Context: {context}
Keyword matched: {keyword}
Response template: {template}

As Netia AI Receptionist, generate a helpful response that:
1. Acknowledges the user's question or comment naturally
2. Provides relevant information based on our business profile
3. Maintains a helpful, professional tone
4. Encourages further engagement if appropriate
5. Stays true to Netia's \"AI Receptionist That Never Sleeps\" branding

Keep the response conversational and {platform}-appropriate while showcasing Netia's capabilities.",
        platform = platform,
        context = context,
        keyword = rule.keyword,
        template = rule.response_template,
    )
}

pub fn platform_suffix(platform: Platform, voice_enabled: bool) -> &'static str {
    match platform {
        Platform::Reddit if voice_enabled => REDDIT_VOICE_SUFFIX,
        Platform::Reddit => "",
        Platform::Discord => DISCORD_SUFFIX,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use netia_core::{ContentKind, LlmError, Scope};
    use std::sync::Mutex;

    struct StubProvider {
        reply: Result<String, ()>,
        prompts: Mutex<Vec<(String, String)>>,
    }

    impl StubProvider {
        fn ok(text: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(text.to_string()),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                reply: Err(()),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LlmProvider for StubProvider {
        fn name(&self) -> &str {
            "stub"
        }

        async fn complete(&self, system: &str, user: &str) -> Result<String, CoreError> {
            self.prompts
                .lock()
                .unwrap()
                .push((system.to_string(), user.to_string()));
            self.reply.clone().map_err(|_| {
                CoreError::Llm(LlmError::ServiceUnavailable {
                    provider: "stub".to_string(),
                })
            })
        }
    }

    fn reddit_post(body: &str) -> ContentItem {
        ContentItem {
            id: "p1".to_string(),
            kind: ContentKind::Post,
            author: "op".to_string(),
            title: Some("Need help".to_string()),
            body: body.to_string(),
            scope: Scope::subreddit("smallbusiness"),
            parent_id: None,
            created_at: Utc::now(),
        }
    }

    fn discord_message() -> ContentItem {
        ContentItem {
            id: "m1".to_string(),
            kind: ContentKind::Message,
            author: "user#1".to_string(),
            title: None,
            body: "anyone using a chatbot?".to_string(),
            scope: Scope::channel("g", "c"),
            parent_id: None,
            created_at: Utc::now(),
        }
    }

    fn rule() -> KeywordRule {
        let now = Utc::now();
        KeywordRule {
            id: "r1".to_string(),
            keyword: "chatbot".to_string(),
            scope: None,
            response_template: "Mention 24/7 coverage".to_string(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_suffix_rules() {
        assert_eq!(platform_suffix(Platform::Reddit, false), "");
        assert_eq!(platform_suffix(Platform::Reddit, true), REDDIT_VOICE_SUFFIX);
        assert_eq!(platform_suffix(Platform::Discord, false), DISCORD_SUFFIX);
        assert_eq!(platform_suffix(Platform::Discord, true), DISCORD_SUFFIX);
    }

    #[test]
    fn test_prompts_embed_profile_and_rule() {
        let profile = BusinessProfile::default();
        let system = system_prompt(&profile, Platform::Reddit);
        assert!(system.starts_with("You are Netia"));
        assert!(system.contains("Name: Netia AI Receptionist"));
        assert!(system.contains("Services: Customer Support, AI Receptionist"));
        assert!(system.contains("Reddit discussions"));

        let user = user_prompt(&reddit_post("my chatbot is broken"), &rule());
        assert!(user.starts_with("Reddit Context: Need help my chatbot is broken"));
        assert!(user.contains("Keyword matched: chatbot"));
        assert!(user.contains("Response template: Mention 24/7 coverage"));
    }

    #[test]
    fn test_prompt_truncates_long_content() {
        let long_body = "x".repeat(2000);
        let user = user_prompt(&reddit_post(&long_body), &rule());
        let context_line = user.lines().next().unwrap();
        let quoted = context_line.trim_start_matches("Reddit Context: ");
        assert_eq!(quoted.chars().count(), MAX_CONTEXT_CHARS);
        assert!(quoted.ends_with("..."));
    }

    #[tokio::test]
    async fn test_generate_appends_suffix() {
        let provider = StubProvider::ok("Happy to help!");
        let generator = ResponseGenerator::new(provider.clone()).with_voice(true);
        let profile = BusinessProfile::default();

        let reply = generator.generate(&reddit_post("b"), &rule(), &profile).await;
        assert_eq!(reply, format!("Happy to help!{}", REDDIT_VOICE_SUFFIX));

        let reply = generator.generate(&discord_message(), &rule(), &profile).await;
        assert_eq!(reply, format!("Happy to help!{}", DISCORD_SUFFIX));

        let prompts = provider.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[1].1.starts_with("Discord Context: anyone using a chatbot?"));
    }

    #[tokio::test]
    async fn test_generate_falls_back_on_error() {
        let generator = ResponseGenerator::new(StubProvider::failing());
        let reply = generator
            .generate(&reddit_post("b"), &rule(), &BusinessProfile::default())
            .await;
        assert_eq!(reply, FALLBACK_RESPONSE);

        let reply = generator
            .generate(&discord_message(), &rule(), &BusinessProfile::default())
            .await;
        assert_eq!(reply, format!("{}{}", FALLBACK_RESPONSE, DISCORD_SUFFIX));
    }
}
