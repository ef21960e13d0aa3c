//! Keyword matching for incoming content.
//!
//! Matching is a case-insensitive substring test against the rule keyword and
//! a small fixed table of related phrases. There is no stemming or fuzzy
//! matching.

use netia_core::{ContentItem, KeywordRule};
use std::collections::HashMap;

/// Related phrases keyed by normalized keyword.
pub const SYNONYMS: &[(&str, &[&str])] = &[
    (
        "missing calls",
        &["missed calls", "unanswered calls", "call handling", "phone calls"],
    ),
    (
        "customer service",
        &["customer support", "client service", "help desk", "support"],
    ),
    (
        "appointment booking",
        &["scheduling", "bookings", "appointments", "calendar"],
    ),
    (
        "lead follow-up",
        &["follow up", "lead nurturing", "prospect follow-up", "sales follow-up"],
    ),
    (
        "business automation",
        &["automation", "AI assistant", "chatbot", "virtual assistant"],
    ),
    (
        "24/7 support",
        &["24/7", "always available", "round the clock", "continuous support"],
    ),
];

#[derive(Debug, Clone)]
pub struct ContentMatcher {
    synonyms: HashMap<String, Vec<String>>,
}

impl ContentMatcher {
    pub fn new() -> Self {
        Self::with_synonyms(SYNONYMS)
    }

    pub fn with_synonyms(table: &[(&str, &[&str])]) -> Self {
        let synonyms = table
            .iter()
            .map(|(keyword, related)| {
                (
                    normalize(keyword),
                    related.iter().map(|r| normalize(r)).collect(),
                )
            })
            .collect();
        Self { synonyms }
    }

    /// Related phrases for `keyword`, already lowercased.
    pub fn related_phrases(&self, keyword: &str) -> &[String] {
        self.synonyms
            .get(&normalize(keyword))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// True if the rule keyword, or one of its related phrases, occurs in the
    /// item's text. Scope is not considered here.
    pub fn matches(&self, content: &ContentItem, rule: &KeywordRule) -> bool {
        self.matches_text(&content.text(), &rule.keyword)
    }

    pub fn matches_text(&self, text: &str, keyword: &str) -> bool {
        let keyword = normalize(keyword);
        if keyword.is_empty() || text.trim().is_empty() {
            return false;
        }

        let text = text.to_lowercase();
        if text.contains(&keyword) {
            return true;
        }

        self.related_phrases(&keyword)
            .iter()
            .any(|related| text.contains(related.as_str()))
    }

    /// First rule, in list order, that applies to the item's scope and matches it.
    pub fn first_match<'a>(
        &self,
        content: &ContentItem,
        rules: &'a [KeywordRule],
    ) -> Option<&'a KeywordRule> {
        let text = content.text();
        let found = rules
            .iter()
            .filter(|rule| rule.is_active && rule.applies_to(&content.scope))
            .find(|rule| self.matches_text(&text, &rule.keyword));

        if let Some(rule) = found {
            tracing::debug!(
                "Content {} in {} matched keyword '{}'",
                content.id,
                content.scope,
                rule.keyword
            );
        }
        found
    }
}

impl Default for ContentMatcher {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use netia_core::{ContentKind, Scope};

    fn post(scope: &str, title: &str, body: &str) -> ContentItem {
        ContentItem {
            id: "p1".to_string(),
            kind: ContentKind::Post,
            author: "poster".to_string(),
            title: Some(title.to_string()),
            body: body.to_string(),
            scope: Scope::subreddit(scope),
            parent_id: None,
            created_at: Utc::now(),
        }
    }

    fn rule(id: &str, keyword: &str, scope: Option<&str>) -> KeywordRule {
        let now = Utc::now();
        KeywordRule {
            id: id.to_string(),
            keyword: keyword.to_string(),
            scope: scope.map(str::to_string),
            response_template: "Mention Netia".to_string(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_case_insensitive_substring() {
        let matcher = ContentMatcher::new();
        let content = post("smallbusiness", "Looking for a good ChatBot", "for my store");
        assert!(matcher.matches(&content, &rule("r1", "chatbot", None)));
        assert!(matcher.matches(&content, &rule("r1", "CHATBOT", None)));
        assert!(!matcher.matches(&content, &rule("r1", "receptionist", None)));
    }

    #[test]
    fn test_synonyms_match() {
        let matcher = ContentMatcher::new();
        let content = post("smallbusiness", "Help", "We keep getting missed calls after hours");
        assert!(matcher.matches(&content, &rule("r1", "Missing Calls", None)));

        let content = post("smallbusiness", "Need an AI Assistant", "");
        assert!(matcher.matches(&content, &rule("r1", "business automation", None)));
    }

    #[test]
    fn test_synonyms_are_one_directional() {
        let matcher = ContentMatcher::new();
        let content = post("smallbusiness", "We need customer service", "");
        assert!(!matcher.matches(&content, &rule("r1", "help desk", None)));
    }

    #[test]
    fn test_empty_inputs_never_match() {
        let matcher = ContentMatcher::new();
        assert!(!matcher.matches_text("", "chatbot"));
        assert!(!matcher.matches_text("anything at all", ""));
        assert!(!matcher.matches_text("anything at all", "   "));
    }

    #[test]
    fn test_first_match_wins_and_respects_scope() {
        let matcher = ContentMatcher::new();
        let rules = vec![
            rule("scoped", "appointment", Some("healthcare")),
            rule("first", "store", None),
            rule("second", "chatbot", None),
        ];

        let content = post("other", "Looking for a good chatbot for my store", "");
        let hit = matcher.first_match(&content, &rules).unwrap();
        assert_eq!(hit.id, "first");

        let content = post("other", "Need appointment reminders", "");
        assert!(matcher.first_match(&content, &rules).is_none());

        let content = post("HealthCare", "Need appointment reminders", "");
        assert_eq!(matcher.first_match(&content, &rules).unwrap().id, "scoped");
    }

    #[test]
    fn test_inactive_rules_are_skipped() {
        let matcher = ContentMatcher::new();
        let mut inactive = rule("off", "chatbot", None);
        inactive.is_active = false;
        let rules = vec![inactive, rule("on", "chatbot", None)];
        let content = post("any", "chatbot", "");
        assert_eq!(matcher.first_match(&content, &rules).unwrap().id, "on");
    }
}
