#[cfg(test)]
mod tests {
    use crate::{ActivityQuery, Database};
    use netia_core::{
        BotStore, BusinessProfile, ContentRef, CoreError, DatabaseError, DiscordChannelConfig,
        KeywordRuleUpdate, NewActivity, NewKeywordRule, NewVoiceInteraction, Platform, Scope,
    };
    use std::env;

    async fn setup_test_db() -> Database {
        let db_path = env::temp_dir().join(format!("test_netia_{}.db", uuid::Uuid::new_v4()));
        let db_url = format!("sqlite://{}", db_path.display());

        let mut db = Database::new(db_url);
        db.connect()
            .await
            .expect("Failed to connect to test database");
        db.run_migrations().await.expect("Failed to run migrations");

        db
    }

    fn activity(
        platform: Platform,
        content: ContentRef,
        keyword: &str,
        scope: &str,
        success: bool,
    ) -> NewActivity {
        let response = if success { "Happy to help" } else { "" };
        NewActivity {
            platform,
            content,
            rule_id: None,
            keyword: keyword.to_string(),
            response: response.to_string(),
            scope: scope.to_string(),
            author: "alice".to_string(),
            success,
        }
    }

    #[tokio::test]
    async fn test_unconnected_database_reports_not_connected() {
        let db = Database::new("sqlite::memory:".to_string());
        let err = db.list_rules(false).await.unwrap_err();
        assert!(matches!(err, CoreError::Database(DatabaseError::NotConnected)));
    }

    #[tokio::test]
    async fn test_basic_functionality() {
        let db = setup_test_db().await;

        db.save_setting("test_key", "test_value")
            .await
            .expect("Failed to save setting");
        db.save_setting("test_key", "updated")
            .await
            .expect("Failed to overwrite setting");
        let value = db
            .get_setting("test_key")
            .await
            .expect("Failed to get setting");
        assert_eq!(value, Some("updated".to_string()));
        assert_eq!(db.get_setting("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_rule_lifecycle() {
        let db = setup_test_db().await;

        let first = db
            .create_rule(&NewKeywordRule::new("  chatbot ", "Mention the receptionist"))
            .await
            .unwrap();
        assert_eq!(first.keyword, "chatbot");
        assert_eq!(first.scope, None);

        let second = db
            .create_rule(&NewKeywordRule::new("appointment", "Offer booking").with_scope("healthcare"))
            .await
            .unwrap();

        let rules = db.list_rules(true).await.unwrap();
        let ids: Vec<&str> = rules.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec![first.id.as_str(), second.id.as_str()]);

        let cleared = db
            .update_rule(
                &second.id,
                &KeywordRuleUpdate {
                    scope: Some(Some("   ".to_string())),
                    response_template: Some("Offer online booking".to_string()),
                    ..KeywordRuleUpdate::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(cleared.scope, None);
        assert_eq!(cleared.response_template, "Offer online booking");
        assert!(cleared.updated_at >= cleared.created_at);

        db.set_rule_active(&first.id, false).await.unwrap();
        assert_eq!(db.list_rules(true).await.unwrap().len(), 1);
        assert_eq!(db.list_rules(false).await.unwrap().len(), 2);
        assert_eq!(db.count_active_rules().await.unwrap(), 1);

        db.delete_rule(&first.id).await.unwrap();
        assert!(db.get_rule(&first.id).await.unwrap().is_none());
        assert!(matches!(
            db.delete_rule(&first.id).await,
            Err(CoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_invalid_rules_are_rejected() {
        let db = setup_test_db().await;

        let err = db
            .create_rule(&NewKeywordRule::new("", "template"))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput { .. }));

        let err = db
            .update_rule("no-such-rule", &KeywordRuleUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_business_profile_defaults_and_saves() {
        let db = setup_test_db().await;
        assert_eq!(db.business_profile().await.unwrap(), BusinessProfile::default());

        let mut profile = BusinessProfile::default();
        profile.name = "Bright Dental".to_string();
        profile.pricing.insert("basic".to_string(), "$49/month".to_string());
        db.save_business_profile(&profile).await.unwrap();
        assert_eq!(db.get_business_profile().await.unwrap(), profile);

        profile.services.clear();
        assert!(db.save_business_profile(&profile).await.is_err());
    }

    #[tokio::test]
    async fn test_seed_business_profile_keeps_existing() {
        let db = setup_test_db().await;
        let mut configured = BusinessProfile::default();
        configured.name = "Configured".to_string();
        assert!(db.seed_business_profile(&configured).await.unwrap());

        let mut other = BusinessProfile::default();
        other.name = "Other".to_string();
        assert!(!db.seed_business_profile(&other).await.unwrap());
        assert_eq!(db.get_business_profile().await.unwrap().name, "Configured");
    }

    #[tokio::test]
    async fn test_discord_configs_feed_monitored_scopes() {
        let db = setup_test_db().await;
        db.upsert_discord_config(&DiscordChannelConfig {
            guild_id: "100".to_string(),
            channels: vec!["200".to_string(), "201".to_string()],
            enabled: true,
        })
        .await
        .unwrap();
        db.upsert_discord_config(&DiscordChannelConfig {
            guild_id: "300".to_string(),
            channels: vec!["400".to_string()],
            enabled: false,
        })
        .await
        .unwrap();

        let scopes = db.monitored_scopes(Platform::Discord).await.unwrap();
        assert_eq!(
            scopes,
            vec![Scope::channel("100", "200"), Scope::channel("100", "201")]
        );
        assert!(db.monitored_scopes(Platform::Reddit).await.unwrap().is_empty());

        db.upsert_discord_config(&DiscordChannelConfig {
            guild_id: "100".to_string(),
            channels: vec!["202".to_string()],
            enabled: true,
        })
        .await
        .unwrap();
        assert_eq!(db.list_discord_configs().await.unwrap().len(), 2);
        assert_eq!(
            db.enabled_discord_scopes().await.unwrap(),
            vec![Scope::channel("100", "202")]
        );
    }

    #[tokio::test]
    async fn test_activity_log_round_trip() {
        let db = setup_test_db().await;

        let mut failed = activity(Platform::Reddit, ContentRef::Comment("c1".into()), "chatbot", "technology", false);
        failed.response = "should not be stored".to_string();
        let record = db.record_activity(&failed).await.unwrap();
        assert!(!record.success);
        assert_eq!(record.response, "");

        let loaded = db.get_activity(&record.id).await.unwrap().unwrap();
        assert_eq!(loaded, record);
        assert_eq!(loaded.content.comment_id(), Some("c1"));
        assert!(db.get_activity("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rule_deletion_keeps_activity_history() {
        let db = setup_test_db().await;
        let rule = db
            .create_rule(&NewKeywordRule::new("chatbot", "template"))
            .await
            .unwrap();
        let mut entry = activity(Platform::Reddit, ContentRef::Post("p1".into()), "chatbot", "technology", true);
        entry.rule_id = Some(rule.id.clone());
        let record = db.record_activity(&entry).await.unwrap();

        db.delete_rule(&rule.id).await.unwrap();
        let loaded = db.get_activity(&record.id).await.unwrap().unwrap();
        assert_eq!(loaded.rule_id, None);
        assert_eq!(loaded.keyword, "chatbot");
    }

    #[tokio::test]
    async fn test_activity_filters_and_paging() {
        let db = setup_test_db().await;
        for i in 0..5 {
            db.record_activity(&activity(
                Platform::Reddit,
                ContentRef::Post(format!("p{i}")),
                "chatbot",
                "technology",
                i % 2 == 0,
            ))
            .await
            .unwrap();
        }
        db.record_activity(&activity(
            Platform::Discord,
            ContentRef::Message("m1".into()),
            "Receptionist",
            "100/200",
            true,
        ))
        .await
        .unwrap();

        let page = db
            .list_activities(&ActivityQuery {
                platform: Some(Platform::Reddit),
                limit: Some(2),
                ..ActivityQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.records.len(), 2);
        assert!(page.has_more);
        assert_eq!(page.records[0].content.post_id(), Some("p4"));

        let last = db
            .list_activities(&ActivityQuery {
                platform: Some(Platform::Reddit),
                limit: Some(2),
                offset: 4,
                ..ActivityQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(last.records.len(), 1);
        assert!(!last.has_more);

        let successes = db
            .list_activities(&ActivityQuery {
                success: Some(true),
                keyword: Some("receptionist".to_string()),
                ..ActivityQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(successes.total, 1);
        assert_eq!(successes.records[0].scope, "100/200");

        let err = db
            .list_activities(&ActivityQuery {
                limit: Some(0),
                ..ActivityQuery::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn test_activity_stats() {
        let db = setup_test_db().await;
        let empty = db.activity_stats(7).await.unwrap();
        assert_eq!(empty.total, 0);
        assert_eq!(empty.success_rate, 0.0);

        for (i, success) in [true, true, false].into_iter().enumerate() {
            db.record_activity(&activity(
                Platform::Reddit,
                ContentRef::Post(format!("p{i}")),
                "chatbot",
                "technology",
                success,
            ))
            .await
            .unwrap();
        }
        db.record_activity(&activity(
            Platform::Reddit,
            ContentRef::Post("p9".into()),
            "appointment",
            "healthcare",
            true,
        ))
        .await
        .unwrap();

        let stats = db.activity_stats(7).await.unwrap();
        assert_eq!(stats.total, 4);
        assert_eq!(stats.successful, 3);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.success_rate, 75.0);
        assert_eq!(stats.last_24h, 4);
        assert_eq!(stats.top_scopes[0].name, "technology");
        assert_eq!(stats.top_scopes[0].count, 3);
        assert_eq!(stats.top_keywords.len(), 2);

        let counts = db.platform_counts(Platform::Reddit).await.unwrap();
        assert_eq!((counts.total, counts.successful, counts.last_24h), (4, 3, 4));
        assert_eq!(db.platform_counts(Platform::Discord).await.unwrap().total, 0);

        assert!(db.activity_stats(0).await.is_err());
    }

    #[tokio::test]
    async fn test_voice_interactions() {
        let db = setup_test_db().await;
        let saved = db
            .record_voice_interaction(&NewVoiceInteraction {
                post_id: Some("p1".to_string()),
                comment_id: None,
                scope: "smallbusiness".to_string(),
                transcription: Some("do you take calls at night".to_string()),
                ai_response: Some("Yes, around the clock.".to_string()),
                success: true,
            })
            .await
            .unwrap();

        let listed = db.list_voice_interactions(10).await.unwrap();
        assert_eq!(listed, vec![saved]);
    }
}
