#[cfg(test)]
mod tests {
    use crate::{api, AuthState, RedditApiClient, RedditClient, RedditOAuth2Config, RedditToken};
    use netia_core::{
        ContentKind, CoreError, PlatformClient, RedditApiError, RequestThrottle, Scope,
    };
    use serde_json::json;
    use std::sync::Arc;
    use std::time::{Duration, Instant, SystemTime};
    use wiremock::matchers::{body_string_contains, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn create_test_config(server: &MockServer) -> RedditOAuth2Config {
        RedditOAuth2Config::new(
            "test_client_id".to_string(),
            "test_client_secret".to_string(),
            "netia_bot".to_string(),
            "hunter2".to_string(),
            "netia/0.1 by netia_bot".to_string(),
        )
        .with_token_url(format!("{}/api/v1/access_token", server.uri()))
    }

    fn create_client(server: &MockServer) -> RedditClient {
        let config = create_test_config(server);
        let api = RedditApiClient::with_base_url(config.user_agent.clone(), &server.uri()).unwrap();
        RedditClient::with_api(config, api, Arc::new(RequestThrottle::from_millis(0)))
    }

    async fn mount_token(server: &MockServer, expected_calls: u64) {
        Mock::given(method("POST"))
            .and(path("/api/v1/access_token"))
            .and(body_string_contains("grant_type=password"))
            .and(body_string_contains("username=netia_bot"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "token-abc",
                "token_type": "bearer",
                "expires_in": 3600,
                "scope": "identity read submit"
            })))
            .expect(expected_calls)
            .mount(server)
            .await;
    }

    fn post_listing() -> serde_json::Value {
        json!({
            "kind": "Listing",
            "data": {
                "after": null,
                "before": null,
                "children": [
                    {"kind": "t3", "data": {
                        "id": "p1",
                        "title": "Looking for a good chatbot",
                        "selftext": "for my store",
                        "author": "alice",
                        "subreddit": "smallbusiness",
                        "created_utc": 1700000000.0
                    }},
                    {"kind": "t3", "data": {
                        "id": "p2",
                        "title": "Our own post",
                        "selftext": "",
                        "author": "Netia_Bot",
                        "subreddit": "smallbusiness",
                        "created_utc": 1700000001.0
                    }},
                    {"kind": "t3", "data": {
                        "id": "p3",
                        "title": "Locked thread",
                        "author": "carol",
                        "subreddit": "smallbusiness",
                        "created_utc": 1700000002.0,
                        "locked": true
                    }}
                ]
            }
        })
    }

    fn comment_listing() -> serde_json::Value {
        json!({
            "kind": "Listing",
            "data": {
                "children": [
                    {"kind": "t1", "data": {
                        "id": "c1",
                        "body": "we have so many missed calls",
                        "author": "bob",
                        "subreddit": "smallbusiness",
                        "link_id": "t3_p1",
                        "created_utc": 1700000100.0
                    }}
                ]
            }
        })
    }

    #[test]
    fn test_config_creation() {
        let config = RedditOAuth2Config::new(
            "id".to_string(),
            "secret".to_string(),
            "user".to_string(),
            "pass".to_string(),
            "agent".to_string(),
        );
        assert_eq!(config.client_id, "id");
        assert_eq!(config.token_url, "https://www.reddit.com/api/v1/access_token");
    }

    #[test]
    fn test_required_scopes() {
        assert_eq!(
            crate::RedditAuth::get_required_scopes(),
            vec!["identity", "read", "submit"]
        );
    }

    #[test]
    fn test_thing_ids() {
        let post: netia_core::ContentItem = api::RedditPostData {
            id: "abc".to_string(),
            title: "t".to_string(),
            selftext: String::new(),
            author: "a".to_string(),
            subreddit: "s".to_string(),
            permalink: String::new(),
            created_utc: 0.0,
            locked: false,
            archived: false,
        }
        .into();
        assert_eq!(api::thing_id(&post).unwrap(), "t3_abc");

        let mut comment = post.clone();
        comment.kind = ContentKind::Comment;
        assert_eq!(api::thing_id(&comment).unwrap(), "t1_abc");

        comment.kind = ContentKind::Message;
        assert!(api::thing_id(&comment).is_err());
    }

    #[tokio::test]
    async fn test_token_state_and_expiry() {
        let server = MockServer::start().await;
        let client = create_client(&server);
        assert_eq!(client.auth_state().await, AuthState::NotAuthenticated);

        let past = SystemTime::now() - Duration::from_secs(10);
        client
            .auth
            .set_token(RedditToken {
                access_token: "old".to_string(),
                expires_at: past,
                scope: vec![],
            })
            .await;
        assert!(matches!(
            client.auth_state().await,
            AuthState::TokenExpired { .. }
        ));
    }

    #[tokio::test]
    async fn test_recent_content_merges_posts_and_comments() {
        let server = MockServer::start().await;
        mount_token(&server, 1).await;
        Mock::given(method("GET"))
            .and(path("/r/smallbusiness/new"))
            .and(query_param("limit", "10"))
            .and(header("authorization", "Bearer token-abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(post_listing()))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/r/smallbusiness/comments"))
            .respond_with(ResponseTemplate::new(200).set_body_json(comment_listing()))
            .expect(1)
            .mount(&server)
            .await;

        let client = create_client(&server);
        let items = client
            .recent_content(&Scope::subreddit("smallbusiness"), 10)
            .await
            .unwrap();

        let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["p1", "c1"]);
        assert_eq!(items[0].text(), "Looking for a good chatbot for my store");
        assert_eq!(items[1].kind, ContentKind::Comment);
        assert_eq!(items[1].parent_id.as_deref(), Some("p1"));
        assert!(matches!(
            client.auth_state().await,
            AuthState::Authenticated { .. }
        ));
    }

    #[tokio::test]
    async fn test_missing_subreddit() {
        let server = MockServer::start().await;
        mount_token(&server, 1).await;
        Mock::given(method("GET"))
            .and(path("/r/nope/new"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = create_client(&server);
        let err = client
            .recent_content(&Scope::subreddit("nope"), 10)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::RedditApi(RedditApiError::SubredditNotFound { ref subreddit }) if subreddit == "nope"
        ));
    }

    #[tokio::test]
    async fn test_reply_posts_comment() {
        let server = MockServer::start().await;
        mount_token(&server, 1).await;
        Mock::given(method("POST"))
            .and(path("/api/comment"))
            .and(body_string_contains("thing_id=t3_p1"))
            .and(body_string_contains("api_type=json"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"json": {"errors": [], "data": {}}})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/r/smallbusiness/new"))
            .respond_with(ResponseTemplate::new(200).set_body_json(post_listing()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/r/smallbusiness/comments"))
            .respond_with(ResponseTemplate::new(200).set_body_json(comment_listing()))
            .mount(&server)
            .await;

        let client = create_client(&server);
        let items = client
            .recent_content(&Scope::subreddit("smallbusiness"), 10)
            .await
            .unwrap();
        let sent = client.reply(&items[0], "Happy to help!").await.unwrap();
        assert_eq!(sent, "Happy to help!");
    }

    #[tokio::test]
    async fn test_rejected_reply() {
        let server = MockServer::start().await;
        mount_token(&server, 1).await;
        Mock::given(method("POST"))
            .and(path("/api/comment"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "json": {"errors": [["THREAD_LOCKED", "that thread is locked", "parent"]]}
            })))
            .mount(&server)
            .await;

        let client = create_client(&server);
        let item = netia_core::ContentItem {
            id: "c9".to_string(),
            kind: ContentKind::Comment,
            author: "bob".to_string(),
            title: None,
            body: "b".to_string(),
            scope: Scope::subreddit("smallbusiness"),
            parent_id: Some("p1".to_string()),
            created_at: chrono::Utc::now(),
        };
        let err = client.reply(&item, "hi").await.unwrap_err();
        match err {
            CoreError::RedditApi(RedditApiError::ReplyRejected { reason }) => {
                assert!(reason.starts_with("THREAD_LOCKED"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_verify_reauthenticates_on_invalid_token() {
        let server = MockServer::start().await;
        mount_token(&server, 2).await;
        Mock::given(method("GET"))
            .and(path("/api/v1/me"))
            .respond_with(ResponseTemplate::new(401))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/me"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"id": "u1", "name": "netia_bot"})),
            )
            .mount(&server)
            .await;

        let config = create_test_config(&server);
        let api = RedditApiClient::with_base_url(config.user_agent.clone(), &server.uri()).unwrap();
        let client = RedditClient::with_api(config, api, Arc::new(RequestThrottle::from_millis(250)));

        let started = Instant::now();
        client.verify().await.unwrap();
        // Two calls to /api/v1/me, so the retry waited for a second slot.
        assert!(started.elapsed() >= Duration::from_millis(250));
        let me_calls = server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .filter(|request| request.url.path() == "/api/v1/me")
            .count();
        assert_eq!(me_calls, 2);
    }

    #[tokio::test]
    async fn test_failed_authentication() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/access_token"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({"error": "invalid_client"})),
            )
            .mount(&server)
            .await;

        let client = create_client(&server);
        let err = client.verify().await.unwrap_err();
        assert!(matches!(
            err,
            CoreError::RedditApi(RedditApiError::AuthenticationFailed { .. })
        ));
    }

    #[test]
    fn test_scoped_rule_targets_its_subreddit() {
        let server_uri = "http://127.0.0.1:1";
        let config = RedditOAuth2Config::new(
            "id".into(),
            "secret".into(),
            "bot".into(),
            "pw".into(),
            "agent".into(),
        );
        let api = RedditApiClient::with_base_url("agent".into(), server_uri).unwrap();
        let client = RedditClient::with_api(config, api, Arc::new(RequestThrottle::from_millis(0)));
        let defaults = vec![Scope::subreddit("technology"), Scope::subreddit("startups")];

        assert_eq!(client.scopes_for_rule(None, &defaults), defaults);
        assert_eq!(
            client.scopes_for_rule(Some("healthcare"), &defaults),
            vec![Scope::subreddit("healthcare")]
        );
    }
}
