mod common;

use std::time::Duration;

use failfeed::Error;
use failfeed::auth::{SessionEvent, TokenSlot};
use failfeed::models::NewPost;
use failfeed::net::{ApiRequest, Attachment};
use serde_json::{Value, json};
use wiremock::matchers::{body_json, header, header_regex, method, path, path_regex};
use wiremock::{Mock, ResponseTemplate};

use common::{harness, post_json, sign_in, stored, user_json};

fn expired() -> ResponseTemplate {
    ResponseTemplate::new(401).set_body_json(json!({
        "detail": "Given token not valid for any token type"
    }))
}

#[tokio::test]
async fn test_concurrent_401s_share_one_refresh() {
    let h = harness().await;
    sign_in(&h, "old", "r1").await;

    Mock::given(method("GET"))
        .and(path_regex(r"^/api/posts/\d+/$"))
        .and(header("authorization", "Bearer old"))
        .respond_with(expired())
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/api/posts/\d+/$"))
        .and(header("authorization", "Bearer new"))
        .respond_with(ResponseTemplate::new(200).set_body_json(post_json(1, "ok")))
        .expect(6)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/users/token/refresh/"))
        .and(body_json(json!({"refresh": "r1"})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access": "new"}))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&h.server)
        .await;

    let mut tasks = Vec::new();
    for id in 0..6 {
        let api = h.client.api().clone();
        tasks.push(tokio::spawn(async move {
            api.json::<Value>(&ApiRequest::get(format!("/posts/{id}/"))).await
        }));
    }
    for task in tasks {
        let body = task.await.unwrap().unwrap();
        assert_eq!(body["title"], "ok");
    }

    assert_eq!(h.client.api().refresh_coordinator().refresh_count(), 1);
    assert_eq!(h.client.auth().access_token().as_deref(), Some("new"));
    // Updated in the scope it was found in; refresh token untouched.
    assert_eq!(stored(&h.durable, TokenSlot::Access).as_deref(), Some("new"));
    assert_eq!(stored(&h.durable, TokenSlot::Refresh).as_deref(), Some("r1"));
    assert!(h.session.is_empty());
    h.server.verify().await;
}

#[tokio::test]
async fn test_retried_request_is_not_retried_again() {
    let h = harness().await;
    sign_in(&h, "old", "r1").await;

    Mock::given(method("GET"))
        .and(path("/api/posts/9/"))
        .respond_with(expired())
        .expect(2)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/users/token/refresh/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access": "new"})))
        .expect(1)
        .mount(&h.server)
        .await;

    let err = h.client.posts().get("9").await.unwrap_err();

    assert!(matches!(err, Error::Unauthorized(_)), "got {err:?}");
    // The refresh itself worked, so the session survives.
    assert!(h.client.auth().is_authenticated());
    h.server.verify().await;
}

#[tokio::test]
async fn test_failed_refresh_logs_out_and_surfaces_refresh_error() {
    let h = harness().await;
    sign_in(&h, "old", "r1").await;
    let mut events = h.client.auth().subscribe();

    Mock::given(method("GET"))
        .and(path("/api/posts/"))
        .respond_with(expired())
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/users/token/refresh/"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"detail": "Token is blacklisted"})),
        )
        .expect(1)
        .mount(&h.server)
        .await;

    let err = h.client.posts().list(1).await.unwrap_err();

    assert_eq!(err, Error::SessionExpired("Token is blacklisted".into()));
    let session = h.client.auth().session();
    assert!(!session.is_authenticated);
    assert!(session.user.is_none());
    assert!(h.durable.is_empty());
    assert!(h.session.is_empty());

    assert_eq!(events.recv().await.unwrap(), SessionEvent::LoggedOut);
    assert_eq!(
        events.recv().await.unwrap(),
        SessionEvent::SignInRequired {
            route: "/login".into()
        }
    );
    h.server.verify().await;
}

#[tokio::test]
async fn test_refresh_finishing_after_logout_is_discarded() {
    let h = harness().await;
    sign_in(&h, "old", "r1").await;

    Mock::given(method("POST"))
        .and(path("/api/users/token/refresh/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access": "new"}))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&h.server)
        .await;

    let auth = h.client.auth().clone();
    let refresh = tokio::spawn(async move { auth.refresh_access_token().await });
    tokio::time::sleep(Duration::from_millis(50)).await;
    h.client.logout();

    let err = refresh.await.unwrap().unwrap_err();

    assert!(matches!(err, Error::SessionExpired(_)), "got {err:?}");
    let session = h.client.auth().session();
    assert!(!session.is_authenticated);
    assert!(session.access_token.is_none());
    assert!(h.durable.is_empty());
    assert!(h.session.is_empty());
    h.server.verify().await;
}

#[tokio::test]
async fn test_forced_logout_drops_previous_users_cache() {
    let h = harness().await;
    sign_in(&h, "a1", "r1").await;

    assert_eq!(h.client.users().profile().await.unwrap().username, "sam");
    assert!(h.client.cache().peek("users/profile").is_some());

    Mock::given(method("GET"))
        .and(path("/api/posts/"))
        .respond_with(expired())
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/users/token/refresh/"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "expired"})))
        .mount(&h.server)
        .await;

    assert!(h.client.posts().list(1).await.is_err());
    assert!(h.client.cache().is_empty());

    Mock::given(method("POST"))
        .and(path("/api/users/login/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access": "a2",
            "refresh": "r2",
            "user": user_json(2, "kai")
        })))
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/users/profile/"))
        .and(header("authorization", "Bearer a2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_json(2, "kai")))
        .expect(1)
        .mount(&h.server)
        .await;

    h.client
        .auth()
        .login("kai@example.com", "pw", true)
        .await
        .unwrap();

    assert_eq!(h.client.users().profile().await.unwrap().username, "kai");
    h.server.verify().await;
}

#[tokio::test]
async fn test_queued_requests_share_refresh_failure() {
    let h = harness().await;
    sign_in(&h, "old", "r1").await;
    let mut events = h.client.auth().subscribe();

    Mock::given(method("GET"))
        .and(path_regex(r"^/api/posts/\d+/$"))
        .respond_with(expired())
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/users/token/refresh/"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({"detail": "expired"}))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&h.server)
        .await;

    let mut tasks = Vec::new();
    for id in 0..4 {
        let api = h.client.api().clone();
        tasks.push(tokio::spawn(async move {
            api.json::<Value>(&ApiRequest::get(format!("/posts/{id}/"))).await
        }));
    }
    for task in tasks {
        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(err, Error::SessionExpired(_)), "got {err:?}");
    }

    assert!(!h.client.auth().is_authenticated());
    // One sign-in prompt, from the request that ran the refresh.
    let mut prompts = 0;
    while let Ok(event) = events.try_recv() {
        if matches!(event, SessionEvent::SignInRequired { .. }) {
            prompts += 1;
        }
    }
    assert_eq!(prompts, 1);
    h.server.verify().await;
}

#[tokio::test]
async fn test_multipart_body_is_rebuilt_for_retry() {
    let h = harness().await;
    sign_in(&h, "old", "r1").await;

    Mock::given(method("POST"))
        .and(path("/api/posts/"))
        .and(header("authorization", "Bearer old"))
        .respond_with(expired())
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/posts/"))
        .and(header("authorization", "Bearer new"))
        .and(header_regex("content-type", "^multipart/form-data"))
        .respond_with(ResponseTemplate::new(201).set_body_json(post_json(12, "With picture")))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/users/token/refresh/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access": "new"})))
        .expect(1)
        .mount(&h.server)
        .await;

    let post = h
        .client
        .posts()
        .create(&NewPost {
            title: "With picture".into(),
            content: "The outage dashboard".into(),
            tag_names: vec!["outage".into()],
            media: Some(Attachment::new("media", "graph.png", "image/png", vec![0x89, 0x50, 0x4e, 0x47])),
        })
        .await
        .unwrap();

    assert_eq!(post.id, "12");
    h.server.verify().await;
}

#[tokio::test]
async fn test_unauthenticated_401_requires_sign_in() {
    let h = harness().await;
    let mut events = h.client.auth().subscribe();

    Mock::given(method("GET"))
        .and(path("/api/users/suggested/"))
        .respond_with(expired())
        .expect(1)
        .mount(&h.server)
        .await;

    let err = h.client.users().suggested().await.unwrap_err();

    assert!(matches!(err, Error::SessionExpired(_)));
    assert_eq!(events.recv().await.unwrap(), SessionEvent::LoggedOut);
    assert!(matches!(
        events.recv().await.unwrap(),
        SessionEvent::SignInRequired { .. }
    ));
}
