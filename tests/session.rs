mod common;

use std::time::Duration;

use failfeed::Error;
use failfeed::auth::{PersistenceScope, Registration, SessionEvent, TokenSlot, TokenStorage};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, ResponseTemplate};

use common::{client_over, harness, mount_profile, stored, user_json};

#[tokio::test]
async fn test_remembered_login_persists_durably() {
    let h = harness().await;
    let mut events = h.client.auth().subscribe();

    Mock::given(method("POST"))
        .and(path("/api/users/login/"))
        .and(body_json(json!({
            "email": "sam@example.com",
            "password": "hunter2",
            "remember_me": true
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access": "a1",
            "refresh": "r1",
            "user": user_json(1, "sam")
        })))
        .expect(1)
        .mount(&h.server)
        .await;

    let user = h
        .client
        .auth()
        .login("sam@example.com", "hunter2", true)
        .await
        .unwrap();

    assert_eq!(user.username, "sam");
    let session = h.client.auth().session();
    assert!(session.is_authenticated);
    assert!(!session.is_loading);
    assert_eq!(session.scope, Some(PersistenceScope::Durable));
    assert_eq!(stored(&h.durable, TokenSlot::Access).as_deref(), Some("a1"));
    assert_eq!(stored(&h.durable, TokenSlot::Refresh).as_deref(), Some("r1"));
    assert!(h.session.is_empty());
    assert_eq!(
        events.recv().await.unwrap(),
        SessionEvent::LoggedIn {
            username: "sam".into()
        }
    );

    // A restart over the same durable storage restores the session.
    mount_profile(&h.server, "a1", Some(1)).await;
    let restarted = client_over(&h.server, &h.durable, &common::fresh_session());
    restarted.initialize().await.unwrap();
    assert!(restarted.auth().is_authenticated());
    assert_eq!(restarted.auth().user().unwrap().username, "sam");
    h.server.verify().await;
}

#[tokio::test]
async fn test_unremembered_login_is_session_scoped() {
    let h = harness().await;

    Mock::given(method("POST"))
        .and(path("/api/users/login/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access": "a1",
            "refresh": "r1",
            "user": user_json(1, "sam")
        })))
        .mount(&h.server)
        .await;

    h.client
        .auth()
        .login("sam@example.com", "hunter2", false)
        .await
        .unwrap();

    assert_eq!(
        h.client.auth().session().scope,
        Some(PersistenceScope::Session)
    );
    assert_eq!(stored(&h.session, TokenSlot::Access).as_deref(), Some("a1"));
    assert!(h.durable.is_empty());

    // The session scope does not outlive the process.
    let restarted = client_over(&h.server, &h.durable, &common::fresh_session());
    restarted.initialize().await.unwrap();
    assert!(!restarted.auth().is_authenticated());
}

#[tokio::test]
async fn test_login_fetches_profile_when_user_missing() {
    let h = harness().await;

    Mock::given(method("POST"))
        .and(path("/api/users/login/"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"access": "a1", "refresh": "r1"})),
        )
        .mount(&h.server)
        .await;
    mount_profile(&h.server, "a1", Some(1)).await;

    let user = h
        .client
        .auth()
        .login("sam@example.com", "hunter2", true)
        .await
        .unwrap();

    assert_eq!(user.id, "1");
    assert_eq!(h.client.auth().user(), Some(user));
    h.server.verify().await;
}

#[tokio::test]
async fn test_rejected_login_records_server_detail() {
    let h = harness().await;

    Mock::given(method("POST"))
        .and(path("/api/users/login/"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "detail": "No active account found with the given credentials"
        })))
        .mount(&h.server)
        .await;

    let err = h
        .client
        .auth()
        .login("sam@example.com", "wrong", true)
        .await
        .unwrap_err();

    assert_eq!(
        err,
        Error::Auth("No active account found with the given credentials".into())
    );
    let session = h.client.auth().session();
    assert!(!session.is_authenticated);
    assert!(!session.is_loading);
    assert_eq!(
        session.error.as_deref(),
        Some("No active account found with the given credentials")
    );
    assert!(h.durable.is_empty());

    h.client.auth().clear_error();
    assert!(h.client.auth().session().error.is_none());
}

#[tokio::test]
async fn test_login_server_error_uses_generic_message() {
    let h = harness().await;

    Mock::given(method("POST"))
        .and(path("/api/users/login/"))
        .respond_with(ResponseTemplate::new(500).set_body_string("<html>boom</html>"))
        .mount(&h.server)
        .await;

    let err = h
        .client
        .auth()
        .login("sam@example.com", "hunter2", true)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Server { status: 500, .. }), "got {err:?}");
    assert_eq!(
        h.client.auth().session().error.as_deref(),
        Some("Login failed")
    );
}

#[tokio::test]
async fn test_logout_then_initialize_stays_signed_out() {
    let h = harness().await;
    common::sign_in(&h, "a1", "r1").await;
    let mut events = h.client.auth().subscribe();

    h.client.logout();

    assert_eq!(events.recv().await.unwrap(), SessionEvent::LoggedOut);
    assert!(h.durable.is_empty());
    h.client.initialize().await.unwrap();
    let session = h.client.auth().session();
    assert!(!session.is_authenticated);
    assert!(session.user.is_none());
    assert!(session.access_token.is_none());

    // Idempotent.
    h.client.logout();
    assert!(!h.client.auth().is_authenticated());
}

#[tokio::test]
async fn test_initialize_with_rejected_token_logs_out() {
    let h = harness().await;
    h.durable.save(TokenSlot::Access, "stale").unwrap();
    h.durable.save(TokenSlot::Refresh, "r1").unwrap();

    Mock::given(method("GET"))
        .and(path("/api/users/profile/"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"detail": "Token is invalid"})),
        )
        .expect(1)
        .mount(&h.server)
        .await;

    h.client
        .cache()
        .set("users/profile", user_json(9, "previous"));

    h.client.initialize().await.unwrap();

    assert!(!h.client.auth().is_authenticated());
    assert!(h.client.auth().user().is_none());
    assert!(h.durable.is_empty());
    assert!(h.client.cache().is_empty());
    h.server.verify().await;
}

#[tokio::test]
async fn test_initialize_with_half_a_pair_is_signed_out() {
    let h = harness().await;
    h.durable.save(TokenSlot::Access, "a1").unwrap();

    h.client.initialize().await.unwrap();

    assert!(!h.client.auth().is_authenticated());
}

#[tokio::test]
async fn test_concurrent_initialize_validates_once() {
    let h = harness().await;
    h.durable.save(TokenSlot::Access, "a1").unwrap();
    h.durable.save(TokenSlot::Refresh, "r1").unwrap();

    Mock::given(method("GET"))
        .and(path("/api/users/profile/"))
        .and(header("authorization", "Bearer a1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(user_json(1, "sam"))
                .set_delay(Duration::from_millis(100)),
        )
        .expect(1)
        .mount(&h.server)
        .await;

    let (a, b, c) = tokio::join!(
        h.client.initialize(),
        h.client.initialize(),
        h.client.initialize()
    );
    a.unwrap();
    b.unwrap();
    c.unwrap();

    assert!(h.client.auth().is_authenticated());
    assert_eq!(h.client.auth().user().unwrap().username, "sam");
    h.server.verify().await;
}

#[tokio::test]
async fn test_register_stores_durably() {
    let h = harness().await;

    Mock::given(method("POST"))
        .and(path("/api/users/register/"))
        .and(body_json(json!({
            "email": "kai@example.com",
            "username": "kai",
            "password": "s3cret!!",
            "password2": "s3cret!!"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "access": "a2",
            "refresh": "r2",
            "user": user_json(2, "kai")
        })))
        .expect(1)
        .mount(&h.server)
        .await;

    let user = h
        .client
        .auth()
        .register(&Registration {
            email: "kai@example.com".into(),
            username: "kai".into(),
            password: "s3cret!!".into(),
            password2: "s3cret!!".into(),
        })
        .await
        .unwrap();

    assert_eq!(user.username, "kai");
    assert_eq!(stored(&h.durable, TokenSlot::Refresh).as_deref(), Some("r2"));
    assert_eq!(
        h.client.auth().session().scope,
        Some(PersistenceScope::Durable)
    );
    h.server.verify().await;
}

#[tokio::test]
async fn test_register_conflict_reports_field_error() {
    let h = harness().await;

    Mock::given(method("POST"))
        .and(path("/api/users/register/"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "email": ["user with this email already exists."]
        })))
        .mount(&h.server)
        .await;

    let err = h
        .client
        .auth()
        .register(&Registration {
            email: "kai@example.com".into(),
            username: "kai".into(),
            password: "s3cret!!".into(),
            password2: "s3cret!!".into(),
        })
        .await
        .unwrap_err();

    assert_eq!(
        err,
        Error::Auth("email: user with this email already exists.".into())
    );
    assert_eq!(
        h.client.auth().session().error.as_deref(),
        Some("email: user with this email already exists.")
    );
}

#[tokio::test]
async fn test_federated_login_posts_provider_token() {
    let h = harness().await;

    Mock::given(method("POST"))
        .and(path("/api/users/google/"))
        .and(body_json(json!({
            "access_token": "google-id-token",
            "provider": "google"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access": "a3",
            "refresh": "r3",
            "user": user_json(3, "ana")
        })))
        .expect(1)
        .mount(&h.server)
        .await;

    let user = h
        .client
        .auth()
        .federated_login("google-id-token")
        .await
        .unwrap();

    assert_eq!(user.username, "ana");
    assert_eq!(stored(&h.durable, TokenSlot::Access).as_deref(), Some("a3"));
    h.server.verify().await;
}

#[tokio::test]
async fn test_federated_login_failure_fallback_message() {
    let h = harness().await;

    Mock::given(method("POST"))
        .and(path("/api/users/google/"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&h.server)
        .await;

    assert!(h.client.auth().federated_login("t").await.is_err());
    assert_eq!(
        h.client.auth().session().error.as_deref(),
        Some("Google login failed")
    );
}
