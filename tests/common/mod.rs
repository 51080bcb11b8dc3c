#![allow(dead_code)]

use std::sync::Arc;

use failfeed::FeedClient;
use failfeed::auth::{MemoryTokenStorage, TokenSlot, TokenStorage};
use failfeed::config::{Config, StorageBackend};
use serde_json::{Value, json};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// A client wired to a mock API with in-memory storages for both scopes.
pub struct Harness {
    pub server: MockServer,
    pub client: FeedClient,
    pub durable: MemoryTokenStorage,
    pub session: MemoryTokenStorage,
}

pub fn config_for(server: &MockServer) -> Config {
    let mut config = Config::default();
    config.api.base_url = format!("{}/api", server.uri());
    config.api.media_base_url = server.uri();
    config.cache.sweep_interval_secs = 0;
    config.storage.backend = StorageBackend::Memory;
    config
}

pub async fn harness() -> Harness {
    let server = MockServer::start().await;
    let durable = MemoryTokenStorage::new();
    let session = MemoryTokenStorage::new();
    let client = client_over(&server, &durable, &session);
    Harness {
        server,
        client,
        durable,
        session,
    }
}

/// A second client over the same storages, as after a restart.
pub fn client_over(
    server: &MockServer,
    durable: &MemoryTokenStorage,
    session: &MemoryTokenStorage,
) -> FeedClient {
    FeedClient::with_storage(
        config_for(server),
        Arc::new(durable.clone()),
        Arc::new(session.clone()),
    )
    .unwrap()
}

pub fn user_json(id: u64, username: &str) -> Value {
    json!({
        "id": id,
        "email": format!("{username}@example.com"),
        "username": username,
        "profile_picture": null,
        "bio": "",
        "created_at": "2024-05-01T10:00:00Z"
    })
}

pub fn post_json(id: u64, title: &str) -> Value {
    json!({
        "id": id,
        "title": title,
        "content": "It went wrong.",
        "author": {"id": 1, "username": "sam", "profile_picture": null},
        "tags": [],
        "like_count": 0, "hug_count": 0, "relate_count": 0,
        "is_liked": false, "is_hugged": false, "is_related": false,
        "created_at": "2024-05-01T10:00:00Z"
    })
}

pub fn page_json(results: Vec<Value>) -> Value {
    json!({
        "count": results.len(),
        "next": null,
        "previous": null,
        "results": results
    })
}

pub fn comment_json(id: u64, content: &str, parent: Option<u64>) -> Value {
    json!({
        "id": id.to_string(),
        "user": {"id": "2", "username": "kai", "profile_picture": null},
        "content": content,
        "parent": parent.map(|p| p.to_string()),
        "created_at": "2024-05-01T10:00:00Z",
        "updated_at": "2024-05-01T10:00:00Z",
        "replies": []
    })
}

pub async fn mount_profile(server: &MockServer, access: &str, expected_calls: Option<u64>) {
    let mock = Mock::given(method("GET"))
        .and(path("/api/users/profile/"))
        .and(header("authorization", format!("Bearer {access}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_json(1, "sam")));
    let mock = match expected_calls {
        Some(n) => mock.expect(n),
        None => mock,
    };
    mock.mount(server).await;
}

/// Store a durable pair and restore it, validating against the mock profile.
pub async fn sign_in(h: &Harness, access: &str, refresh: &str) {
    h.durable.save(TokenSlot::Access, access).unwrap();
    h.durable.save(TokenSlot::Refresh, refresh).unwrap();
    mount_profile(&h.server, access, None).await;
    h.client.initialize().await.unwrap();
    assert!(h.client.auth().is_authenticated());
}

pub fn stored(storage: &MemoryTokenStorage, slot: TokenSlot) -> Option<String> {
    storage.load(slot).unwrap()
}

/// Session-scoped storage starts empty in every new process.
pub fn fresh_session() -> MemoryTokenStorage {
    MemoryTokenStorage::new()
}
