//! Integration tests for the SkillSwap backend.

use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use reqwest::Client;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::sync::mpsc;

use crate::config::{Config, PersistenceMode};
use crate::db::{init_database, MemoryRepository, Repository, SqliteRepository};
use crate::realtime::{
    Channel, ChannelConfig, ChannelEvent, ConnectionState, Hub, NotificationFeed, PresenceStatus,
    ServerEvent,
};
use crate::{create_router, AppState};

/// Test fixture for integration tests.
struct TestFixture {
    client: Client,
    base_url: String,
    ws_url: String,
    _temp_dir: TempDir,
}

impl TestFixture {
    async fn new() -> Self {
        Self::with_options(Some("test-api-key".to_string()), PersistenceMode::Sqlite).await
    }

    async fn memory() -> Self {
        Self::with_options(Some("test-api-key".to_string()), PersistenceMode::Memory).await
    }

    async fn with_options(psk: Option<String>, persistence: PersistenceMode) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.sqlite");

        let repo = match persistence {
            PersistenceMode::Sqlite => {
                let pool = init_database(&db_path).await.expect("Failed to init DB");
                Arc::new(Repository::Sqlite(SqliteRepository::new(pool)))
            }
            PersistenceMode::Memory => Arc::new(Repository::Memory(MemoryRepository::new())),
        };

        let config = Config {
            api_psk: psk.clone(),
            db_path,
            persistence,
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            log_level: "warn".to_string(),
        };

        let state = AppState {
            repo,
            hub: Arc::new(Hub::new()),
            config: Arc::new(config),
        };

        let app = create_router(state);

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get addr");
        let base_url = format!("http://{}", addr);
        let ws_url = format!("ws://{}/ws", addr);

        // Spawn server
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait for server to start
        tokio::time::sleep(Duration::from_millis(100)).await;

        let mut client_builder = Client::builder();
        if let Some(key) = psk {
            let mut headers = reqwest::header::HeaderMap::new();
            headers.insert("x-api-key", key.parse().unwrap());
            client_builder = client_builder.default_headers(headers);
        }

        TestFixture {
            client: client_builder.build().unwrap(),
            base_url,
            ws_url,
            _temp_dir: temp_dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn create_profile(&self, name: &str, offered: &[&str], wanted: &[&str]) -> String {
        let resp = self
            .client
            .post(self.url("/api/profiles"))
            .json(&json!({
                "name": name,
                "skillsOffered": offered,
                "skillsWanted": wanted,
                "availability": "weekends"
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        body["data"]["id"].as_str().unwrap().to_string()
    }

    fn channel_config(&self, user_id: &str) -> ChannelConfig {
        let mut config = ChannelConfig::new(&self.ws_url, test_token(3600), user_id);
        config.typing_idle = Duration::from_millis(300);
        config
    }
}

/// Unsigned JWT-shaped token with an expiry claim; the backend only reads
/// the claim, verification belongs to the auth service.
fn test_token(offset_secs: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let exp = Utc::now().timestamp() + offset_secs;
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"test","exp":{}}}"#, exp));
    format!("{}.{}.sig", header, payload)
}

async fn next_event(rx: &mut mpsc::UnboundedReceiver<ChannelEvent>) -> ChannelEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for channel event")
        .expect("channel event stream closed")
}

/// Skip channel-lifecycle noise until a server event matching `pred` arrives.
async fn wait_for_server_event<F>(
    rx: &mut mpsc::UnboundedReceiver<ChannelEvent>,
    mut pred: F,
) -> ServerEvent
where
    F: FnMut(&ServerEvent) -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        let event = tokio::time::timeout(remaining, rx.recv())
            .await
            .expect("timed out waiting for server event")
            .expect("channel event stream closed");
        if let ChannelEvent::Event(server_event) = event {
            if pred(&server_event) {
                return server_event;
            }
        }
    }
}

/// Assert that no server event matching `pred` arrives within `window`.
async fn assert_no_server_event<F>(
    rx: &mut mpsc::UnboundedReceiver<ChannelEvent>,
    window: Duration,
    mut pred: F,
) where
    F: FnMut(&ServerEvent) -> bool,
{
    let deadline = tokio::time::Instant::now() + window;
    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        match tokio::time::timeout(remaining, rx.recv()).await {
            Ok(Some(ChannelEvent::Event(event))) if pred(&event) => {
                panic!("unexpected server event: {:?}", event)
            }
            Ok(Some(_)) => {}
            Ok(None) | Err(_) => return,
        }
    }
}

// ==================== REST: health and auth ====================

#[tokio::test]
async fn test_health_check() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_auth_missing_psk() {
    let fixture = TestFixture::new().await;

    // Fresh client without the default API key header
    let client = Client::new();
    let resp = client
        .get(format!("{}/api/profiles", fixture.base_url))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_auth_invalid_psk() {
    let fixture = TestFixture::new().await;

    let client = Client::new();
    let resp = client
        .get(format!("{}/api/profiles", fixture.base_url))
        .header("x-api-key", "wrong-key")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn test_auth_valid_psk() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/api/profiles"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
}

// ==================== REST: profiles ====================

#[tokio::test]
async fn test_profile_crud() {
    let fixture = TestFixture::new().await;

    // Create
    let create_resp = fixture
        .client
        .post(fixture.url("/api/profiles"))
        .json(&json!({
            "name": "Alice",
            "location": "Berlin",
            "skillsOffered": ["Python"],
            "skillsWanted": ["Design"],
            "availability": "evenings"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(create_resp.status(), 200);
    let create_body: Value = create_resp.json().await.unwrap();
    assert_eq!(create_body["success"], true);
    let id = create_body["data"]["id"].as_str().unwrap();
    assert_eq!(create_body["data"]["name"], "Alice");
    assert_eq!(create_body["data"]["availability"], "evenings");
    assert_eq!(create_body["data"]["rating"], 0.0);

    // Get
    let get_resp = fixture
        .client
        .get(fixture.url(&format!("/api/profiles/{}", id)))
        .send()
        .await
        .unwrap();
    assert_eq!(get_resp.status(), 200);
    let get_body: Value = get_resp.json().await.unwrap();
    assert_eq!(get_body["data"]["skillsOffered"][0], "Python");

    // Update
    let update_resp = fixture
        .client
        .put(fixture.url(&format!("/api/profiles/{}", id)))
        .json(&json!({
            "location": "Hamburg",
            "skillsWanted": ["Design", "Photography"]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(update_resp.status(), 200);
    let update_body: Value = update_resp.json().await.unwrap();
    assert_eq!(update_body["data"]["location"], "Hamburg");
    assert_eq!(
        update_body["data"]["skillsWanted"].as_array().unwrap().len(),
        2
    );
    // Untouched fields survive
    assert_eq!(update_body["data"]["name"], "Alice");

    // Empty name is rejected
    let bad_resp = fixture
        .client
        .put(fixture.url(&format!("/api/profiles/{}", id)))
        .json(&json!({ "name": "  " }))
        .send()
        .await
        .unwrap();
    assert_eq!(bad_resp.status(), 400);

    // Deactivate (not a hard delete)
    let delete_resp = fixture
        .client
        .delete(fixture.url(&format!("/api/profiles/{}", id)))
        .send()
        .await
        .unwrap();
    assert_eq!(delete_resp.status(), 200);

    // Gone from the listing, still fetchable by id
    let list_resp = fixture
        .client
        .get(fixture.url("/api/profiles"))
        .send()
        .await
        .unwrap();
    let list_body: Value = list_resp.json().await.unwrap();
    assert!(list_body["data"].as_array().unwrap().is_empty());

    let get_again = fixture
        .client
        .get(fixture.url(&format!("/api/profiles/{}", id)))
        .send()
        .await
        .unwrap();
    assert_eq!(get_again.status(), 200);
    let get_again_body: Value = get_again.json().await.unwrap();
    assert_eq!(get_again_body["data"]["active"], false);

    // Missing profile is a 404
    let missing = fixture
        .client
        .get(fixture.url("/api/profiles/nope"))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), 404);
}

#[tokio::test]
async fn test_memory_persistence_mode() {
    let fixture = TestFixture::memory().await;

    let id = fixture.create_profile("Memo", &["Rust"], &["Go"]).await;

    let resp = fixture
        .client
        .get(fixture.url(&format!("/api/profiles/{}", id)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["name"], "Memo");

    // Same swap semantics as the durable store
    let other = fixture.create_profile("Peer", &["Go"], &["Rust"]).await;
    let swap_resp = fixture
        .client
        .post(fixture.url("/api/swap-requests"))
        .json(&json!({
            "requesterId": id,
            "providerId": other,
            "offeredSkill": "Rust",
            "requestedSkill": "Go"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(swap_resp.status(), 200);
}

// ==================== REST: skills ====================

#[tokio::test]
async fn test_skills_catalog() {
    let fixture = TestFixture::new().await;

    for (name, category) in [
        ("Python", "Programming"),
        ("Guitar", "Music"),
        ("Photography", "Creative"),
    ] {
        let resp = fixture
            .client
            .post(fixture.url("/api/skills"))
            .json(&json!({ "name": name, "category": category }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
    }

    // Duplicate names conflict
    let dup = fixture
        .client
        .post(fixture.url("/api/skills"))
        .json(&json!({ "name": "Python", "category": "Programming" }))
        .send()
        .await
        .unwrap();
    assert_eq!(dup.status(), 409);

    // Substring filter
    let list = fixture
        .client
        .get(fixture.url("/api/skills?q=pho"))
        .send()
        .await
        .unwrap();
    let list_body: Value = list.json().await.unwrap();
    let names: Vec<&str> = list_body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Photography"]);

    // Categories are distinct and sorted
    let categories = fixture
        .client
        .get(fixture.url("/api/skills/categories"))
        .send()
        .await
        .unwrap();
    let categories_body: Value = categories.json().await.unwrap();
    assert_eq!(
        categories_body["data"],
        json!(["Creative", "Music", "Programming"])
    );

    // Popularity counts offering profiles
    fixture.create_profile("A", &["Guitar"], &[]).await;
    fixture.create_profile("B", &["Guitar"], &[]).await;
    fixture.create_profile("C", &["Python"], &[]).await;

    let popular = fixture
        .client
        .get(fixture.url("/api/skills/popular?limit=2"))
        .send()
        .await
        .unwrap();
    let popular_body: Value = popular.json().await.unwrap();
    let top = popular_body["data"].as_array().unwrap();
    assert_eq!(top.len(), 2);
    assert_eq!(top[0]["name"], "Guitar");
    assert_eq!(top[0]["offeredCount"], 2);
}

// ==================== REST: matching ====================

#[tokio::test]
async fn test_match_ranking() {
    let fixture = TestFixture::new().await;

    let viewer = fixture
        .create_profile("Viewer", &["JavaScript"], &["Design"])
        .await;
    // Perfect skill complement, same availability: 40 + 20 = 60 with zero
    // rating and experience.
    let complement = fixture
        .create_profile("Complement", &["Design"], &["JavaScript"])
        .await;
    // No skills at all, same availability: 20.
    let blank = fixture.create_profile("Blank", &[], &[]).await;

    let resp = fixture
        .client
        .get(fixture.url(&format!("/api/profiles/{}/matches", viewer)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let results = body["data"]["results"].as_array().unwrap();

    assert_eq!(body["data"]["total"], 2);
    assert_eq!(results[0]["id"].as_str().unwrap(), complement);
    assert_eq!(results[0]["matchScore"], 60);
    assert_eq!(results[1]["id"].as_str().unwrap(), blank);
    assert_eq!(results[1]["matchScore"], 20);
    // The viewer is never their own candidate
    assert!(results.iter().all(|p| p["id"].as_str().unwrap() != viewer));

    // Free-text query narrows the list
    let filtered = fixture
        .client
        .get(fixture.url(&format!(
            "/api/profiles/{}/matches?q=design",
            viewer
        )))
        .send()
        .await
        .unwrap();
    let filtered_body: Value = filtered.json().await.unwrap();
    let filtered_results = filtered_body["data"]["results"].as_array().unwrap();
    assert_eq!(filtered_results.len(), 1);
    assert_eq!(filtered_results[0]["name"], "Complement");

    // Malformed availability degrades to no constraint
    let lax = fixture
        .client
        .get(fixture.url(&format!(
            "/api/profiles/{}/matches?availability=whenever",
            viewer
        )))
        .send()
        .await
        .unwrap();
    let lax_body: Value = lax.json().await.unwrap();
    assert_eq!(lax_body["data"]["total"], 2);

    // Pagination slices the ranked sequence
    let page = fixture
        .client
        .get(fixture.url(&format!(
            "/api/profiles/{}/matches?limit=1&offset=1",
            viewer
        )))
        .send()
        .await
        .unwrap();
    let page_body: Value = page.json().await.unwrap();
    let page_results = page_body["data"]["results"].as_array().unwrap();
    assert_eq!(page_results.len(), 1);
    assert_eq!(page_results[0]["id"].as_str().unwrap(), blank);
}

// ==================== REST: swap lifecycle ====================

#[tokio::test]
async fn test_swap_lifecycle() {
    let fixture = TestFixture::new().await;

    let alice = fixture
        .create_profile("Alice", &["Python"], &["Design"])
        .await;
    let bob = fixture
        .create_profile("Bob", &["Design"], &["Python"])
        .await;

    // Create
    let create_resp = fixture
        .client
        .post(fixture.url("/api/swap-requests"))
        .json(&json!({
            "requesterId": alice,
            "providerId": bob,
            "offeredSkill": "Python",
            "requestedSkill": "Design",
            "message": "Trade?"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(create_resp.status(), 200);
    let create_body: Value = create_resp.json().await.unwrap();
    let swap_id = create_body["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(create_body["data"]["status"], "pending");

    // The provider got a request notification
    let notif_resp = fixture
        .client
        .get(fixture.url(&format!("/api/notifications?userId={}", bob)))
        .send()
        .await
        .unwrap();
    let notif_body: Value = notif_resp.json().await.unwrap();
    let notifications = notif_body["data"].as_array().unwrap();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0]["type"], "request");

    // Both participants see the request in their listing
    for id in [&alice, &bob] {
        let listing: Value = fixture
            .client
            .get(fixture.url(&format!("/api/swap-requests?userId={}", id)))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(listing["data"].as_array().unwrap().len(), 1);
    }

    // Participants can fetch it directly
    let direct = fixture
        .client
        .get(fixture.url(&format!(
            "/api/swap-requests/{}?userId={}",
            swap_id, bob
        )))
        .send()
        .await
        .unwrap();
    assert_eq!(direct.status(), 200);

    // Completing straight from pending is an illegal transition
    let premature = fixture
        .client
        .put(fixture.url(&format!("/api/swap-requests/{}", swap_id)))
        .json(&json!({ "status": "completed", "userId": alice }))
        .send()
        .await
        .unwrap();
    assert_eq!(premature.status(), 409);

    // Only the provider may accept
    let wrong_actor = fixture
        .client
        .put(fixture.url(&format!("/api/swap-requests/{}", swap_id)))
        .json(&json!({ "status": "accepted", "userId": alice }))
        .send()
        .await
        .unwrap();
    assert_eq!(wrong_actor.status(), 403);

    let accept = fixture
        .client
        .put(fixture.url(&format!("/api/swap-requests/{}", swap_id)))
        .json(&json!({ "status": "accepted", "userId": bob }))
        .send()
        .await
        .unwrap();
    assert_eq!(accept.status(), 200);
    let accept_body: Value = accept.json().await.unwrap();
    assert_eq!(accept_body["data"]["status"], "accepted");

    // Either participant may complete; completion bumps both counters
    let complete = fixture
        .client
        .put(fixture.url(&format!("/api/swap-requests/{}", swap_id)))
        .json(&json!({ "status": "completed", "userId": alice }))
        .send()
        .await
        .unwrap();
    assert_eq!(complete.status(), 200);

    for id in [&alice, &bob] {
        let profile: Value = fixture
            .client
            .get(fixture.url(&format!("/api/profiles/{}", id)))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(profile["data"]["completedSwaps"], 1);
    }

    // Rating a completed swap updates the running average
    let rate = fixture
        .client
        .post(fixture.url("/api/ratings"))
        .json(&json!({
            "swapRequestId": swap_id,
            "raterId": bob,
            "ratedUserId": alice,
            "rating": 5,
            "feedback": "Great teacher"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(rate.status(), 200);

    let alice_profile: Value = fixture
        .client
        .get(fixture.url(&format!("/api/profiles/{}", alice)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(alice_profile["data"]["rating"], 5.0);

    // One rating per (swap, rater)
    let dup_rate = fixture
        .client
        .post(fixture.url("/api/ratings"))
        .json(&json!({
            "swapRequestId": swap_id,
            "raterId": bob,
            "ratedUserId": alice,
            "rating": 1
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(dup_rate.status(), 409);

    // Outsiders cannot rate
    let carol = fixture.create_profile("Carol", &[], &[]).await;
    let outsider_rate = fixture
        .client
        .post(fixture.url("/api/ratings"))
        .json(&json!({
            "swapRequestId": swap_id,
            "raterId": carol,
            "ratedUserId": alice,
            "rating": 3
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(outsider_rate.status(), 403);

    // Only the requester may delete their request
    let wrong_delete = fixture
        .client
        .delete(fixture.url(&format!(
            "/api/swap-requests/{}?userId={}",
            swap_id, bob
        )))
        .send()
        .await
        .unwrap();
    assert_eq!(wrong_delete.status(), 403);

    let delete = fixture
        .client
        .delete(fixture.url(&format!(
            "/api/swap-requests/{}?userId={}",
            swap_id, alice
        )))
        .send()
        .await
        .unwrap();
    assert_eq!(delete.status(), 200);
}

#[tokio::test]
async fn test_swap_cancel_rules() {
    let fixture = TestFixture::new().await;

    let alice = fixture.create_profile("Alice", &["A"], &["B"]).await;
    let bob = fixture.create_profile("Bob", &["B"], &["A"]).await;

    let create_body: Value = fixture
        .client
        .post(fixture.url("/api/swap-requests"))
        .json(&json!({
            "requesterId": alice,
            "providerId": bob,
            "offeredSkill": "A",
            "requestedSkill": "B"
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let swap_id = create_body["data"]["id"].as_str().unwrap();

    // Only the requester may cancel
    let wrong_cancel = fixture
        .client
        .put(fixture.url(&format!("/api/swap-requests/{}", swap_id)))
        .json(&json!({ "status": "cancelled", "userId": bob }))
        .send()
        .await
        .unwrap();
    assert_eq!(wrong_cancel.status(), 403);

    let cancel = fixture
        .client
        .put(fixture.url(&format!("/api/swap-requests/{}", swap_id)))
        .json(&json!({ "status": "cancelled", "userId": alice }))
        .send()
        .await
        .unwrap();
    assert_eq!(cancel.status(), 200);

    // Cancelled is terminal
    let revive = fixture
        .client
        .put(fixture.url(&format!("/api/swap-requests/{}", swap_id)))
        .json(&json!({ "status": "accepted", "userId": bob }))
        .send()
        .await
        .unwrap();
    assert_eq!(revive.status(), 409);

    // Requests are scoped to their participants
    let carol = fixture.create_profile("Carol", &[], &[]).await;
    let peek = fixture
        .client
        .get(fixture.url(&format!(
            "/api/swap-requests/{}?userId={}",
            swap_id, carol
        )))
        .send()
        .await
        .unwrap();
    assert_eq!(peek.status(), 403);
}

// ==================== REST: conversations ====================

#[tokio::test]
async fn test_conversations_and_unread_counts() {
    let fixture = TestFixture::new().await;

    let alice = fixture.create_profile("Alice", &[], &[]).await;
    let bob = fixture.create_profile("Bob", &[], &[]).await;

    for content in ["hi", "are you there?"] {
        let resp = fixture
            .client
            .post(fixture.url("/api/messages"))
            .json(&json!({
                "senderId": alice,
                "recipientId": bob,
                "content": content
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
    }

    // Bob sees one conversation with two unread messages
    let convos: Value = fixture
        .client
        .get(fixture.url(&format!("/api/conversations?userId={}", bob)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let summaries = convos["data"].as_array().unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0]["peerName"], "Alice");
    assert_eq!(summaries[0]["unreadCount"], 2);
    assert_eq!(summaries[0]["lastMessage"], "are you there?");
    let convo_id = summaries[0]["id"].as_str().unwrap().to_string();

    // Alice authored everything, so her unread count is zero
    let alice_convos: Value = fixture
        .client
        .get(fixture.url(&format!("/api/conversations?userId={}", alice)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(alice_convos["data"][0]["unreadCount"], 0);

    // Messages arrive in order
    let messages: Value = fixture
        .client
        .get(fixture.url(&format!("/api/conversations/{}/messages", convo_id)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let items = messages["data"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["content"], "hi");
    assert_eq!(items[1]["content"], "are you there?");

    // Mark-read flips exactly the addressed messages
    let read: Value = fixture
        .client
        .post(fixture.url(&format!(
            "/api/conversations/{}/read?userId={}",
            convo_id, bob
        )))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(read["data"], 2);

    let convos_after: Value = fixture
        .client
        .get(fixture.url(&format!("/api/conversations?userId={}", bob)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(convos_after["data"][0]["unreadCount"], 0);

    // Non-participants cannot mark it read
    let carol = fixture.create_profile("Carol", &[], &[]).await;
    let forbidden = fixture
        .client
        .post(fixture.url(&format!(
            "/api/conversations/{}/read?userId={}",
            convo_id, carol
        )))
        .send()
        .await
        .unwrap();
    assert_eq!(forbidden.status(), 403);
}

// ==================== REST: notifications ====================

#[tokio::test]
async fn test_notification_endpoints() {
    let fixture = TestFixture::new().await;

    let alice = fixture.create_profile("Alice", &["A"], &[]).await;
    let bob = fixture.create_profile("Bob", &["B"], &[]).await;

    // Two swap requests produce two notifications for Bob
    for skill in ["A", "B"] {
        fixture
            .client
            .post(fixture.url("/api/swap-requests"))
            .json(&json!({
                "requesterId": alice,
                "providerId": bob,
                "offeredSkill": skill,
                "requestedSkill": "B"
            }))
            .send()
            .await
            .unwrap();
    }

    let list: Value = fixture
        .client
        .get(fixture.url(&format!("/api/notifications?userId={}", bob)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let notifications = list["data"].as_array().unwrap();
    assert_eq!(notifications.len(), 2);
    assert!(notifications.iter().all(|n| n["isRead"] == false));
    let first_id = notifications[0]["id"].as_str().unwrap().to_string();

    // Mark one read
    let one: Value = fixture
        .client
        .post(fixture.url(&format!("/api/notifications/{}/read", first_id)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(one["data"]["isRead"], true);

    // Mark the rest read
    let all: Value = fixture
        .client
        .post(fixture.url(&format!(
            "/api/notifications/read-all?userId={}",
            bob
        )))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(all["data"], 1);

    // Delete one, missing ids are 404
    let delete = fixture
        .client
        .delete(fixture.url(&format!("/api/notifications/{}", first_id)))
        .send()
        .await
        .unwrap();
    assert_eq!(delete.status(), 200);

    let missing = fixture
        .client
        .delete(fixture.url(&format!("/api/notifications/{}", first_id)))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), 404);
}

// ==================== Real-time: end to end ====================

#[tokio::test]
async fn test_realtime_presence_messaging_and_typing() {
    let fixture = TestFixture::new().await;

    let alice = fixture.create_profile("Alice", &[], &[]).await;
    let bob = fixture.create_profile("Bob", &[], &[]).await;

    let (alice_channel, mut alice_rx) = Channel::connect(fixture.channel_config(&alice));
    assert!(matches!(next_event(&mut alice_rx).await, ChannelEvent::Connected));

    let (bob_channel, mut bob_rx) = Channel::connect(fixture.channel_config(&bob));
    assert!(matches!(next_event(&mut bob_rx).await, ChannelEvent::Connected));

    // Both sides compute the same shared room name
    assert_eq!(
        alice_channel.user_room(&bob),
        bob_channel.user_room(&alice)
    );

    // Alice sees Bob come online
    let presence = wait_for_server_event(&mut alice_rx, |event| {
        matches!(event, ServerEvent::UserStatus(p) if p.user_id == bob)
    })
    .await;
    if let ServerEvent::UserStatus(p) = presence {
        assert_eq!(p.status, PresenceStatus::Online);
    }

    // First message reaches Bob as a notification even without a room
    alice_channel.send_message(&bob, "hello bob");
    let notification = wait_for_server_event(&mut bob_rx, |event| {
        matches!(event, ServerEvent::Notification(_))
    })
    .await;
    let mut feed = NotificationFeed::new();
    if let ServerEvent::Notification(n) = notification {
        assert_eq!(n.user_id, bob);
        assert_eq!(n.ref_user_id.as_deref(), Some(alice.as_str()));
        feed.push(n);
    }
    assert_eq!(feed.unread_count(), 1);

    // Both join the conversation room; live messages now flow
    let convos: Value = fixture
        .client
        .get(fixture.url(&format!("/api/conversations?userId={}", bob)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let convo_id = convos["data"][0]["id"].as_str().unwrap().to_string();

    alice_channel.join_conversation(&convo_id);
    bob_channel.join_conversation(&convo_id);
    tokio::time::sleep(Duration::from_millis(100)).await;

    alice_channel.send_message(&bob, "second message");
    let message = wait_for_server_event(&mut bob_rx, |event| {
        matches!(event, ServerEvent::NewMessage(_))
    })
    .await;
    if let ServerEvent::NewMessage(m) = message {
        assert_eq!(m.sender_id, alice);
        assert_eq!(m.content, "second message");
    }

    // Rapid keystrokes: exactly one typing_start, then exactly one
    // typing_stop once the idle window lapses.
    for _ in 0..4 {
        alice_channel.typing(&convo_id);
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    let start = wait_for_server_event(&mut bob_rx, |event| {
        matches!(event, ServerEvent::Typing(_))
    })
    .await;
    if let ServerEvent::Typing(t) = start {
        assert!(t.is_typing);
        assert_eq!(t.username, "Alice");
        assert_eq!(t.conversation_id, convo_id);
    }
    let stop = wait_for_server_event(&mut bob_rx, |event| {
        matches!(event, ServerEvent::Typing(_))
    })
    .await;
    if let ServerEvent::Typing(t) = stop {
        assert!(!t.is_typing);
    }
    assert_no_server_event(&mut bob_rx, Duration::from_millis(500), |event| {
        matches!(event, ServerEvent::Typing(_))
    })
    .await;

    // An explicit stop short-circuits the idle timer
    alice_channel.typing(&convo_id);
    alice_channel.stop_typing(&convo_id);
    let explicit_start = wait_for_server_event(&mut bob_rx, |event| {
        matches!(event, ServerEvent::Typing(_))
    })
    .await;
    if let ServerEvent::Typing(t) = explicit_start {
        assert!(t.is_typing);
    }
    let explicit_stop = wait_for_server_event(&mut bob_rx, |event| {
        matches!(event, ServerEvent::Typing(_))
    })
    .await;
    if let ServerEvent::Typing(t) = explicit_stop {
        assert!(!t.is_typing);
    }

    // Away status propagates like any other presence change
    bob_channel.update_status(PresenceStatus::Away);
    let away = wait_for_server_event(&mut alice_rx, |event| {
        matches!(event, ServerEvent::UserStatus(p) if p.user_id == bob)
    })
    .await;
    if let ServerEvent::UserStatus(p) = away {
        assert_eq!(p.status, PresenceStatus::Away);
    }

    // After leaving the room, Bob still gets the notification but no longer
    // the live message
    bob_channel.leave_conversation(&convo_id);
    tokio::time::sleep(Duration::from_millis(100)).await;
    alice_channel.send_message(&bob, "anyone home?");
    wait_for_server_event(&mut bob_rx, |event| {
        matches!(event, ServerEvent::Notification(_))
    })
    .await;
    assert_no_server_event(&mut bob_rx, Duration::from_millis(300), |event| {
        matches!(event, ServerEvent::NewMessage(_))
    })
    .await;

    // Manual disconnect shows up as presence for the peer
    alice_channel.disconnect();
    let offline = wait_for_server_event(&mut bob_rx, |event| {
        matches!(event, ServerEvent::UserStatus(p) if p.user_id == alice)
    })
    .await;
    if let ServerEvent::UserStatus(p) = offline {
        assert_eq!(p.status, PresenceStatus::Offline);
        assert!(p.last_seen.is_some());
    }

    drop(bob_channel);
}

#[tokio::test]
async fn test_realtime_swap_request_push() {
    let fixture = TestFixture::new().await;

    let alice = fixture.create_profile("Alice", &["A"], &["B"]).await;
    let bob = fixture.create_profile("Bob", &["B"], &["A"]).await;

    let (_bob_channel, mut bob_rx) = Channel::connect(fixture.channel_config(&bob));
    assert!(matches!(next_event(&mut bob_rx).await, ChannelEvent::Connected));

    fixture
        .client
        .post(fixture.url("/api/swap-requests"))
        .json(&json!({
            "requesterId": alice,
            "providerId": bob,
            "offeredSkill": "A",
            "requestedSkill": "B"
        }))
        .send()
        .await
        .unwrap();

    // The notification is pushed first, then the request payload itself.
    wait_for_server_event(&mut bob_rx, |event| {
        matches!(event, ServerEvent::Notification(n) if n.user_id == bob)
    })
    .await;

    let pushed = wait_for_server_event(&mut bob_rx, |event| {
        matches!(event, ServerEvent::SwapRequest(_))
    })
    .await;
    if let ServerEvent::SwapRequest(swap) = pushed {
        assert_eq!(swap.requester_id, alice);
        assert_eq!(swap.provider_id, bob);
    }
}

// ==================== Real-time: channel state machine ====================

#[tokio::test]
async fn test_channel_terminal_failure_after_cap() {
    // Nothing listens on this endpoint; every attempt is a transport failure.
    let mut config = ChannelConfig::new("ws://127.0.0.1:9", test_token(3600), "u1");
    config.reconnect_attempts = 3;
    config.base_delay = Duration::from_millis(50);
    config.max_delay = Duration::from_millis(200);
    config.handshake_timeout = Duration::from_millis(1000);

    let (channel, mut rx) = Channel::connect(config);

    let first = next_event(&mut rx).await;
    assert!(
        matches!(first, ChannelEvent::Reconnecting { attempt: 1, .. }),
        "expected first reconnect, got {:?}",
        first
    );
    let second = next_event(&mut rx).await;
    assert!(matches!(second, ChannelEvent::Reconnecting { attempt: 2, .. }));

    // Third failure exhausts the budget: exactly one terminal callback.
    let terminal = next_event(&mut rx).await;
    assert!(matches!(terminal, ChannelEvent::Failed(_)));
    assert_eq!(channel.state(), ConnectionState::Disconnected);

    // Nothing further: no per-attempt duplicates of the terminal failure.
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_channel_expired_token_short_circuits() {
    let mut config = ChannelConfig::new("ws://127.0.0.1:9", test_token(-60), "u1");
    config.reconnect_attempts = 3;
    config.base_delay = Duration::from_millis(50);

    let (channel, mut rx) = Channel::connect(config);

    // Straight to the re-auth signal without touching the retry budget.
    let first = next_event(&mut rx).await;
    assert!(matches!(first, ChannelEvent::AuthRequired));
    assert_eq!(channel.state(), ConnectionState::Disconnected);

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_channel_server_rejection_is_auth_class() {
    let fixture = TestFixture::new().await;

    // Valid token shape, but the user does not exist: the server refuses the
    // upgrade and the channel must not burn retries on it.
    let mut config = ChannelConfig::new(&fixture.ws_url, test_token(3600), "no-such-user");
    config.reconnect_attempts = 3;
    config.base_delay = Duration::from_millis(50);

    let (_channel, mut rx) = Channel::connect(config);

    let first = next_event(&mut rx).await;
    assert!(
        matches!(first, ChannelEvent::AuthRequired),
        "expected AuthRequired, got {:?}",
        first
    );
}

#[tokio::test]
async fn test_channel_manual_disconnect_is_final() {
    let fixture = TestFixture::new().await;
    let alice = fixture.create_profile("Alice", &[], &[]).await;

    let mut config = fixture.channel_config(&alice);
    config.base_delay = Duration::from_millis(50);
    let (channel, mut rx) = Channel::connect(config);

    assert!(matches!(next_event(&mut rx).await, ChannelEvent::Connected));
    assert_eq!(channel.state(), ConnectionState::Connected);
    assert_eq!(*channel.state_watch().borrow(), ConnectionState::Connected);

    channel.disconnect();
    let next = next_event(&mut rx).await;
    assert!(matches!(next, ChannelEvent::Disconnected));
    assert_eq!(channel.state(), ConnectionState::Disconnected);

    // Manual disconnect is exempt from auto-reconnect.
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_channel_reconnects_after_server_drop() {
    // A throwaway TCP listener that accepts and immediately drops the
    // connection, then a real fixture is not needed: the channel should
    // classify the failed websocket handshake as transport-class and retry.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            if let Ok((socket, _)) = listener.accept().await {
                drop(socket);
            }
        }
    });

    let mut config = ChannelConfig::new(format!("ws://{}", addr), test_token(3600), "u1");
    config.reconnect_attempts = 2;
    config.base_delay = Duration::from_millis(50);
    config.handshake_timeout = Duration::from_millis(500);

    let (_channel, mut rx) = Channel::connect(config);

    assert!(matches!(
        next_event(&mut rx).await,
        ChannelEvent::Reconnecting { attempt: 1, .. }
    ));
    assert!(matches!(next_event(&mut rx).await, ChannelEvent::Failed(_)));
}
