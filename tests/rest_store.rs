use std::time::Duration;

use chrono::{TimeZone, Utc};
use serde_json::json;
use studyfocus_lib::models::{
    NewSession, PauseEntry, SessionFilter, SessionStatus, SessionUpdate,
};
use studyfocus_lib::store::{RestSessionStore, SessionStore};
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn store(server: &MockServer, token: Option<&str>) -> RestSessionStore {
    RestSessionStore::new(
        &server.uri(),
        token.map(str::to_string),
        Duration::from_secs(5),
    )
    .unwrap()
}

fn record(id: &str, started_at: &str, concentration_mode: bool) -> serde_json::Value {
    json!({
        "id": id,
        "startedAt": started_at,
        "status": "completed",
        "concentrationMode": concentration_mode,
        "elapsedMinutes": 25,
        "pauseLog": [
            {"reason": "Bathroom break", "duration": 40, "timestamp": started_at}
        ],
        "updatedAt": started_at,
    })
}

#[tokio::test]
async fn create_posts_draft_and_returns_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/focus-sessions"))
        .and(header("authorization", "Bearer secret"))
        .and(body_partial_json(json!({"concentrationMode": true})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "abc123"})))
        .expect(1)
        .mount(&server)
        .await;

    let draft = NewSession {
        started_at: Utc::now(),
        concentration_mode: true,
    };
    let id = store(&server, Some("secret"))
        .create_session(&draft)
        .await
        .unwrap();
    assert_eq!(id, "abc123");
}

#[tokio::test]
async fn update_patches_session_in_wire_units() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/api/focus-sessions/abc123"))
        .and(body_partial_json(json!({
            "revision": 4,
            "elapsedMinutes": 2,
            "pauseSeconds": 40,
            "pauseLog": [{"reason": "Bathroom break", "duration": 40}],
        })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let at = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
    let update = SessionUpdate {
        revision: 4,
        status: SessionStatus::Running,
        elapsed_minutes: 2,
        distraction_count: 0,
        distraction_minutes: 0,
        pause_count: 1,
        pause_seconds: 40,
        pause_log: vec![PauseEntry::new("Bathroom break", 40, at)],
        completed_cycles: 0,
        ended_at: None,
        updated_at: at,
    };
    store(&server, None)
        .update_session("abc123", &update)
        .await
        .unwrap();
}

#[tokio::test]
async fn list_passes_filter_and_sorts_newest_first() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/focus-sessions"))
        .and(query_param("concentrationMode", "true"))
        .and(query_param("limit", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            record("older", "2024-03-01T08:00:00Z", true),
            record("newer", "2024-03-02T08:00:00Z", true),
            record("pomodoro", "2024-03-03T08:00:00Z", false),
        ])))
        .mount(&server)
        .await;

    let sessions = store(&server, None)
        .list_sessions(&SessionFilter {
            concentration_mode: Some(true),
            limit: Some(2),
        })
        .await
        .unwrap();

    let ids: Vec<&str> = sessions.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["newer", "older"]);
    assert_eq!(sessions[0].status, SessionStatus::Completed);
    assert_eq!(sessions[0].pause_log[0].duration, 40);
}

#[tokio::test]
async fn server_errors_surface_with_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/focus-sessions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let draft = NewSession {
        started_at: Utc::now(),
        concentration_mode: false,
    };
    let err = store(&server, None)
        .create_session(&draft)
        .await
        .unwrap_err();
    let message = format!("{err:#}");
    assert!(message.contains("503"));
    assert!(message.contains("maintenance"));
}

#[tokio::test]
async fn trailing_slash_in_base_url_is_ignored() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/api/focus-sessions/s1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let store = RestSessionStore::new(
        &format!("{}/", server.uri()),
        None,
        Duration::from_secs(5),
    )
    .unwrap();
    let update = SessionUpdate {
        revision: 1,
        status: SessionStatus::Completed,
        elapsed_minutes: 0,
        distraction_count: 0,
        distraction_minutes: 0,
        pause_count: 0,
        pause_seconds: 0,
        pause_log: Vec::new(),
        completed_cycles: 0,
        ended_at: Some(Utc::now()),
        updated_at: Utc::now(),
    };
    store.update_session("s1", &update).await.unwrap();
}

fn empty_update() -> SessionUpdate {
    SessionUpdate {
        revision: 1,
        status: SessionStatus::Running,
        elapsed_minutes: 0,
        distraction_count: 0,
        distraction_minutes: 0,
        pause_count: 0,
        pause_seconds: 0,
        pause_log: Vec::new(),
        completed_cycles: 0,
        ended_at: None,
        updated_at: Utc::now(),
    }
}

#[tokio::test]
async fn session_id_is_sent_as_one_escaped_segment() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/api/focus-sessions/2024%2F03%20%231%3Fdraft"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    store(&server, None)
        .update_session("2024/03 #1?draft", &empty_update())
        .await
        .unwrap();
}

#[tokio::test]
async fn base_url_path_prefix_is_kept() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/v1/api/focus-sessions/s2"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let store = RestSessionStore::new(
        &format!("{}/v1/", server.uri()),
        None,
        Duration::from_secs(5),
    )
    .unwrap();
    store.update_session("s2", &empty_update()).await.unwrap();
}

#[test]
fn rejects_unusable_base_urls() {
    let timeout = Duration::from_secs(5);
    assert!(RestSessionStore::new("not a url", None, timeout).is_err());
    assert!(RestSessionStore::new("mailto:study@example.com", None, timeout).is_err());
}
