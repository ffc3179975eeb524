use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use studyfocus_lib::db::Database;
use studyfocus_lib::models::{
    NewSession, PauseEntry, SessionFilter, SessionStatus, SessionUpdate,
};
use studyfocus_lib::store::SessionStore;
use tempfile::TempDir;

fn open() -> (TempDir, Database) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::new(dir.path().join("sessions.sqlite3")).unwrap();
    (dir, db)
}

fn draft(minutes_ago: i64, concentration_mode: bool) -> NewSession {
    let base = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
    NewSession {
        started_at: base - ChronoDuration::minutes(minutes_ago),
        concentration_mode,
    }
}

fn update(revision: u64, elapsed_minutes: u64) -> SessionUpdate {
    let at = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();
    SessionUpdate {
        revision,
        status: SessionStatus::Running,
        elapsed_minutes,
        distraction_count: 1,
        distraction_minutes: 0,
        pause_count: 1,
        pause_seconds: 40,
        pause_log: vec![PauseEntry::new("Bathroom break", 40, at)],
        completed_cycles: 0,
        ended_at: None,
        updated_at: at,
    }
}

#[tokio::test]
async fn created_session_round_trips_updates() {
    let (_dir, db) = open();

    let id = db.create_session(&draft(0, true)).await.unwrap();
    let stored = db.get_session(&id).await.unwrap().unwrap();
    assert_eq!(stored.status, SessionStatus::Running);
    assert_eq!(stored.revision, 0);
    assert!(stored.pause_log.is_empty());

    db.update_session(&id, &update(1, 2)).await.unwrap();
    let stored = db.get_session(&id).await.unwrap().unwrap();
    assert_eq!(stored.elapsed_minutes, 2);
    assert_eq!(stored.pause_seconds, 40);
    assert_eq!(stored.pause_log.len(), 1);
    assert_eq!(stored.pause_log[0].reason, "Bathroom break");
    assert_eq!(stored.pause_log[0].duration, 40);
    assert!(stored.concentration_mode);
}

#[tokio::test]
async fn stale_revisions_are_ignored() {
    let (_dir, db) = open();
    let id = db.create_session(&draft(0, true)).await.unwrap();

    assert!(db.apply_session_update(&id, &update(3, 10)).await.unwrap());
    assert!(!db.apply_session_update(&id, &update(2, 7)).await.unwrap());

    let stored = db.get_session(&id).await.unwrap().unwrap();
    assert_eq!(stored.revision, 3);
    assert_eq!(stored.elapsed_minutes, 10);
}

#[tokio::test]
async fn repeating_an_update_is_idempotent() {
    let (_dir, db) = open();
    let id = db.create_session(&draft(0, false)).await.unwrap();

    db.update_session(&id, &update(1, 4)).await.unwrap();
    let once = db.get_session(&id).await.unwrap().unwrap();
    db.update_session(&id, &update(1, 4)).await.unwrap();
    let twice = db.get_session(&id).await.unwrap().unwrap();

    assert_eq!(once, twice);
}

#[tokio::test]
async fn final_update_keeps_end_time() {
    let (_dir, db) = open();
    let id = db.create_session(&draft(0, true)).await.unwrap();

    let ended_at = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
    let mut last = update(2, 60);
    last.status = SessionStatus::Completed;
    last.ended_at = Some(ended_at);
    db.update_session(&id, &last).await.unwrap();

    let stored = db.get_session(&id).await.unwrap().unwrap();
    assert_eq!(stored.status, SessionStatus::Completed);
    assert_eq!(stored.ended_at, Some(ended_at));
}

#[tokio::test]
async fn listing_filters_by_mode_newest_first() {
    let (_dir, db) = open();
    let oldest = db.create_session(&draft(120, true)).await.unwrap();
    let pomodoro = db.create_session(&draft(60, false)).await.unwrap();
    let newest = db.create_session(&draft(10, true)).await.unwrap();

    let all = db.list_sessions(&SessionFilter::default()).await.unwrap();
    let ids: Vec<&str> = all.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec![newest.as_str(), pomodoro.as_str(), oldest.as_str()]);

    let concentration = db
        .list_sessions(&SessionFilter::concentration())
        .await
        .unwrap();
    assert_eq!(concentration.len(), 2);
    assert!(concentration.iter().all(|s| s.concentration_mode));

    let limited = db
        .list_sessions(&SessionFilter {
            concentration_mode: Some(true),
            limit: Some(1),
        })
        .await
        .unwrap();
    assert_eq!(limited.len(), 1);
    assert_eq!(limited[0].id, newest);

    let pomodoro_only = db
        .list_sessions(&SessionFilter {
            concentration_mode: Some(false),
            limit: None,
        })
        .await
        .unwrap();
    assert_eq!(pomodoro_only.len(), 1);
    assert_eq!(pomodoro_only[0].id, pomodoro);
}

#[tokio::test]
async fn open_sessions_are_marked_interrupted() {
    let (_dir, db) = open();
    let running = db.create_session(&draft(30, true)).await.unwrap();
    let paused = db.create_session(&draft(20, true)).await.unwrap();
    let finished = db.create_session(&draft(10, true)).await.unwrap();

    let mut pause = update(1, 5);
    pause.status = SessionStatus::Paused;
    db.update_session(&paused, &pause).await.unwrap();

    let mut done = update(1, 5);
    done.status = SessionStatus::Completed;
    done.ended_at = Some(Utc::now());
    db.update_session(&finished, &done).await.unwrap();

    let changed = db.mark_open_sessions_interrupted(Utc::now()).await.unwrap();
    assert_eq!(changed, 2);

    for id in [&running, &paused] {
        let stored = db.get_session(id).await.unwrap().unwrap();
        assert_eq!(stored.status, SessionStatus::Interrupted);
        assert!(stored.ended_at.is_some());
    }
    let stored = db.get_session(&finished).await.unwrap().unwrap();
    assert_eq!(stored.status, SessionStatus::Completed);
}

#[tokio::test]
async fn updating_an_unknown_session_fails() {
    let (_dir, db) = open();
    let err = db
        .update_session("missing", &update(1, 1))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("unknown session"));
}

#[tokio::test]
async fn sessions_survive_reopening() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sessions.sqlite3");

    let id = {
        let db = Database::new(path.clone()).unwrap();
        let id = db.create_session(&draft(0, true)).await.unwrap();
        db.update_session(&id, &update(1, 3)).await.unwrap();
        id
    };

    let db = Database::new(path).unwrap();
    let stored = db.get_session(&id).await.unwrap().unwrap();
    assert_eq!(stored.elapsed_minutes, 3);
}
