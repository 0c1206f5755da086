use async_trait::async_trait;
use calsync::{
    CalendarReconciler, Database, EventOrigin, RemoteCalendarProvider, RemoteEvent,
    RemoteEventTime, TimeWindow,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use mockall::mock;
use tempfile::TempDir;

mock! {
    pub Provider {}

    #[async_trait]
    impl RemoteCalendarProvider for Provider {
        async fn fetch_events(
            &self,
            calendar_id: &str,
            window: &TimeWindow,
        ) -> anyhow::Result<Vec<RemoteEvent>>;
    }
}

async fn create_test_database() -> (TempDir, Database) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(&dir.path().join("calsync.db")).await.unwrap();
    (dir, db)
}

fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 4, day, hour, 0, 0).unwrap()
}

fn remote(id: &str, title: &str, start: DateTime<Utc>, modified: DateTime<Utc>) -> RemoteEvent {
    RemoteEvent::new(id)
        .with_title(title)
        .with_range(start, start + Duration::hours(1))
        .modified_at(modified)
}

fn provider_returning(events: Vec<RemoteEvent>) -> MockProvider {
    let mut provider = MockProvider::new();
    provider
        .expect_fetch_events()
        .returning(move |_, _| Ok(events.clone()));
    provider
}

async fn run(db: &Database, owner_id: &str, events: Vec<RemoteEvent>) -> calsync::ReconcileResult {
    CalendarReconciler::new(provider_returning(events), db.clone())
        .reconcile(owner_id, None, Some(at(1, 0)), None)
        .await
}

#[tokio::test]
async fn test_full_reconciliation_cycle() {
    let (_dir, db) = create_test_database().await;
    let user = db.add_user("owner@example.com").await.unwrap();

    // 1. First run mirrors both remote events
    let first = run(
        &db,
        &user.id,
        vec![
            remote("e1", "Standup", at(2, 9), at(1, 8)),
            remote("e2", "Retro", at(3, 15), at(1, 8)),
        ],
    )
    .await;
    assert!(first.success);
    assert_eq!((first.created, first.updated, first.deleted), (2, 0, 0));

    // 2. e1 changed remotely, e2 vanished, e3 appeared
    let second = run(
        &db,
        &user.id,
        vec![
            remote("e1", "Standup (moved)", at(2, 10), at(2, 7)),
            remote("e3", "Planning", at(4, 11), at(2, 7)),
        ],
    )
    .await;
    assert!(second.success);
    assert_eq!((second.created, second.updated, second.deleted), (1, 1, 1));

    let live = db.list_events(&user.id).await.unwrap();
    let live: Vec<_> = live.iter().filter(|e| !e.is_deleted()).collect();
    assert_eq!(live.len(), 2);
    let moved = live
        .iter()
        .find(|e| e.external_id.as_deref() == Some("e1"))
        .unwrap();
    assert_eq!(moved.title, "Standup (moved)");
    assert_eq!(moved.start_at, Some(at(2, 10)));
    assert_eq!(moved.updated_at, at(2, 7));

    // 3. Same snapshot again writes nothing
    let third = run(
        &db,
        &user.id,
        vec![
            remote("e1", "Standup (moved)", at(2, 10), at(2, 7)),
            remote("e3", "Planning", at(4, 11), at(2, 7)),
        ],
    )
    .await;
    assert!(third.success);
    assert_eq!(third.total_changes(), 0);
}

#[tokio::test]
async fn test_stale_or_undated_remote_keeps_local_copy() {
    let (_dir, db) = create_test_database().await;
    let user = db.add_user("owner@example.com").await.unwrap();

    run(&db, &user.id, vec![remote("e1", "Original", at(2, 9), at(1, 8))]).await;

    let mut undated = remote("e1", "Undated edit", at(2, 9), at(1, 8));
    undated.last_modified = None;
    let result = run(
        &db,
        &user.id,
        vec![undated],
    )
    .await;
    assert_eq!(result.total_changes(), 0);

    let result = run(&db, &user.id, vec![remote("e1", "Same stamp", at(2, 9), at(1, 8))]).await;
    assert_eq!(result.total_changes(), 0);

    let events = db.list_events(&user.id).await.unwrap();
    assert_eq!(events[0].title, "Original");
}

#[tokio::test]
async fn test_manual_events_are_never_touched() {
    let (_dir, db) = create_test_database().await;
    let user = db.add_user("owner@example.com").await.unwrap();
    let manual = db
        .create_manual_event(&user.id, "Dentist", at(5, 14))
        .await
        .unwrap();

    let result = run(&db, &user.id, vec![]).await;
    assert!(result.success);
    assert_eq!(result.deleted, 0);

    let stored = db.get_event(&manual.id).await.unwrap().unwrap();
    assert_eq!(stored.origin, EventOrigin::Manual);
    assert!(!stored.is_deleted());
}

#[tokio::test]
async fn test_calendars_are_reconciled_independently() {
    let (_dir, db) = create_test_database().await;
    let user = db.add_user("owner@example.com").await.unwrap();

    let reconciler = CalendarReconciler::new(
        provider_returning(vec![remote("w1", "Work sync", at(2, 9), at(1, 8))]),
        db.clone(),
    );
    let work = reconciler
        .reconcile(&user.id, Some("work"), Some(at(1, 0)), None)
        .await;
    assert_eq!(work.created, 1);

    // An empty primary calendar does not delete the work calendar's events.
    let primary = run(&db, &user.id, vec![]).await;
    assert_eq!(primary.deleted, 0);
    assert_eq!(db.sync_status(&user.id).await.unwrap().event_count, 1);
}

#[tokio::test]
async fn test_reappearing_event_gets_a_new_row() {
    let (_dir, db) = create_test_database().await;
    let user = db.add_user("owner@example.com").await.unwrap();

    run(&db, &user.id, vec![remote("e1", "Flaky", at(2, 9), at(1, 8))]).await;
    let gone = run(&db, &user.id, vec![]).await;
    assert_eq!(gone.deleted, 1);

    let back = run(&db, &user.id, vec![remote("e1", "Flaky", at(2, 9), at(1, 8))]).await;
    assert_eq!(back.created, 1);

    let events = db.list_events(&user.id).await.unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events.iter().filter(|e| e.is_deleted()).count(), 1);
}

#[tokio::test]
async fn test_bad_item_is_reported_and_the_rest_applied() {
    let (_dir, db) = create_test_database().await;
    let user = db.add_user("owner@example.com").await.unwrap();

    let mut no_start = RemoteEvent::new("e-bad").with_title("Broken");
    no_start.end = Some(RemoteEventTime::at(at(2, 10)));

    let result = run(
        &db,
        &user.id,
        vec![
            no_start,
            remote("e1", "Fine", at(2, 9), at(1, 8)),
            RemoteEvent::new("e-empty").with_title("Holiday"),
        ],
    )
    .await;

    assert!(result.success);
    assert_eq!(result.created, 1);
    assert_eq!(result.errors.len(), 2);
    assert!(result.errors[0].starts_with("Failed to sync event e-bad:"));
    assert!(result.errors[1].starts_with("Failed to sync event e-empty:"));
}

#[tokio::test]
async fn test_fatal_errors_abort_without_writes() {
    let (_dir, db) = create_test_database().await;
    let user = db.add_user("owner@example.com").await.unwrap();
    run(&db, &user.id, vec![remote("e1", "Keep me", at(2, 9), at(1, 8))]).await;

    let mut failing = MockProvider::new();
    failing
        .expect_fetch_events()
        .returning(|_, _| Err(anyhow::anyhow!("HTTP 500 Internal Server Error")));
    let result = CalendarReconciler::new(failing, db.clone())
        .reconcile(&user.id, None, None, None)
        .await;
    assert!(!result.success);
    assert_eq!(
        result.errors,
        vec!["Failed to fetch remote events: HTTP 500 Internal Server Error".to_string()]
    );
    assert_eq!(db.sync_status(&user.id).await.unwrap().event_count, 1);

    let mut untouched = MockProvider::new();
    untouched.expect_fetch_events().never();
    let unknown = CalendarReconciler::new(untouched, db.clone())
        .reconcile("no-such-owner", None, None, None)
        .await;
    assert!(!unknown.success);
    assert_eq!(unknown.errors, vec!["Unknown owner no-such-owner".to_string()]);
}
