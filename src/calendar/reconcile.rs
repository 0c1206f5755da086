//! Remote-to-local calendar reconciliation.
//!
//! One run fetches the remote event list for a window, diffs it against the
//! live local events synchronized from the same calendar (keyed by external
//! id) and writes creates, updates and soft-deletes one item at a time.
//! Per-item failures are collected in the result; only failing to obtain
//! the inputs aborts a run.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};

use super::locks::SyncLocks;
use super::{convert, EventStore, RemoteCalendarProvider};
use crate::models::{LocalEvent, ReconcileResult, RemoteEvent, TimeWindow, PRIMARY_CALENDAR_ID};
use crate::utils::logging;

/// Days looked back when the caller gives no window start.
pub const DEFAULT_LOOKBACK_DAYS: i64 = 90;

enum Applied {
    Created,
    Updated,
    Unchanged,
}

pub struct CalendarReconciler<P, S> {
    provider: P,
    store: S,
    lookback_days: i64,
    locks: Arc<SyncLocks>,
}

impl<P, S> CalendarReconciler<P, S>
where
    P: RemoteCalendarProvider,
    S: EventStore,
{
    pub fn new(provider: P, store: S) -> Self {
        Self {
            provider,
            store,
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            locks: Arc::new(SyncLocks::new()),
        }
    }

    pub fn with_lookback_days(mut self, days: i64) -> Self {
        self.lookback_days = days;
        self
    }

    /// Share a lock registry with other reconcilers so runs for the same
    /// pair are serialized across them.
    pub fn with_locks(mut self, locks: Arc<SyncLocks>) -> Self {
        self.locks = locks;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Converge the owner's local mirror of `calendar_id` (default
    /// `"primary"`) with the remote calendar. `time_min` defaults to the
    /// configured look-back before now; `time_max` is open when absent.
    pub async fn reconcile(
        &self,
        owner_id: &str,
        calendar_id: Option<&str>,
        time_min: Option<DateTime<Utc>>,
        time_max: Option<DateTime<Utc>>,
    ) -> ReconcileResult {
        let calendar_id = calendar_id.unwrap_or(PRIMARY_CALENDAR_ID);

        if owner_id.trim().is_empty() {
            return ReconcileResult::aborted("Owner id is required".to_string());
        }

        let lock = self.locks.lock_for(owner_id, calendar_id).await;
        let result = {
            let _guard = lock.lock().await;
            self.reconcile_locked(owner_id, calendar_id, time_min, time_max)
                .await
        };
        drop(lock);
        self.locks.release(owner_id, calendar_id).await;
        result
    }

    async fn reconcile_locked(
        &self,
        owner_id: &str,
        calendar_id: &str,
        time_min: Option<DateTime<Utc>>,
        time_max: Option<DateTime<Utc>>,
    ) -> ReconcileResult {
        let started = Instant::now();

        let window = match time_min {
            Some(start) => TimeWindow::new(start, time_max),
            None => match TimeWindow::looking_back(Utc::now(), self.lookback_days) {
                Some(window) => TimeWindow {
                    end: time_max,
                    ..window
                },
                None => {
                    return ReconcileResult::aborted(format!(
                        "Look-back of {} days is out of range",
                        self.lookback_days
                    ))
                }
            },
        };

        match self.store.owner_exists(owner_id).await {
            Ok(true) => {}
            Ok(false) => return ReconcileResult::aborted(format!("Unknown owner {}", owner_id)),
            Err(e) => {
                return ReconcileResult::aborted(format!("Failed to look up owner {}: {}", owner_id, e))
            }
        }

        let remote_events = match self.provider.fetch_events(calendar_id, &window).await {
            Ok(events) => events,
            Err(e) => {
                logging::log_error_with_context(
                    &e,
                    &format!("fetch owner {} calendar {}", owner_id, calendar_id),
                );
                return ReconcileResult::aborted(format!("Failed to fetch remote events: {}", e));
            }
        };
        info!(
            "Fetched {} remote events for owner {} calendar {}",
            remote_events.len(),
            owner_id,
            calendar_id
        );

        let existing = match self.store.find_synced_events(owner_id, calendar_id).await {
            Ok(events) => events,
            Err(e) => {
                error!("Loading local events failed for owner {}: {}", owner_id, e);
                return ReconcileResult::aborted(format!("Failed to load local events: {}", e));
            }
        };

        let result = self
            .apply(owner_id, calendar_id, &remote_events, &existing)
            .await;

        logging::log_reconcile_summary(
            owner_id,
            calendar_id,
            &result,
            started.elapsed().as_millis() as u64,
        );
        result
    }

    async fn apply(
        &self,
        owner_id: &str,
        calendar_id: &str,
        remote_events: &[RemoteEvent],
        existing: &[LocalEvent],
    ) -> ReconcileResult {
        let mut result = ReconcileResult::started();
        let by_external_id: HashMap<&str, &LocalEvent> = existing
            .iter()
            .filter_map(|event| event.external_id.as_deref().map(|id| (id, event)))
            .collect();
        let mut seen: HashSet<&str> = HashSet::new();

        for remote in remote_events {
            let Some(external_id) = remote.external_id.as_deref() else {
                debug!("Skipping remote event without an id");
                continue;
            };
            if !seen.insert(external_id) {
                debug!("Skipping duplicate remote event {}", external_id);
                continue;
            }

            let local = by_external_id.get(external_id).copied();
            match self.apply_one(remote, local, owner_id, calendar_id).await {
                Ok(Applied::Created) => result.created += 1,
                Ok(Applied::Updated) => result.updated += 1,
                Ok(Applied::Unchanged) => {}
                Err(e) => {
                    warn!("Failed to sync event {}: {}", external_id, e);
                    result
                        .errors
                        .push(format!("Failed to sync event {}: {}", external_id, e));
                }
            }
        }

        for event in existing {
            let vanished = event
                .external_id
                .as_deref()
                .is_some_and(|id| !seen.contains(id));
            if !vanished {
                continue;
            }

            match self.store.soft_delete_event(&event.id, Utc::now()).await {
                Ok(()) => result.deleted += 1,
                Err(e) => {
                    warn!("Failed to mark event as deleted {}: {}", event.id, e);
                    result
                        .errors
                        .push(format!("Failed to mark event as deleted {}: {}", event.id, e));
                }
            }
        }

        result
    }

    async fn apply_one(
        &self,
        remote: &RemoteEvent,
        local: Option<&LocalEvent>,
        owner_id: &str,
        calendar_id: &str,
    ) -> Result<Applied> {
        let converted = convert::to_local_event(remote, owner_id, calendar_id, Utc::now())?;

        let Some(local) = local else {
            self.store.insert_event(&converted).await?;
            return Ok(Applied::Created);
        };

        if !remote_is_newer(remote.last_modified, local.updated_at) {
            return Ok(Applied::Unchanged);
        }

        self.store
            .update_synced_fields(&local.id, &converted.synced_fields())
            .await?;
        Ok(Applied::Updated)
    }
}

/// Ties and a missing remote timestamp keep the local copy.
fn remote_is_newer(remote: Option<DateTime<Utc>>, local: DateTime<Utc>) -> bool {
    matches!(remote, Some(remote) if remote > local)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::MockRemoteCalendarProvider;
    use crate::models::{RemoteEventTime, SyncedFields};
    use anyhow::anyhow;
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone};
    use std::sync::Mutex;

    /// In-memory store with switchable write failures.
    #[derive(Default)]
    struct MemoryStore {
        events: Mutex<Vec<LocalEvent>>,
        writes: Mutex<usize>,
        fail_insert_for: Option<String>,
        fail_delete_for: Option<String>,
    }

    impl MemoryStore {
        fn with_events(events: Vec<LocalEvent>) -> Self {
            Self {
                events: Mutex::new(events),
                ..Self::default()
            }
        }

        fn live(&self) -> Vec<LocalEvent> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .filter(|e| e.deleted_at.is_none())
                .cloned()
                .collect()
        }

        fn find(&self, external_id: &str) -> Option<LocalEvent> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .find(|e| e.external_id.as_deref() == Some(external_id))
                .cloned()
        }

        fn writes(&self) -> usize {
            *self.writes.lock().unwrap()
        }
    }

    #[async_trait]
    impl EventStore for MemoryStore {
        async fn owner_exists(&self, owner_id: &str) -> Result<bool> {
            Ok(owner_id == OWNER)
        }

        async fn find_synced_events(
            &self,
            owner_id: &str,
            calendar_id: &str,
        ) -> Result<Vec<LocalEvent>> {
            Ok(self
                .live()
                .into_iter()
                .filter(|e| e.owner_id == owner_id && e.calendar_id.as_deref() == Some(calendar_id))
                .collect())
        }

        async fn insert_event(&self, event: &LocalEvent) -> Result<()> {
            if self.fail_insert_for.is_some() && self.fail_insert_for == event.external_id {
                return Err(anyhow!("disk full"));
            }
            *self.writes.lock().unwrap() += 1;
            self.events.lock().unwrap().push(event.clone());
            Ok(())
        }

        async fn update_synced_fields(&self, event_id: &str, fields: &SyncedFields) -> Result<()> {
            *self.writes.lock().unwrap() += 1;
            let mut events = self.events.lock().unwrap();
            let event = events
                .iter_mut()
                .find(|e| e.id == event_id)
                .ok_or_else(|| anyhow!("Event {} not found", event_id))?;
            event.title = fields.title.clone();
            event.description = fields.description.clone();
            event.primary_at = fields.primary_at;
            event.start_at = fields.start_at;
            event.end_at = fields.end_at;
            event.updated_at = fields.updated_at;
            event.last_synced_at = Some(fields.last_synced_at);
            event.sync_error = None;
            Ok(())
        }

        async fn soft_delete_event(&self, event_id: &str, at: DateTime<Utc>) -> Result<()> {
            if self.fail_delete_for.as_deref() == Some(event_id) {
                return Err(anyhow!("locked"));
            }
            *self.writes.lock().unwrap() += 1;
            let mut events = self.events.lock().unwrap();
            let event = events
                .iter_mut()
                .find(|e| e.id == event_id)
                .ok_or_else(|| anyhow!("Event {} not found", event_id))?;
            event.deleted_at = Some(at);
            Ok(())
        }
    }

    const OWNER: &str = "user-1";

    fn t(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, hour, 0, 0).unwrap()
    }

    fn remote(id: &str, title: &str) -> RemoteEvent {
        RemoteEvent::new(id).with_title(title).with_range(t(9), t(10))
    }

    fn synced(id: &str, title: &str, updated_at: DateTime<Utc>) -> LocalEvent {
        let mut event =
            convert::to_local_event(&remote(id, title), OWNER, PRIMARY_CALENDAR_ID, updated_at)
                .unwrap();
        event.updated_at = updated_at;
        event
    }

    fn provider_returning(events: Vec<RemoteEvent>) -> MockRemoteCalendarProvider {
        let mut provider = MockRemoteCalendarProvider::new();
        provider
            .expect_fetch_events()
            .returning(move |_, _| Ok(events.clone()));
        provider
    }

    #[tokio::test]
    async fn test_creates_new_event() {
        let reconciler = CalendarReconciler::new(
            provider_returning(vec![remote("e1", "Standup")]),
            MemoryStore::default(),
        );

        let result = reconciler.reconcile(OWNER, None, None, None).await;

        assert_eq!(
            result,
            ReconcileResult {
                success: true,
                created: 1,
                updated: 0,
                deleted: 0,
                errors: vec![],
            }
        );
        let stored = reconciler.store().find("e1").unwrap();
        assert_eq!(stored.title, "Standup");
        assert_eq!(stored.calendar_id.as_deref(), Some(PRIMARY_CALENDAR_ID));
        assert!(stored.last_synced_at.is_some());
    }

    #[tokio::test]
    async fn test_second_run_is_idempotent() {
        let events = vec![
            remote("e1", "Standup").modified_at(t(8)),
            remote("e2", "Lunch"),
        ];
        let reconciler =
            CalendarReconciler::new(provider_returning(events), MemoryStore::default());

        let first = reconciler.reconcile(OWNER, None, None, None).await;
        assert_eq!(first.created, 2);
        let writes = reconciler.store().writes();

        let second = reconciler.reconcile(OWNER, None, None, None).await;
        assert!(second.success);
        assert_eq!(second.created, 0);
        assert_eq!(second.updated, 0);
        assert_eq!(second.deleted, 0);
        assert_eq!(reconciler.store().writes(), writes);
    }

    #[tokio::test]
    async fn test_newer_remote_updates_local() {
        let store = MemoryStore::with_events(vec![synced("e1", "Standup", t(8))]);
        let changed = remote("e1", "Daily standup").modified_at(t(8) + Duration::seconds(1));
        let reconciler = CalendarReconciler::new(provider_returning(vec![changed]), store);

        let result = reconciler.reconcile(OWNER, None, None, None).await;

        assert_eq!(result.updated, 1);
        assert_eq!(result.created, 0);
        let stored = reconciler.store().find("e1").unwrap();
        assert_eq!(stored.title, "Daily standup");
        assert_eq!(stored.updated_at, t(8) + Duration::seconds(1));
    }

    #[tokio::test]
    async fn test_stale_or_tied_remote_is_ignored() {
        let store = MemoryStore::with_events(vec![
            synced("stale", "Original", t(8)),
            synced("tied", "Original", t(8)),
            synced("untimed", "Original", t(8)),
        ]);
        let events = vec![
            remote("stale", "Changed").modified_at(t(8) - Duration::seconds(1)),
            remote("tied", "Changed").modified_at(t(8)),
            remote("untimed", "Changed"),
        ];
        let reconciler = CalendarReconciler::new(provider_returning(events), store);

        let result = reconciler.reconcile(OWNER, None, None, None).await;

        assert_eq!(result.updated, 0);
        assert!(result.errors.is_empty());
        for id in ["stale", "tied", "untimed"] {
            assert_eq!(reconciler.store().find(id).unwrap().title, "Original");
        }
    }

    #[tokio::test]
    async fn test_vanished_event_is_soft_deleted() {
        let store = MemoryStore::with_events(vec![
            synced("e1", "Kept", t(8)),
            synced("e2", "Gone", t(8)),
        ]);
        let reconciler =
            CalendarReconciler::new(provider_returning(vec![remote("e1", "Kept")]), store);

        let result = reconciler.reconcile(OWNER, None, None, None).await;

        assert_eq!(result.deleted, 1);
        assert!(reconciler.store().find("e2").unwrap().deleted_at.is_some());
        assert!(reconciler.store().find("e1").unwrap().deleted_at.is_none());
    }

    #[tokio::test]
    async fn test_fetch_failure_aborts_without_writes() {
        let mut provider = MockRemoteCalendarProvider::new();
        provider
            .expect_fetch_events()
            .returning(|_, _| Err(anyhow!("HTTP 401 Unauthorized")));
        let store = MemoryStore::with_events(vec![synced("e1", "Standup", t(8))]);
        let reconciler = CalendarReconciler::new(provider, store);

        let result = reconciler.reconcile(OWNER, None, None, None).await;

        assert!(!result.success);
        assert_eq!(result.total_changes(), 0);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("401"));
        assert_eq!(reconciler.store().writes(), 0);
        assert!(reconciler.store().find("e1").unwrap().deleted_at.is_none());
    }

    #[tokio::test]
    async fn test_conversion_failure_is_isolated() {
        let broken = RemoteEvent::new("e2").with_title("No start");
        let reconciler = CalendarReconciler::new(
            provider_returning(vec![remote("e1", "Standup"), broken]),
            MemoryStore::default(),
        );

        let result = reconciler.reconcile(OWNER, None, None, None).await;

        assert!(result.success);
        assert_eq!(result.created, 1);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].starts_with("Failed to sync event e2:"));
        assert!(reconciler.store().find("e1").is_some());
        assert!(reconciler.store().find("e2").is_none());
    }

    #[tokio::test]
    async fn test_write_failures_are_recorded() {
        let gone = synced("gone", "Gone", t(8));
        let gone_id = gone.id.clone();
        let store = MemoryStore {
            fail_insert_for: Some("new".to_string()),
            fail_delete_for: Some(gone_id.clone()),
            ..MemoryStore::with_events(vec![gone])
        };
        let reconciler =
            CalendarReconciler::new(provider_returning(vec![remote("new", "New")]), store);

        let result = reconciler.reconcile(OWNER, None, None, None).await;

        assert!(result.success);
        assert_eq!(result.created, 0);
        assert_eq!(result.deleted, 0);
        assert_eq!(
            result.errors,
            vec![
                "Failed to sync event new: disk full".to_string(),
                format!("Failed to mark event as deleted {}: locked", gone_id),
            ]
        );
    }

    #[tokio::test]
    async fn test_events_without_id_are_skipped() {
        let anonymous = RemoteEvent {
            start: Some(RemoteEventTime::at(t(9))),
            ..RemoteEvent::default()
        };
        let reconciler =
            CalendarReconciler::new(provider_returning(vec![anonymous]), MemoryStore::default());

        let result = reconciler.reconcile(OWNER, None, None, None).await;

        assert!(result.success);
        assert_eq!(result.total_changes(), 0);
        assert!(result.errors.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_owner_aborts() {
        let mut provider = MockRemoteCalendarProvider::new();
        provider.expect_fetch_events().never();
        let reconciler = CalendarReconciler::new(provider, MemoryStore::default());

        let result = reconciler.reconcile("someone-else", None, None, None).await;

        assert!(!result.success);
        assert_eq!(result.errors, vec!["Unknown owner someone-else".to_string()]);
    }

    #[tokio::test]
    async fn test_default_window_and_calendar() {
        let mut provider = MockRemoteCalendarProvider::new();
        provider
            .expect_fetch_events()
            .withf(|calendar_id, window| {
                let lookback = Utc::now() - window.start;
                calendar_id == PRIMARY_CALENDAR_ID
                    && window.end.is_none()
                    && lookback >= Duration::days(DEFAULT_LOOKBACK_DAYS)
                    && lookback < Duration::days(DEFAULT_LOOKBACK_DAYS) + Duration::minutes(1)
            })
            .times(1)
            .returning(|_, _| Ok(vec![]));
        let reconciler = CalendarReconciler::new(provider, MemoryStore::default());

        let result = reconciler.reconcile(OWNER, None, None, None).await;
        assert!(result.success);
    }

    #[tokio::test]
    async fn test_explicit_window_is_forwarded() {
        let mut provider = MockRemoteCalendarProvider::new();
        provider
            .expect_fetch_events()
            .withf(|calendar_id, window| {
                calendar_id == "work" && window.start == t(0) && window.end == Some(t(23))
            })
            .times(1)
            .returning(|_, _| Ok(vec![]));
        let reconciler = CalendarReconciler::new(provider, MemoryStore::default());

        let result = reconciler
            .reconcile(OWNER, Some("work"), Some(t(0)), Some(t(23)))
            .await;
        assert!(result.success);
    }

    #[tokio::test]
    async fn test_out_of_range_lookback_aborts_before_fetch() {
        let mut provider = MockRemoteCalendarProvider::new();
        provider.expect_fetch_events().never();
        let reconciler =
            CalendarReconciler::new(provider, MemoryStore::default()).with_lookback_days(100_000_000);

        let result = reconciler.reconcile(OWNER, None, None, None).await;
        assert!(!result.success);
        assert_eq!(
            result.errors,
            vec!["Look-back of 100000000 days is out of range".to_string()]
        );
        assert_eq!(reconciler.store().writes(), 0);
    }

    #[tokio::test]
    async fn test_shared_locks_are_released_after_run() {
        let locks = Arc::new(SyncLocks::new());
        let reconciler = CalendarReconciler::new(
            provider_returning(vec![remote("e1", "Standup")]),
            MemoryStore::default(),
        )
        .with_locks(locks.clone());

        assert!(reconciler.reconcile(OWNER, None, None, None).await.success);
        assert!(!reconciler.reconcile("ghost", None, None, None).await.success);
        assert_eq!(locks.tracked().await, 0);
    }

    #[test]
    fn test_remote_is_newer() {
        assert!(remote_is_newer(Some(t(9)), t(8)));
        assert!(!remote_is_newer(Some(t(8)), t(8)));
        assert!(!remote_is_newer(Some(t(7)), t(8)));
        assert!(!remote_is_newer(None, t(8)));
    }
}
