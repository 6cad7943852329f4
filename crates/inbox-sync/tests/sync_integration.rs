//! Integration tests for the notification synchronization engine.
//!
//! These drive the store, feed runner, and auto-acknowledge timer through
//! an in-memory backend and feed provider, verifying the consistency and
//! rollback guarantees end to end.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::sync::broadcast::error::TryRecvError;

use inbox_sync::{
    AckTimerState, ChangeEvent, CommitOp, Error, FeedProvider, FeedSignal, FeedSubscription,
    InboxBackend, Notification, NotificationStore, NotificationSyncService, Result, StoreEvent,
    SyncConfig,
};

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

fn notif(id: &str, secs: i64, viewed: bool) -> Notification {
    let mut n = Notification::new("parent-1", format!("title-{id}"), "message")
        .with_created_at(at(secs))
        .with_viewed(viewed);
    n.id = id.to_string();
    n
}

/// In-memory backend with per-operation failure injection and an optional
/// gate that holds commits open until the test releases them.
#[derive(Default)]
struct TestBackend {
    fetch_result: Mutex<Vec<Notification>>,
    fail_fetch: AtomicBool,
    fail_mark_read: AtomicBool,
    fail_mark_all: AtomicBool,
    fail_delete: AtomicBool,
    gate_commits: AtomicBool,
    gate: Notify,
    fetch_calls: AtomicUsize,
    mark_read_calls: AtomicUsize,
    mark_all_calls: AtomicUsize,
    delete_calls: AtomicUsize,
}

impl TestBackend {
    fn with_notifications(initial: Vec<Notification>) -> Arc<Self> {
        let backend = Self::default();
        *backend.fetch_result.lock() = initial;
        Arc::new(backend)
    }

    fn set_notifications(&self, set: Vec<Notification>) {
        *self.fetch_result.lock() = set;
    }

    async fn pass_gate(&self) {
        if self.gate_commits.load(Ordering::SeqCst) {
            self.gate.notified().await;
        }
    }

    fn release_gate(&self) {
        self.gate.notify_one();
    }
}

#[async_trait]
impl InboxBackend for TestBackend {
    async fn fetch_all(&self, _receiver_id: &str) -> Result<Vec<Notification>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(Error::fetch("backend unavailable"));
        }
        Ok(self.fetch_result.lock().clone())
    }

    async fn commit_mark_read(&self, _id: &str) -> Result<()> {
        self.mark_read_calls.fetch_add(1, Ordering::SeqCst);
        self.pass_gate().await;
        if self.fail_mark_read.load(Ordering::SeqCst) {
            return Err(Error::commit(CommitOp::MarkRead, "write rejected"));
        }
        Ok(())
    }

    async fn commit_mark_all_read(&self, _receiver_id: &str) -> Result<()> {
        self.mark_all_calls.fetch_add(1, Ordering::SeqCst);
        self.pass_gate().await;
        if self.fail_mark_all.load(Ordering::SeqCst) {
            return Err(Error::commit(CommitOp::MarkAllRead, "write rejected"));
        }
        Ok(())
    }

    async fn commit_delete(&self, _id: &str) -> Result<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        self.pass_gate().await;
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(Error::commit(CommitOp::Delete, "write rejected"));
        }
        Ok(())
    }
}

/// Feed provider double that hands out subscriptions backed by in-memory
/// channels and lets tests push signals into the latest one.
#[derive(Default)]
struct TestFeedProvider {
    senders: Mutex<Vec<tokio::sync::mpsc::Sender<FeedSignal>>>,
    fail_subscribe: AtomicBool,
    subscribe_calls: AtomicUsize,
}

impl TestFeedProvider {
    async fn push(&self, signal: FeedSignal) {
        let sender = self
            .senders
            .lock()
            .last()
            .cloned()
            .expect("no active subscription");
        sender.send(signal).await.expect("subscription dropped");
    }
}

#[async_trait]
impl FeedProvider for TestFeedProvider {
    async fn subscribe(&self, _receiver_id: &str) -> Result<FeedSubscription> {
        self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_subscribe.load(Ordering::SeqCst) {
            return Err(Error::disconnect("subscribe refused"));
        }
        let (tx, subscription) = FeedSubscription::channel(64);
        self.senders.lock().push(tx);
        Ok(subscription)
    }
}

fn loaded_store(initial: Vec<Notification>) -> (Arc<NotificationStore>, Arc<TestBackend>) {
    let backend = TestBackend::with_notifications(Vec::new());
    let store = Arc::new(NotificationStore::new(backend.clone()));
    store.load("parent-1", initial);
    (store, backend)
}

/// Drain and count currently-buffered store events.
fn drain(events: &mut tokio::sync::broadcast::Receiver<StoreEvent>) -> Vec<StoreEvent> {
    let mut out = Vec::new();
    loop {
        match events.try_recv() {
            Ok(event) => out.push(event),
            Err(TryRecvError::Empty) => return out,
            Err(other) => panic!("unexpected receive error: {other:?}"),
        }
    }
}

mod store_tests {
    use super::*;

    #[tokio::test]
    async fn scenario_a_mark_all_read_commit_success() {
        let (store, backend) = loaded_store(vec![
            notif("a", 100, false),
            notif("b", 200, false),
            notif("c", 300, true),
        ]);

        let flipped = store.mark_all_read().await.unwrap();

        assert_eq!(flipped, 2);
        assert_eq!(store.unread().current(), 0);
        assert!(store.snapshot().iter().all(|n| n.viewed));
        assert_eq!(backend.mark_all_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn scenario_b_remote_update_notifies_exactly_once() {
        let (store, _backend) = loaded_store(vec![notif("x", 100, false)]);
        let mut events = store.subscribe();

        store.apply_remote_event(ChangeEvent::update(notif("x", 100, true)));

        assert_eq!(store.unread().current(), 0);
        let received = drain(&mut events);
        assert_eq!(received.len(), 1);
        assert!(matches!(received[0], StoreEvent::RemoteChanged { .. }));
    }

    #[tokio::test]
    async fn scenario_c_remove_rollback_restores_position() {
        let (store, backend) = loaded_store(vec![
            notif("a", 300, true),
            notif("b", 200, false),
            notif("c", 100, true),
        ]);
        backend.fail_delete.store(true, Ordering::SeqCst);

        let err = store.remove("b").await.unwrap_err();

        assert!(matches!(
            err,
            Error::CommitFailure {
                op: CommitOp::Delete,
                ..
            }
        ));
        let ids: Vec<String> = store.snapshot().into_iter().map(|n| n.id).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(store.unread().current(), 1);
    }

    #[tokio::test]
    async fn rollback_law_mark_read_failure_restores_state() {
        let (store, backend) = loaded_store(vec![notif("a", 100, false), notif("b", 200, true)]);
        backend.fail_mark_read.store(true, Ordering::SeqCst);
        let mut events = store.subscribe();

        let err = store.mark_read("a").await.unwrap_err();

        assert!(matches!(
            err,
            Error::CommitFailure {
                op: CommitOp::MarkRead,
                ..
            }
        ));
        assert!(!store.get("a").unwrap().viewed);
        assert_eq!(store.unread().current(), 1);

        let received = drain(&mut events);
        assert_eq!(received.len(), 2);
        assert!(matches!(received[0], StoreEvent::MarkedRead { .. }));
        assert!(matches!(
            received[1],
            StoreEvent::RolledBack {
                op: CommitOp::MarkRead,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn mark_all_rollback_is_all_or_nothing() {
        let (store, backend) = loaded_store(vec![
            notif("a", 100, false),
            notif("b", 200, false),
            notif("c", 300, true),
        ]);
        backend.fail_mark_all.store(true, Ordering::SeqCst);

        let err = store.mark_all_read().await.unwrap_err();

        assert!(matches!(
            err,
            Error::CommitFailure {
                op: CommitOp::MarkAllRead,
                ..
            }
        ));
        assert_eq!(store.unread().current(), 2);
        assert!(!store.get("a").unwrap().viewed);
        assert!(!store.get("b").unwrap().viewed);
        assert!(store.get("c").unwrap().viewed);
    }

    #[tokio::test]
    async fn duplicate_insert_behaves_as_update() {
        let (store, _backend) = loaded_store(Vec::new());

        store.apply_remote_event(ChangeEvent::insert(notif("a", 100, false)));
        store.apply_remote_event(ChangeEvent::insert(notif("a", 100, false)));

        assert_eq!(store.len(), 1);
        assert_eq!(store.unread().current(), 1);
    }

    #[tokio::test]
    async fn delete_for_absent_id_is_noop() {
        let (store, _backend) = loaded_store(vec![notif("a", 100, false)]);
        let mut events = store.subscribe();

        store.apply_remote_event(ChangeEvent::delete(notif("ghost", 50, false)));

        assert_eq!(store.len(), 1);
        assert_eq!(store.unread().current(), 1);
        // Still notified once; consumers treat it as a refresh.
        assert_eq!(drain(&mut events).len(), 1);
    }

    #[tokio::test]
    async fn update_for_absent_id_inserts() {
        let (store, _backend) = loaded_store(Vec::new());

        store.apply_remote_event(ChangeEvent::update(notif("early", 100, false)));

        assert_eq!(store.len(), 1);
        assert_eq!(store.unread().current(), 1);
    }

    #[tokio::test]
    async fn remote_update_supersedes_pending_mark_read_rollback() {
        let (store, backend) = loaded_store(vec![notif("a", 100, false)]);
        backend.gate_commits.store(true, Ordering::SeqCst);
        backend.fail_mark_read.store(true, Ordering::SeqCst);

        let pending = {
            let store = store.clone();
            tokio::spawn(async move { store.mark_read("a").await })
        };
        // Let the optimistic apply land and the commit park on the gate.
        tokio::task::yield_now().await;
        assert_eq!(store.unread().current(), 0);

        // The feed confirms the read before the commit resolves.
        store.apply_remote_event(ChangeEvent::update(notif("a", 100, true)));

        backend.release_gate();
        let result = pending.await.unwrap();

        // The commit failure still surfaces, but the remote write wins:
        // no rollback to unread.
        assert!(result.is_err());
        assert!(store.get("a").unwrap().viewed);
        assert_eq!(store.unread().current(), 0);
    }

    #[tokio::test]
    async fn teardown_discards_inflight_commit_resolution() {
        let (store, backend) = loaded_store(vec![notif("a", 100, false)]);
        backend.gate_commits.store(true, Ordering::SeqCst);
        backend.fail_mark_read.store(true, Ordering::SeqCst);

        let pending = {
            let store = store.clone();
            tokio::spawn(async move { store.mark_read("a").await })
        };
        tokio::task::yield_now().await;

        store.reset();
        backend.release_gate();
        let result = pending.await.unwrap();

        assert!(result.is_err());
        assert!(store.is_empty());
        assert_eq!(store.unread().current(), 0);
    }

    #[tokio::test]
    async fn unread_count_matches_collection_after_mixed_mutations() {
        let (store, _backend) = loaded_store(vec![
            notif("a", 100, false),
            notif("b", 200, true),
            notif("c", 300, false),
        ]);

        store.apply_remote_event(ChangeEvent::insert(notif("d", 400, false)));
        store.mark_read("a").await.unwrap();
        store.apply_remote_event(ChangeEvent::delete(notif("c", 300, false)));
        store.remove("b").await.unwrap();

        let expected = store.snapshot().iter().filter(|n| !n.viewed).count();
        assert_eq!(store.unread().current(), expected);
        assert_eq!(expected, 1);
    }
}

mod timer_tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn scenario_d_hide_cancels_before_dwell() {
        let (store, backend) = loaded_store(vec![notif("a", 100, false), notif("b", 200, false)]);
        let timer = inbox_sync::AutoAcknowledgeTimer::new(store.clone(), Duration::from_secs(5));
        timer.arm();

        tokio::time::sleep(Duration::from_secs(2)).await;
        timer.cancel();
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(timer.state(), AckTimerState::Cancelled);
        assert_eq!(backend.mark_all_calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.unread().current(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn dwell_elapsed_marks_all_read() {
        let (store, backend) = loaded_store(vec![notif("a", 100, false)]);
        let timer = inbox_sync::AutoAcknowledgeTimer::new(store.clone(), Duration::from_secs(5));
        timer.arm();

        tokio::time::sleep(Duration::from_secs(6)).await;
        tokio::task::yield_now().await;

        assert_eq!(timer.state(), AckTimerState::Fired);
        assert_eq!(store.unread().current(), 0);
        assert_eq!(backend.mark_all_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn user_delete_cancels_pending_cycle() {
        let (store, backend) = loaded_store(vec![notif("a", 100, false), notif("b", 200, false)]);
        let timer = inbox_sync::AutoAcknowledgeTimer::new(store.clone(), Duration::from_secs(5));
        timer.arm();

        store.remove("a").await.unwrap();
        tokio::task::yield_now().await;

        assert_eq!(timer.state(), AckTimerState::Cancelled);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(backend.mark_all_calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.unread().current(), 1);
    }
}

mod service_tests {
    use super::*;

    fn service(
        backend: Arc<TestBackend>,
        provider: Arc<TestFeedProvider>,
    ) -> NotificationSyncService {
        NotificationSyncService::new(backend, provider, SyncConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn start_loads_store_and_applies_feed_events() {
        let backend = TestBackend::with_notifications(vec![notif("a", 100, false)]);
        let provider = Arc::new(TestFeedProvider::default());
        let service = service(backend.clone(), provider.clone());

        service.start("parent-1").await.unwrap();
        let store = service.store();
        assert_eq!(store.len(), 1);

        provider
            .push(FeedSignal::Change(ChangeEvent::insert(notif(
                "b", 200, false,
            ))))
            .await;
        tokio::task::yield_now().await;

        assert_eq!(store.len(), 2);
        assert_eq!(store.unread().current(), 2);

        service.shutdown().await;
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_failure_surfaces_error_and_store_stays_empty() {
        let backend = TestBackend::with_notifications(vec![notif("a", 100, false)]);
        backend.fail_fetch.store(true, Ordering::SeqCst);
        let provider = Arc::new(TestFeedProvider::default());
        let service = service(backend.clone(), provider.clone());

        let err = service.start("parent-1").await.unwrap_err();

        assert!(matches!(err, Error::FetchFailure(_)));
        assert!(service.store().is_empty());
        // The feed is still live, so the session can converge remotely.
        provider
            .push(FeedSignal::Change(ChangeEvent::insert(notif(
                "b", 200, false,
            ))))
            .await;
        tokio::task::yield_now().await;
        assert_eq!(service.store().len(), 1);

        service.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn reconnect_resyncs_from_backend() {
        let backend = TestBackend::with_notifications(vec![notif("a", 100, false)]);
        let provider = Arc::new(TestFeedProvider::default());
        let service = service(backend.clone(), provider.clone());

        service.start("parent-1").await.unwrap();
        assert_eq!(service.store().len(), 1);

        // The gap hides an insert; the resync on reconnect recovers it.
        backend.set_notifications(vec![notif("a", 100, false), notif("b", 200, false)]);
        provider
            .push(FeedSignal::Disconnected {
                reason: "transport closed".to_string(),
            })
            .await;
        provider.push(FeedSignal::Connected).await;
        tokio::task::yield_now().await;

        assert_eq!(service.store().len(), 2);
        service.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn events_after_shutdown_do_not_mutate_store() {
        let backend = TestBackend::with_notifications(vec![notif("a", 100, false)]);
        let provider = Arc::new(TestFeedProvider::default());
        let service = service(backend.clone(), provider.clone());

        service.start("parent-1").await.unwrap();
        let store = service.store();
        service.shutdown().await;
        assert!(store.is_empty());

        // The old subscription is torn down; a send must not land anywhere.
        let sender = provider.senders.lock().last().cloned().unwrap();
        let _ = sender
            .send(FeedSignal::Change(ChangeEvent::insert(notif(
                "b", 200, false,
            ))))
            .await;
        tokio::task::yield_now().await;

        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn switching_users_resets_state() {
        let backend = TestBackend::with_notifications(vec![notif("a", 100, false)]);
        let provider = Arc::new(TestFeedProvider::default());
        let service = service(backend.clone(), provider.clone());

        service.start("parent-1").await.unwrap();
        assert_eq!(service.store().len(), 1);

        backend.set_notifications(vec![notif("x", 500, false), notif("y", 600, true)]);
        service.start("parent-2").await.unwrap();

        let ids: Vec<String> = service.store().snapshot().into_iter().map(|n| n.id).collect();
        assert_eq!(ids, vec!["y", "x"]);
        assert_eq!(service.store().unread().current(), 1);

        service.shutdown().await;
    }
}
