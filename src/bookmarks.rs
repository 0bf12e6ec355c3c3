//! Bookmark state store.
//!
//! Holds a local cache of per-spot bookmark flags for the currently visible spots and
//! keeps it consistent with a remote bookmark collaborator ([`BookmarkApi`]).
//!
//! - **Batch resolve**: every visible id is fetched concurrently (one task per id).
//!   A failed fetch counts as "not bookmarked" and never aborts the others. The merged
//!   cache is published in a single snapshot once every fetch has settled.
//! - **Toggle**: a three-phase protocol. [`BookmarkStore::begin_toggle`] applies the
//!   optimistic guess synchronously, [`PendingToggle::settle`] awaits the remote call
//!   and then commits the remote value or rolls back to the displayed value.
//!
//! Observers subscribe to [`BookmarkSnapshot`]s through a `tokio::sync::watch` channel.
//! Every snapshot carries a `version` that increments once per published change.
//!
//! Ordering guarantees:
//! - Only the most recently *started* batch resolve may publish; older ones that finish
//!   late are discarded.
//! - Only the most recently *issued* toggle for an id may write that id's flag when it
//!   settles; earlier toggles still report their own result to the caller.
//! - A resolve publishes even when its caller stops waiting; a [`PendingToggle`]
//!   dropped unsettled rolls back.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use async_trait::async_trait;
use futures::future::join_all;
use log::{debug, error, info, warn};
use tokio::sync::watch;

use crate::{BookmarkKind, RemoteError};

/// Opaque client identifier the remote store keys bookmarks by.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActorId(String);

impl ActorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random identifier for a client that has none stored yet.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Response shape of the remote resolve/toggle calls.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "http", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "http", serde(rename_all = "camelCase"))]
pub struct BookmarkResponse {
    pub success: bool,
    #[cfg_attr(feature = "http", serde(default))]
    pub is_bookmarked: Option<bool>,
    #[cfg_attr(feature = "http", serde(default))]
    pub error: Option<String>,
}

impl BookmarkResponse {
    pub fn bookmarked(is_bookmarked: bool) -> Self {
        Self {
            success: true,
            is_bookmarked: Some(is_bookmarked),
            error: None,
        }
    }

    pub fn failed(error: &str) -> Self {
        Self {
            success: false,
            is_bookmarked: None,
            error: Some(error.to_string()),
        }
    }

    /// Authoritative flag on success (missing flag = not bookmarked), `Rejected` otherwise.
    pub fn into_result(self) -> Result<bool, RemoteError> {
        if self.success {
            Ok(self.is_bookmarked.unwrap_or(false))
        } else {
            Err(RemoteError::Rejected(
                self.error.unwrap_or_else(|| "unknown error".to_string()),
            ))
        }
    }
}

/// Remote bookmark collaborator.
#[async_trait]
pub trait BookmarkApi: Send + Sync {
    /// Current bookmark flag of one target.
    async fn resolve_bookmark(
        &self,
        actor: &ActorId,
        target_id: &str,
        kind: BookmarkKind,
    ) -> Result<BookmarkResponse, RemoteError>;

    /// Flip the bookmark flag of one target; the response carries the new flag.
    async fn toggle_bookmark(
        &self,
        actor: &ActorId,
        target_id: &str,
        kind: BookmarkKind,
    ) -> Result<BookmarkResponse, RemoteError>;
}

/// Macro-state of the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorePhase {
    /// Nothing resolved yet
    #[default]
    Idle,
    /// A batch resolve is in flight
    Resolving,
    /// The cache reflects the last completed batch resolve (plus toggles since)
    Resolved,
}

/// Observable state of the store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookmarkSnapshot {
    /// spot id -> bookmarked; absent means unknown
    pub flags: HashMap<String, bool>,
    pub phase: StorePhase,
    /// Incremented once per published change
    pub version: u64,
}

impl BookmarkSnapshot {
    pub fn is_bookmarked(&self, spot_id: &str) -> Option<bool> {
        self.flags.get(spot_id).copied()
    }

    pub fn is_loading(&self) -> bool {
        self.phase == StorePhase::Resolving
    }
}

/// Summary of one batch resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveOutcome {
    /// Number of ids fetched
    pub requested: usize,
    /// Fetches that failed and were treated as "not bookmarked"
    pub failed: usize,
    /// False when a newer resolve started before this one finished
    pub published: bool,
}

#[derive(Debug, Default)]
struct Bookkeeping {
    resolve_generation: u64,
    /// Id set of the most recently started resolve
    visible: Option<HashSet<String>>,
    next_toggle: u64,
    /// spot id -> sequence number of its most recently issued, unsettled toggle
    latest_toggle: HashMap<String, u64>,
    /// Ids whose flag a toggle wrote since the current resolve started
    toggled_during_resolve: HashSet<String>,
}

struct StoreInner {
    api: Arc<dyn BookmarkApi>,
    actor: ActorId,
    kind: BookmarkKind,
    snapshot: watch::Sender<BookmarkSnapshot>,
    books: Mutex<Bookkeeping>,
}

/// Local bookmark cache synchronized with a remote [`BookmarkApi`].
///
/// Cloning is cheap; clones share the same cache.
#[derive(Clone)]
pub struct BookmarkStore {
    inner: Arc<StoreInner>,
}

impl fmt::Debug for BookmarkStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BookmarkStore")
            .field("actor", &self.inner.actor)
            .field("kind", &self.inner.kind)
            .field("snapshot", &*self.inner.snapshot.borrow())
            .finish()
    }
}

impl BookmarkStore {
    /// Create a store for spot bookmarks of `actor`.
    pub fn new(api: Arc<dyn BookmarkApi>, actor: ActorId) -> Self {
        Self::with_kind(api, actor, BookmarkKind::Spot)
    }

    pub fn with_kind(api: Arc<dyn BookmarkApi>, actor: ActorId, kind: BookmarkKind) -> Self {
        let (snapshot, _) = watch::channel(BookmarkSnapshot::default());
        Self {
            inner: Arc::new(StoreInner {
                api,
                actor,
                kind,
                snapshot,
                books: Mutex::new(Bookkeeping::default()),
            }),
        }
    }

    pub fn actor(&self) -> &ActorId {
        &self.inner.actor
    }

    pub fn kind(&self) -> BookmarkKind {
        self.inner.kind
    }

    /// Watch published snapshots.
    pub fn subscribe(&self) -> watch::Receiver<BookmarkSnapshot> {
        self.inner.snapshot.subscribe()
    }

    /// Copy of the current snapshot.
    pub fn snapshot(&self) -> BookmarkSnapshot {
        self.inner.snapshot.borrow().clone()
    }

    pub fn is_bookmarked(&self, spot_id: &str) -> Option<bool> {
        self.inner.snapshot.borrow().is_bookmarked(spot_id)
    }

    pub fn is_loading(&self) -> bool {
        self.inner.snapshot.borrow().is_loading()
    }

    fn books(&self) -> MutexGuard<'_, Bookkeeping> {
        // Bookkeeping stays consistent even if a holder panicked
        self.inner.books.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn publish(&self, change: impl FnOnce(&mut BookmarkSnapshot)) {
        self.inner.snapshot.send_modify(|snapshot| {
            change(snapshot);
            snapshot.version += 1;
        });
    }

    /// Re-resolve the cache if the *set* of visible ids changed since the last resolve.
    ///
    /// Returns whether a resolve was started. Reordering the same ids does nothing.
    pub async fn sync_visible(&self, spot_ids: &[String]) -> bool {
        let ids: HashSet<String> = spot_ids.iter().cloned().collect();
        if self.books().visible.as_ref() == Some(&ids) {
            return false;
        }
        self.resolve(spot_ids).await;
        true
    }

    /// Fetch the flag of every id concurrently and publish them as one snapshot.
    ///
    /// The cache is replaced wholesale by the resolved ids, except that ids a toggle
    /// wrote while the fetches were in flight keep their local value. An empty id
    /// list clears the cache without any remote call.
    ///
    /// The fetches run in a spawned task: dropping the returned future does not
    /// cancel them, and the store still leaves `Resolving` once they settle.
    pub async fn resolve(&self, spot_ids: &[String]) -> ResolveOutcome {
        let generation = {
            let mut books = self.books();
            books.resolve_generation += 1;
            books.visible = Some(spot_ids.iter().cloned().collect());
            books.toggled_during_resolve.clear();
            books.resolve_generation
        };

        if spot_ids.is_empty() {
            let books = self.books();
            let published = books.resolve_generation == generation;
            if published {
                self.publish(|s| {
                    s.flags.clear();
                    s.phase = StorePhase::Resolved;
                });
            }
            return ResolveOutcome {
                requested: 0,
                failed: 0,
                published,
            };
        }

        self.publish(|s| s.phase = StorePhase::Resolving);

        let task = tokio::spawn(self.clone().fetch_and_publish(generation, spot_ids.to_vec()));
        match task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("[BookmarkStore] Resolve #{} task failed: {}", generation, e);
                ResolveOutcome {
                    requested: spot_ids.len(),
                    failed: spot_ids.len(),
                    published: false,
                }
            }
        }
    }

    async fn fetch_and_publish(self, generation: u64, spot_ids: Vec<String>) -> ResolveOutcome {
        let start = Instant::now();
        let kind = self.inner.kind;
        let handles: Vec<_> = spot_ids
            .iter()
            .map(|id| {
                let api = Arc::clone(&self.inner.api);
                let actor = self.inner.actor.clone();
                let id = id.clone();
                tokio::spawn(async move {
                    api.resolve_bookmark(&actor, &id, kind)
                        .await
                        .and_then(BookmarkResponse::into_result)
                })
            })
            .collect();

        let results = join_all(handles).await;

        let mut flags = HashMap::with_capacity(spot_ids.len());
        let mut failed = 0;
        for (id, joined) in spot_ids.iter().zip(results) {
            let result = joined.unwrap_or_else(|e| {
                Err(RemoteError::Transport(format!("lookup task failed: {}", e)))
            });
            let flag = match result {
                Ok(flag) => flag,
                Err(e) => {
                    failed += 1;
                    warn!("[BookmarkStore] Status lookup failed for {}: {}", id, e);
                    false
                }
            };
            flags.insert(id.clone(), flag);
        }

        let books = self.books();
        if books.resolve_generation != generation {
            debug!(
                "[BookmarkStore] Discarding stale resolve #{} (current #{})",
                generation, books.resolve_generation
            );
            return ResolveOutcome {
                requested: spot_ids.len(),
                failed,
                published: false,
            };
        }

        // Toggles that wrote or are still writing an id outrank a fetch that may predate them
        let local: Vec<&String> = books
            .toggled_during_resolve
            .iter()
            .chain(books.latest_toggle.keys())
            .filter(|id| flags.contains_key(*id))
            .collect();
        self.publish(|s| {
            for id in &local {
                if let Some(flag) = s.flags.get(*id) {
                    flags.insert((*id).clone(), *flag);
                }
            }
            s.flags = flags;
            s.phase = StorePhase::Resolved;
        });
        if !local.is_empty() {
            debug!("[BookmarkStore] Kept {} locally toggled flags over fetched ones", local.len());
        }
        drop(books);

        info!(
            "[BookmarkStore] Resolved {} bookmarks ({} failed) in {:?}",
            spot_ids.len(),
            failed,
            start.elapsed()
        );

        ResolveOutcome {
            requested: spot_ids.len(),
            failed,
            published: true,
        }
    }

    /// Phase 1 of a toggle: show the flipped flag immediately.
    ///
    /// `displayed` is the flag the user currently sees for the spot; it is restored
    /// if the remote call fails. Call [`PendingToggle::settle`] to finish.
    pub fn begin_toggle(&self, spot_id: &str, displayed: bool) -> PendingToggle {
        let optimistic = !displayed;
        let seq = {
            let mut books = self.books();
            books.next_toggle += 1;
            let seq = books.next_toggle;
            books.latest_toggle.insert(spot_id.to_string(), seq);
            books.toggled_during_resolve.insert(spot_id.to_string());
            self.publish(|s| {
                s.flags.insert(spot_id.to_string(), optimistic);
            });
            seq
        };
        debug!("[BookmarkStore] Toggle #{} {} -> {} (optimistic)", seq, spot_id, optimistic);

        PendingToggle {
            store: self.clone(),
            spot_id: spot_id.to_string(),
            previous: displayed,
            seq,
            settled: false,
        }
    }

    /// Optimistically toggle a bookmark and settle it against the remote store.
    ///
    /// The optimistic flag is visible as soon as this is called, before the returned
    /// future is polled. Resolves to the remote flag, or the error after rollback.
    pub fn toggle(
        &self,
        spot_id: &str,
        displayed: bool,
    ) -> impl Future<Output = Result<bool, RemoteError>> + Send + 'static {
        self.begin_toggle(spot_id, displayed).settle()
    }

    fn finish_toggle(
        &self,
        spot_id: &str,
        seq: u64,
        result: &Result<bool, RemoteError>,
        previous: bool,
    ) {
        let flag = *result.as_ref().unwrap_or(&previous);
        if !self.write_toggled_flag(spot_id, seq, flag) {
            debug!("[BookmarkStore] Toggle #{} for {} superseded, not applied", seq, spot_id);
            return;
        }
        if let Err(e) = result {
            error!("[BookmarkStore] Toggle #{} for {} failed, rolled back: {}", seq, spot_id, e);
        }
    }

    fn abandon_toggle(&self, spot_id: &str, seq: u64, previous: bool) {
        if self.write_toggled_flag(spot_id, seq, previous) {
            warn!("[BookmarkStore] Toggle #{} for {} dropped unsettled, rolled back", seq, spot_id);
        }
    }

    /// Write `flag` if toggle `seq` is still the latest for `spot_id`.
    fn write_toggled_flag(&self, spot_id: &str, seq: u64, flag: bool) -> bool {
        let mut books = self.books();
        if books.latest_toggle.get(spot_id) != Some(&seq) {
            return false;
        }
        books.latest_toggle.remove(spot_id);
        books.toggled_during_resolve.insert(spot_id.to_string());
        self.publish(|s| {
            s.flags.insert(spot_id.to_string(), flag);
        });
        true
    }
}

/// An optimistic toggle awaiting remote confirmation.
///
/// Dropping it unsettled rolls the optimistic flag back, unless a newer toggle for
/// the same spot was issued since.
#[must_use = "the optimistic flag is rolled back when dropped unsettled"]
#[derive(Debug)]
pub struct PendingToggle {
    store: BookmarkStore,
    spot_id: String,
    previous: bool,
    seq: u64,
    settled: bool,
}

impl PendingToggle {
    pub fn spot_id(&self) -> &str {
        &self.spot_id
    }

    /// The flag shown while the remote call is in flight.
    pub fn optimistic_value(&self) -> bool {
        !self.previous
    }

    /// Phases 2 and 3: await the remote toggle, then commit or roll back.
    pub async fn settle(mut self) -> Result<bool, RemoteError> {
        let result = {
            let inner = &self.store.inner;
            inner
                .api
                .toggle_bookmark(&inner.actor, &self.spot_id, inner.kind)
                .await
                .and_then(BookmarkResponse::into_result)
        };

        self.store.finish_toggle(&self.spot_id, self.seq, &result, self.previous);
        self.settled = true;
        result
    }
}

impl Drop for PendingToggle {
    fn drop(&mut self) {
        if !self.settled {
            self.store.abandon_toggle(&self.spot_id, self.seq, self.previous);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Semaphore;

    #[derive(Debug, Clone)]
    enum Reply {
        Flag(bool),
        Reject(&'static str),
        Fail,
        Panic,
    }

    impl Reply {
        fn into_response(self) -> Result<BookmarkResponse, RemoteError> {
            match self {
                Reply::Flag(flag) => Ok(BookmarkResponse::bookmarked(flag)),
                Reply::Reject(msg) => Ok(BookmarkResponse::failed(msg)),
                Reply::Fail => Err(RemoteError::Transport("connection reset".to_string())),
                Reply::Panic => panic!("collaborator blew up"),
            }
        }
    }

    struct ScriptedApi {
        resolve: HashMap<String, Reply>,
        toggles: std::sync::Mutex<VecDeque<Reply>>,
        gated: HashSet<String>,
        gate: Arc<Semaphore>,
        resolve_calls: AtomicUsize,
    }

    impl ScriptedApi {
        fn new() -> Self {
            Self {
                resolve: HashMap::new(),
                toggles: std::sync::Mutex::new(VecDeque::new()),
                gated: HashSet::new(),
                gate: Arc::new(Semaphore::new(0)),
                resolve_calls: AtomicUsize::new(0),
            }
        }

        fn resolves(mut self, id: &str, reply: Reply) -> Self {
            self.resolve.insert(id.to_string(), reply);
            self
        }

        fn toggles(self, replies: Vec<Reply>) -> Self {
            *self.toggles.lock().unwrap() = replies.into();
            self
        }

        fn gate(mut self, id: &str) -> Self {
            self.gated.insert(id.to_string());
            self
        }
    }

    #[async_trait]
    impl BookmarkApi for ScriptedApi {
        async fn resolve_bookmark(
            &self,
            _actor: &ActorId,
            target_id: &str,
            _kind: BookmarkKind,
        ) -> Result<BookmarkResponse, RemoteError> {
            self.resolve_calls.fetch_add(1, Ordering::SeqCst);
            if self.gated.contains(target_id) {
                self.gate.acquire().await.unwrap().forget();
            }
            self.resolve
                .get(target_id)
                .cloned()
                .unwrap_or(Reply::Flag(false))
                .into_response()
        }

        async fn toggle_bookmark(
            &self,
            _actor: &ActorId,
            _target_id: &str,
            _kind: BookmarkKind,
        ) -> Result<BookmarkResponse, RemoteError> {
            let reply = self.toggles.lock().unwrap().pop_front().unwrap_or(Reply::Fail);
            reply.into_response()
        }
    }

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn store_with(api: ScriptedApi) -> (BookmarkStore, Arc<ScriptedApi>) {
        let api = Arc::new(api);
        let store = BookmarkStore::new(api.clone(), ActorId::new("actor-1"));
        (store, api)
    }

    #[tokio::test]
    async fn test_resolve_fails_open_per_id() {
        let (store, _) = store_with(
            ScriptedApi::new()
                .resolves("s1", Reply::Flag(true))
                .resolves("s2", Reply::Fail)
                .resolves("s3", Reply::Reject("not found"))
                .resolves("s4", Reply::Panic)
                .resolves("s5", Reply::Flag(true)),
        );

        let outcome = store.resolve(&ids(&["s1", "s2", "s3", "s4", "s5"])).await;
        assert_eq!(
            outcome,
            ResolveOutcome {
                requested: 5,
                failed: 3,
                published: true,
            }
        );

        let snapshot = store.snapshot();
        assert_eq!(snapshot.is_bookmarked("s1"), Some(true));
        assert_eq!(snapshot.is_bookmarked("s2"), Some(false));
        assert_eq!(snapshot.is_bookmarked("s3"), Some(false));
        assert_eq!(snapshot.is_bookmarked("s4"), Some(false));
        assert_eq!(snapshot.is_bookmarked("s5"), Some(true));
        assert!(!snapshot.is_loading());
    }

    #[tokio::test]
    async fn test_resolve_publishes_once_after_all_settle() {
        let api = ScriptedApi::new()
            .resolves("s1", Reply::Flag(true))
            .resolves("s2", Reply::Fail)
            .gate("s1")
            .gate("s2");
        let gate = Arc::clone(&api.gate);
        let (store, _) = store_with(api);
        let mut rx = store.subscribe();
        assert_eq!(rx.borrow().phase, StorePhase::Idle);

        let task = {
            let store = store.clone();
            tokio::spawn(async move { store.resolve(&ids(&["s1", "s2"])).await })
        };

        rx.changed().await.unwrap();
        {
            let snapshot = rx.borrow_and_update();
            assert!(snapshot.is_loading());
            assert!(snapshot.flags.is_empty());
            assert_eq!(snapshot.version, 1);
        }

        gate.add_permits(2);
        let outcome = task.await.unwrap();
        assert!(outcome.published);

        let snapshot = store.snapshot();
        // loading start + merged result, nothing in between
        assert_eq!(snapshot.version, 2);
        assert!(!snapshot.is_loading());
        assert_eq!(snapshot.phase, StorePhase::Resolved);
        assert_eq!(snapshot.flags.len(), 2);
        assert_eq!(snapshot.is_bookmarked("s1"), Some(true));
        assert_eq!(snapshot.is_bookmarked("s2"), Some(false));
    }

    #[tokio::test]
    async fn test_empty_visible_set_short_circuits() {
        let (store, api) = store_with(ScriptedApi::new().resolves("s1", Reply::Flag(true)));
        store.resolve(&ids(&["s1"])).await;

        let outcome = store.resolve(&[]).await;
        assert_eq!(
            outcome,
            ResolveOutcome {
                requested: 0,
                failed: 0,
                published: true,
            }
        );
        assert_eq!(api.resolve_calls.load(Ordering::SeqCst), 1);

        let snapshot = store.snapshot();
        assert!(snapshot.flags.is_empty());
        assert!(!snapshot.is_loading());
    }

    #[tokio::test]
    async fn test_sync_visible_only_on_set_change() {
        let (store, api) = store_with(ScriptedApi::new());

        assert!(store.sync_visible(&ids(&["s1", "s2"])).await);
        assert_eq!(api.resolve_calls.load(Ordering::SeqCst), 2);

        // Same set, different order (e.g. new sort option)
        assert!(!store.sync_visible(&ids(&["s2", "s1"])).await);
        assert_eq!(api.resolve_calls.load(Ordering::SeqCst), 2);

        assert!(store.sync_visible(&ids(&["s1"])).await);
        assert_eq!(api.resolve_calls.load(Ordering::SeqCst), 3);
        assert_eq!(store.is_bookmarked("s2"), None);
    }

    #[tokio::test]
    async fn test_stale_resolve_is_discarded() {
        let api = ScriptedApi::new()
            .resolves("slow", Reply::Flag(true))
            .resolves("fast", Reply::Flag(true))
            .gate("slow");
        let gate = Arc::clone(&api.gate);
        let (store, _) = store_with(api);
        let mut rx = store.subscribe();

        let slow = {
            let store = store.clone();
            tokio::spawn(async move { store.resolve(&ids(&["slow"])).await })
        };
        rx.changed().await.unwrap();

        let fast = store.resolve(&ids(&["fast"])).await;
        assert!(fast.published);

        gate.add_permits(1);
        let slow = slow.await.unwrap();
        assert!(!slow.published);

        let snapshot = store.snapshot();
        assert_eq!(snapshot.is_bookmarked("fast"), Some(true));
        assert_eq!(snapshot.is_bookmarked("slow"), None);
        assert!(!snapshot.is_loading());
    }

    #[tokio::test]
    async fn test_toggle_optimistic_then_rollback() {
        let (store, _) = store_with(
            ScriptedApi::new()
                .resolves("s1", Reply::Flag(true))
                .toggles(vec![Reply::Fail]),
        );
        store.resolve(&ids(&["s1", "s3"])).await;
        assert_eq!(store.is_bookmarked("s3"), Some(false));

        let pending = store.begin_toggle("s3", false);
        assert_eq!(store.is_bookmarked("s3"), Some(true));
        assert!(pending.optimistic_value());

        let result = pending.settle().await;
        assert!(matches!(result, Err(RemoteError::Transport(_))));
        assert_eq!(store.is_bookmarked("s3"), Some(false));
        assert_eq!(store.is_bookmarked("s1"), Some(true));
    }

    #[tokio::test]
    async fn test_toggle_visible_before_future_is_polled() {
        let (store, _) = store_with(ScriptedApi::new().toggles(vec![Reply::Flag(true)]));

        let settle = store.toggle("s1", false);
        assert_eq!(store.is_bookmarked("s1"), Some(true));
        assert_eq!(settle.await, Ok(true));
    }

    #[tokio::test]
    async fn test_toggle_commits_remote_value() {
        // Remote disagrees with the optimistic guess; the remote wins
        let (store, _) = store_with(ScriptedApi::new().toggles(vec![Reply::Flag(false)]));

        let result = store.toggle("s1", false).await;
        assert_eq!(result, Ok(false));
        assert_eq!(store.is_bookmarked("s1"), Some(false));
    }

    #[tokio::test]
    async fn test_toggle_rejected_rolls_back() {
        let (store, _) = store_with(
            ScriptedApi::new()
                .resolves("s1", Reply::Flag(true))
                .toggles(vec![Reply::Reject("quota exceeded")]),
        );
        store.resolve(&ids(&["s1"])).await;

        let result = store.toggle("s1", true).await;
        assert_eq!(result, Err(RemoteError::Rejected("quota exceeded".to_string())));
        assert_eq!(store.is_bookmarked("s1"), Some(true));
    }

    #[tokio::test]
    async fn test_superseded_toggle_does_not_overwrite() {
        let (store, _) = store_with(
            ScriptedApi::new().toggles(vec![Reply::Flag(false), Reply::Flag(true)]),
        );

        let first = store.begin_toggle("s1", false);
        let second = store.begin_toggle("s1", true);
        assert_eq!(store.is_bookmarked("s1"), Some(false));

        // Newest toggle settles first and commits
        assert_eq!(second.settle().await, Ok(false));
        assert_eq!(store.is_bookmarked("s1"), Some(false));

        // Older toggle lands late; its value is reported but not applied
        assert_eq!(first.settle().await, Ok(true));
        assert_eq!(store.is_bookmarked("s1"), Some(false));
    }

    #[tokio::test]
    async fn test_dropped_sync_still_finishes_resolve() {
        let api = ScriptedApi::new().resolves("s1", Reply::Flag(true)).gate("s1");
        let gate = Arc::clone(&api.gate);
        let (store, api) = store_with(api);

        // Caller gives up while the lookup is still gated
        let timed_out =
            tokio::time::timeout(Duration::from_millis(20), store.sync_visible(&ids(&["s1"])))
                .await;
        assert!(timed_out.is_err());
        assert!(store.is_loading());

        gate.add_permits(1);
        let mut rx = store.subscribe();
        tokio::time::timeout(
            Duration::from_secs(1),
            rx.wait_for(|s| s.phase == StorePhase::Resolved),
        )
        .await
        .unwrap()
        .unwrap();

        assert!(!store.is_loading());
        assert_eq!(store.is_bookmarked("s1"), Some(true));
        assert!(!store.sync_visible(&ids(&["s1"])).await);
        assert_eq!(api.resolve_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_dropped_toggle_rolls_back() {
        let (store, _) = store_with(ScriptedApi::new());
        store.resolve(&ids(&["s1", "s2"])).await;

        let pending = store.begin_toggle("s1", false);
        assert_eq!(store.is_bookmarked("s1"), Some(true));
        drop(pending);
        assert_eq!(store.is_bookmarked("s1"), Some(false));

        // Unpolled toggle future
        let settle = store.toggle("s2", false);
        assert_eq!(store.is_bookmarked("s2"), Some(true));
        drop(settle);
        assert_eq!(store.is_bookmarked("s2"), Some(false));

        assert!(store.books().latest_toggle.is_empty());
    }

    #[tokio::test]
    async fn test_dropped_superseded_toggle_keeps_newer_flag() {
        let (store, _) = store_with(ScriptedApi::new().toggles(vec![Reply::Flag(true)]));

        let older = store.begin_toggle("s1", false);
        let newer = store.begin_toggle("s1", false);
        drop(older);
        assert_eq!(store.is_bookmarked("s1"), Some(true));

        assert_eq!(newer.settle().await, Ok(true));
        assert_eq!(store.is_bookmarked("s1"), Some(true));
    }

    #[tokio::test]
    async fn test_toggle_during_resolve_outranks_fetched_flag() {
        let api = ScriptedApi::new()
            .resolves("s1", Reply::Flag(false))
            .resolves("s2", Reply::Flag(false))
            .resolves("s3", Reply::Flag(true))
            .toggles(vec![Reply::Flag(true), Reply::Flag(true)])
            .gate("s1");
        let gate = Arc::clone(&api.gate);
        let (store, _) = store_with(api);
        let mut rx = store.subscribe();

        let resolve = {
            let store = store.clone();
            tokio::spawn(async move { store.resolve(&ids(&["s1", "s2", "s3"])).await })
        };
        rx.changed().await.unwrap();
        assert!(store.is_loading());

        // Settled while the fetch for s1 is still out
        assert_eq!(store.toggle("s1", false).await, Ok(true));
        // Still in flight when the resolve publishes
        let pending = store.begin_toggle("s2", false);

        gate.add_permits(1);
        let outcome = resolve.await.unwrap();
        assert!(outcome.published);

        let snapshot = store.snapshot();
        assert_eq!(snapshot.phase, StorePhase::Resolved);
        assert_eq!(snapshot.is_bookmarked("s1"), Some(true));
        assert_eq!(snapshot.is_bookmarked("s2"), Some(true));
        assert_eq!(snapshot.is_bookmarked("s3"), Some(true));

        assert_eq!(pending.settle().await, Ok(true));
        assert_eq!(store.is_bookmarked("s2"), Some(true));

        // The next resolve no longer shields them
        gate.add_permits(1);
        store.resolve(&ids(&["s1", "s2"])).await;
        assert_eq!(store.is_bookmarked("s1"), Some(false));
        assert_eq!(store.is_bookmarked("s2"), Some(false));
    }

    #[test]
    fn test_generated_actor_ids_are_unique() {
        let a = ActorId::generate();
        let b = ActorId::generate();
        assert_eq!(a.as_str().len(), 36);
        assert_ne!(a, b);
    }

    #[test]
    fn test_response_into_result() {
        assert_eq!(BookmarkResponse::bookmarked(true).into_result(), Ok(true));
        let missing_flag = BookmarkResponse {
            success: true,
            ..Default::default()
        };
        assert_eq!(missing_flag.into_result(), Ok(false));
        assert_eq!(
            BookmarkResponse::default().into_result(),
            Err(RemoteError::Rejected("unknown error".to_string()))
        );
    }
}
