use super::state::{FetchKind, InFlight, KeyState, PageCursor};
use crate::port::{FetchError, FetchPort, PageRequest, DEFAULT_PAGE_LIMIT};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

type Item<P> = <P as FetchPort>::Item;
type Key<P> = <P as FetchPort>::Key;

/// What an aggregator operation did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// A page was fetched and merged. `added` excludes duplicates.
    Fetched { received: usize, added: usize },
    /// The page came back empty; the cursor is now at end of data.
    EndOfData,
    /// The key was already loaded; no fetch was made.
    Cached,
    /// The trigger was ignored.
    Skipped(SkipReason),
    /// The fetch finished after being superseded (refresh, cancellation) and was dropped.
    Discarded,
    /// The fetch failed; state kept (next page) or left empty (first load, refresh).
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Another fetch for the same key is outstanding.
    InFlight(FetchKind),
    /// The cursor is at end of data.
    Exhausted,
}

/// Result of any aggregator operation: the key's list after the operation.
#[derive(Debug, Clone)]
pub struct FeedSnapshot<K, T> {
    pub key: K,
    pub items: Arc<Vec<T>>,
    pub cursor: PageCursor,
    pub outcome: LoadOutcome,
}

impl<K, T> FeedSnapshot<K, T> {
    /// The failure message, if this operation's fetch failed.
    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            LoadOutcome::Failed(message) => Some(message),
            _ => None,
        }
    }
}

/// Advisory notification sent once per failed fetch, for toast display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedNotice<K> {
    pub key: K,
    pub kind: FetchKind,
    pub message: String,
}

struct Inner<P: FetchPort> {
    port: P,
    page_limit: u32,
    states: Mutex<HashMap<Key<P>, KeyState<Item<P>>>>,
    notices: Option<mpsc::Sender<FeedNotice<Key<P>>>>,
    tickets: AtomicU64,
}

impl<P: FetchPort> Inner<P> {
    fn lock_states(&self) -> MutexGuard<'_, HashMap<Key<P>, KeyState<Item<P>>>> {
        self.states.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_ticket(&self) -> u64 {
        self.tickets.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
    }

    fn notify(&self, key: &Key<P>, kind: FetchKind, error: &FetchError) {
        let Some(tx) = &self.notices else {
            return;
        };
        let notice = FeedNotice {
            key: key.clone(),
            kind,
            message: error.to_string(),
        };
        match tx.try_send(notice) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(key = ?key, "Notice channel full, dropping fetch failure notice");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(key = ?key, "Notice channel closed");
            }
        }
    }
}

/// Clears a key's in-flight marker if the operation holding this guard is
/// dropped before it completes (task aborted, session closed). Always removes
/// the fetch from the key's superseded list.
struct InFlightGuard<'a, P: FetchPort> {
    inner: &'a Inner<P>,
    key: &'a Key<P>,
    ticket: u64,
}

impl<P: FetchPort> Drop for InFlightGuard<'_, P> {
    fn drop(&mut self) {
        let mut states = self.inner.lock_states();
        if let Some(state) = states.get_mut(self.key) {
            if state.in_flight.map(|f| f.ticket) == Some(self.ticket) {
                tracing::debug!(key = ?self.key, ticket = self.ticket, "Fetch dropped before completion");
                state.in_flight = None;
            }
            state.superseded.retain(|f| f.ticket != self.ticket);
        }
    }
}

/// Paginated, deduplicating feed state for every filter key of one session.
///
/// Cloning is cheap and clones share state. All mutation happens under one
/// mutex that is never held across an `.await`; at most one fetch per key is
/// outstanding, tracked by a ticket so that late results from superseded or
/// cancelled fetches are dropped instead of applied.
///
/// Operations never fail: fetch errors are folded into the returned
/// [`FeedSnapshot`] and reported once on the notice channel.
pub struct FeedAggregator<P: FetchPort> {
    inner: Arc<Inner<P>>,
}

impl<P: FetchPort> Clone for FeedAggregator<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P: FetchPort> FeedAggregator<P> {
    pub fn new(port: P) -> Self {
        Self::with_options(port, DEFAULT_PAGE_LIMIT, None)
    }

    /// Build with an explicit page size and an optional failure notice channel.
    pub fn with_options(
        port: P,
        page_limit: u32,
        notices: Option<mpsc::Sender<FeedNotice<Key<P>>>>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                port,
                page_limit: page_limit.max(1),
                states: Mutex::new(HashMap::new()),
                notices,
                tickets: AtomicU64::new(0),
            }),
        }
    }

    pub fn port(&self) -> &P {
        &self.inner.port
    }

    pub fn page_limit(&self) -> u32 {
        self.inner.page_limit
    }

    /// Load the first page for `key` unless it is already loaded.
    ///
    /// A loaded key is served from memory without a fetch. On failure the
    /// key stays unloaded with an empty list, so calling this again retries.
    pub async fn load_initial(&self, key: &Key<P>) -> FeedSnapshot<Key<P>, Item<P>> {
        let ticket = {
            let mut states = self.inner.lock_states();
            let state = states.entry(key.clone()).or_default();
            if state.loaded {
                tracing::debug!(key = ?key, cursor = %state.cursor, "Serving cached feed");
                return snapshot(key, state, LoadOutcome::Cached);
            }
            if let Some(flight) = state.in_flight {
                return skipped(key, state, flight.kind);
            }
            let ticket = self.inner.next_ticket();
            state.in_flight = Some(InFlight {
                kind: FetchKind::Initial,
                ticket,
            });
            ticket
        };

        self.run_fetch(key, FetchKind::Initial, ticket).await
    }

    /// Fetch the page after the cursor and append its new items.
    ///
    /// Ignored while any fetch for `key` is in flight (a refresh included),
    /// while a superseded request for the same page is still running, or once
    /// the cursor reached end of data.
    pub async fn load_next(&self, key: &Key<P>) -> FeedSnapshot<Key<P>, Item<P>> {
        let (kind, ticket) = {
            let mut states = self.inner.lock_states();
            let state = states.entry(key.clone()).or_default();
            if let Some(flight) = state.in_flight {
                return skipped(key, state, flight.kind);
            }
            let Some(page) = state.cursor.next_page() else {
                tracing::debug!(key = ?key, "End of data, not fetching");
                return snapshot(key, state, LoadOutcome::Skipped(SkipReason::Exhausted));
            };
            if let Some(running) = state.superseded_page(page) {
                return skipped(key, state, running);
            }
            let kind = FetchKind::Next(page);
            let ticket = self.inner.next_ticket();
            state.in_flight = Some(InFlight { kind, ticket });
            (kind, ticket)
        };

        self.run_fetch(key, kind, ticket).await
    }

    /// Drop everything accumulated for `key` and load page 1 again, bypassing caches.
    ///
    /// Takes priority over an outstanding next-page fetch, whose result is
    /// discarded when it arrives. Ignored while a first load or another
    /// refresh of the same key is in flight, as those already fetch page 1.
    pub async fn refresh(&self, key: &Key<P>) -> FeedSnapshot<Key<P>, Item<P>> {
        let ticket = {
            let mut states = self.inner.lock_states();
            let state = states.entry(key.clone()).or_default();
            match state.in_flight {
                Some(flight @ InFlight {
                    kind: FetchKind::Initial | FetchKind::Refresh,
                    ..
                }) => return skipped(key, state, flight.kind),
                Some(flight) => {
                    tracing::debug!(key = ?key, superseded = ?flight.kind, "Refresh preempts pending fetch");
                }
                None => {}
            }
            state.supersede();
            state.clear();
            let ticket = self.inner.next_ticket();
            state.in_flight = Some(InFlight {
                kind: FetchKind::Refresh,
                ticket,
            });
            ticket
        };

        self.run_fetch(key, FetchKind::Refresh, ticket).await
    }

    /// Load `key` and keep paging until it holds at least `want` items.
    ///
    /// At most `max_pages` pages are requested in total. Paging also stops at
    /// end of data, on a failure, or after a page that added nothing new.
    pub async fn load_until(
        &self,
        key: &Key<P>,
        want: usize,
        max_pages: u32,
    ) -> FeedSnapshot<Key<P>, Item<P>> {
        let mut snapshot = self.load_initial(key).await;
        let mut pages = 1;
        while snapshot.items.len() < want && pages < max_pages {
            match snapshot.outcome {
                LoadOutcome::Cached => {}
                LoadOutcome::Fetched { added, .. } if added > 0 => {}
                _ => break,
            }
            snapshot = self.load_next(key).await;
            pages += 1;
        }
        snapshot
    }

    /// Seed `key` with items fetched elsewhere, positioned at `page`.
    ///
    /// Any fetch in flight for the key is superseded.
    pub fn preload(
        &self,
        key: Key<P>,
        items: Vec<Item<P>>,
        page: u32,
    ) -> FeedSnapshot<Key<P>, Item<P>> {
        let mut states = self.inner.lock_states();
        let state = states.entry(key.clone()).or_default();
        let received = items.len();
        let added = state.replace(items);
        state.cursor = PageCursor::Page(page);
        state.loaded = true;
        state.supersede();
        tracing::debug!(key = ?key, items = added, page, "Preloaded feed");
        snapshot(&key, state, LoadOutcome::Fetched { received, added })
    }

    /// Current list for `key` without fetching. Unknown keys yield an empty list.
    pub fn snapshot(&self, key: &Key<P>) -> FeedSnapshot<Key<P>, Item<P>> {
        let states = self.inner.lock_states();
        match states.get(key) {
            Some(state) => snapshot(key, state, LoadOutcome::Cached),
            None => FeedSnapshot {
                key: key.clone(),
                items: Arc::new(Vec::new()),
                cursor: PageCursor::INITIAL,
                outcome: LoadOutcome::Cached,
            },
        }
    }

    pub fn is_loaded(&self, key: &Key<P>) -> bool {
        self.inner
            .lock_states()
            .get(key)
            .is_some_and(|state| state.loaded)
    }

    pub fn is_in_flight(&self, key: &Key<P>) -> bool {
        self.inner
            .lock_states()
            .get(key)
            .is_some_and(|state| state.in_flight.is_some())
    }

    pub fn is_refreshing(&self, key: &Key<P>) -> bool {
        self.inner.lock_states().get(key).is_some_and(|state| {
            matches!(
                state.in_flight,
                Some(InFlight {
                    kind: FetchKind::Refresh,
                    ..
                })
            )
        })
    }

    pub fn cursor(&self, key: &Key<P>) -> PageCursor {
        self.inner
            .lock_states()
            .get(key)
            .map_or(PageCursor::INITIAL, |state| state.cursor)
    }

    /// Forget every outstanding fetch. Results that arrive afterwards are discarded.
    pub fn cancel_pending(&self) {
        let mut states = self.inner.lock_states();
        let mut cancelled = 0usize;
        for state in states.values_mut() {
            if state.in_flight.take().is_some() {
                cancelled += 1;
            }
        }
        if cancelled > 0 {
            tracing::debug!(cancelled, "Cancelled pending feed fetches");
        }
    }

    async fn run_fetch(
        &self,
        key: &Key<P>,
        kind: FetchKind,
        ticket: u64,
    ) -> FeedSnapshot<Key<P>, Item<P>> {
        let guard = InFlightGuard {
            inner: &self.inner,
            key,
            ticket,
        };

        let mut request = PageRequest::new(kind.page(), self.inner.page_limit);
        if kind == FetchKind::Refresh {
            request = request.forced();
        }
        tracing::debug!(key = ?key, ?kind, page = request.page, limit = request.limit, "Fetching page");

        let result = self.inner.port.fetch_page(key, request).await;
        let snapshot = self.complete(key, kind, ticket, result);
        drop(guard);
        snapshot
    }

    fn complete(
        &self,
        key: &Key<P>,
        kind: FetchKind,
        ticket: u64,
        result: Result<Vec<Item<P>>, FetchError>,
    ) -> FeedSnapshot<Key<P>, Item<P>> {
        let mut states = self.inner.lock_states();
        let state = states.entry(key.clone()).or_default();

        if state.in_flight.map(|f| f.ticket) != Some(ticket) {
            tracing::debug!(key = ?key, ?kind, "Discarding superseded fetch result");
            return snapshot(key, state, LoadOutcome::Discarded);
        }
        state.in_flight = None;

        let outcome = match result {
            Ok(items) => {
                let received = items.len();
                match kind {
                    FetchKind::Initial | FetchKind::Refresh => {
                        let added = state.replace(items);
                        state.cursor = PageCursor::Page(kind.page());
                        state.loaded = true;
                        tracing::info!(key = ?key, ?kind, items = added, "Feed loaded");
                        LoadOutcome::Fetched { received, added }
                    }
                    FetchKind::Next(page) if received == 0 => {
                        state.cursor = PageCursor::End;
                        state.loaded = true;
                        tracing::info!(key = ?key, page, total = state.items.len(), "Reached end of feed");
                        LoadOutcome::EndOfData
                    }
                    FetchKind::Next(page) => {
                        let added = state.append_unique(items);
                        state.cursor = PageCursor::Page(page);
                        state.loaded = true;
                        tracing::info!(
                            key = ?key,
                            page,
                            received,
                            added,
                            total = state.items.len(),
                            "Merged next page"
                        );
                        LoadOutcome::Fetched { received, added }
                    }
                }
            }
            Err(e) => {
                tracing::warn!(key = ?key, ?kind, error = %e, "Feed fetch failed");
                self.inner.notify(key, kind, &e);
                LoadOutcome::Failed(e.to_string())
            }
        };

        snapshot(key, state, outcome)
    }
}

fn snapshot<K: Clone, T: crate::model::FeedItem>(
    key: &K,
    state: &KeyState<T>,
    outcome: LoadOutcome,
) -> FeedSnapshot<K, T> {
    FeedSnapshot {
        key: key.clone(),
        items: Arc::clone(&state.items),
        cursor: state.cursor,
        outcome,
    }
}

fn skipped<K: Clone + std::fmt::Debug, T: crate::model::FeedItem>(
    key: &K,
    state: &KeyState<T>,
    in_flight: FetchKind,
) -> FeedSnapshot<K, T> {
    tracing::debug!(key = ?key, ?in_flight, "Fetch already in flight, ignoring trigger");
    snapshot(key, state, LoadOutcome::Skipped(SkipReason::InFlight(in_flight)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NewsArticle;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;

    /// Port answering from a queue of canned results, one per call.
    struct QueuePort {
        responses: Mutex<VecDeque<Result<Vec<NewsArticle>, FetchError>>>,
        requests: Mutex<Vec<PageRequest>>,
        calls: AtomicUsize,
    }

    impl QueuePort {
        fn new(responses: Vec<Result<Vec<NewsArticle>, FetchError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl FetchPort for QueuePort {
        type Key = &'static str;
        type Item = NewsArticle;

        async fn fetch_page(
            &self,
            _key: &&'static str,
            request: PageRequest,
        ) -> Result<Vec<NewsArticle>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().unwrap().push(request);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    fn page(ids: &[&str]) -> Result<Vec<NewsArticle>, FetchError> {
        Ok(ids.iter().map(|id| NewsArticle::new(*id, *id)).collect())
    }

    #[tokio::test]
    async fn test_first_load_failure_is_retryable() {
        let port = QueuePort::new(vec![Err(FetchError::HttpStatus(500)), page(&["a"])]);
        let feed = FeedAggregator::new(port);

        let first = feed.load_initial(&"general").await;
        assert!(first.items.is_empty());
        assert_eq!(first.cursor, PageCursor::INITIAL);
        assert!(first.error().unwrap().contains("500"));
        assert!(!feed.is_loaded(&"general"));

        let retry = feed.load_initial(&"general").await;
        assert_eq!(retry.items.len(), 1);
        assert_eq!(retry.cursor, PageCursor::Page(1));
        assert_eq!(feed.port().calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_refresh_requests_forced_first_page() {
        let port = QueuePort::new(vec![page(&["a"]), page(&["b"]), page(&["c"])]);
        let feed = FeedAggregator::new(port);

        feed.load_initial(&"k").await;
        feed.load_next(&"k").await;
        feed.refresh(&"k").await;

        let requests = feed.port().requests.lock().unwrap().clone();
        assert_eq!(requests.len(), 3);
        assert_eq!((requests[0].page, requests[0].force_refresh), (1, false));
        assert_eq!((requests[1].page, requests[1].force_refresh), (2, false));
        assert_eq!((requests[2].page, requests[2].force_refresh), (1, true));
    }

    #[tokio::test]
    async fn test_failed_refresh_leaves_empty_unloaded_state() {
        let port = QueuePort::new(vec![page(&["a", "b"]), Err(FetchError::Timeout)]);
        let feed = FeedAggregator::new(port);

        feed.load_initial(&"k").await;
        let refreshed = feed.refresh(&"k").await;

        assert!(refreshed.items.is_empty());
        assert_eq!(refreshed.cursor, PageCursor::INITIAL);
        assert_eq!(refreshed.outcome, LoadOutcome::Failed("Request timed out".into()));
        assert!(!feed.is_loaded(&"k"));
    }

    #[tokio::test]
    async fn test_notice_sent_once_per_failure() {
        let (tx, mut rx) = mpsc::channel(4);
        let port = QueuePort::new(vec![Err(FetchError::Api("bad query".into()))]);
        let feed = FeedAggregator::with_options(port, 20, Some(tx));

        feed.load_initial(&"search").await;

        let notice = rx.try_recv().unwrap();
        assert_eq!(notice.key, "search");
        assert_eq!(notice.kind, FetchKind::Initial);
        assert!(notice.message.contains("bad query"));
        assert!(rx.try_recv().is_err());
        assert_eq!(feed.port().requests.lock().unwrap()[0].limit, 20);
    }

    #[tokio::test]
    async fn test_skipped_triggers_send_no_notice() {
        let (tx, mut rx) = mpsc::channel(4);
        let port = QueuePort::new(vec![page(&["a"]), page(&[])]);
        let feed = FeedAggregator::with_options(port, 10, Some(tx));

        feed.load_initial(&"k").await;
        feed.load_next(&"k").await;
        let after_end = feed.load_next(&"k").await;

        assert_eq!(after_end.outcome, LoadOutcome::Skipped(SkipReason::Exhausted));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_preload_positions_cursor() {
        let port = QueuePort::new(vec![page(&["d", "e"])]);
        let feed = FeedAggregator::new(port);

        let seeded = feed.preload("btc", page(&["a", "b", "c"]).unwrap(), 2);
        assert_eq!(seeded.items.len(), 3);
        assert!(feed.is_loaded(&"btc"));

        let cached = feed.load_initial(&"btc").await;
        assert_eq!(cached.outcome, LoadOutcome::Cached);

        let next = feed.load_next(&"btc").await;
        assert_eq!(next.cursor, PageCursor::Page(3));
        assert_eq!(next.items.len(), 5);
        assert_eq!(feed.port().requests.lock().unwrap()[0].page, 3);
    }

    #[tokio::test]
    async fn test_cancel_pending_discards_late_result() {
        let port = QueuePort::new(vec![page(&["a"])]);
        let feed = FeedAggregator::new(port);

        // Simulate an outstanding fetch by marking the key by hand.
        {
            let mut states = feed.inner.lock_states();
            let state = states.entry("k").or_default();
            state.in_flight = Some(InFlight {
                kind: FetchKind::Initial,
                ticket: 99,
            });
        }
        feed.cancel_pending();
        assert!(!feed.is_in_flight(&"k"));

        let late = feed.complete(&"k", FetchKind::Initial, 99, page(&["late"]));
        assert_eq!(late.outcome, LoadOutcome::Discarded);
        assert!(late.items.is_empty());
    }

    #[tokio::test]
    async fn test_empty_next_page_on_unloaded_key_stays_at_end() {
        let port = QueuePort::new(vec![page(&[]), page(&["a"])]);
        let feed = FeedAggregator::new(port);

        let ended = feed.load_next(&"k").await;
        assert_eq!(ended.outcome, LoadOutcome::EndOfData);
        assert!(feed.is_loaded(&"k"));

        let again = feed.load_initial(&"k").await;
        assert_eq!(again.outcome, LoadOutcome::Cached);
        assert_eq!(again.cursor, PageCursor::End);
        assert_eq!(feed.port().calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_load_until_stops_on_page_without_new_items() {
        let port = QueuePort::new(vec![
            page(&["btc", "eth"]),
            page(&["eth", "btc"]),
            page(&["sol"]),
        ]);
        let feed = FeedAggregator::new(port);

        let snap = feed.load_until(&"mentions", 20, 10).await;
        assert_eq!(
            snap.outcome,
            LoadOutcome::Fetched {
                received: 2,
                added: 0
            }
        );
        assert_eq!(snap.items.len(), 2);
        assert_eq!(feed.port().calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_load_until_respects_page_cap_and_target() {
        let port = QueuePort::new(vec![
            page(&["a"]),
            page(&["b"]),
            page(&["c"]),
            page(&["d"]),
        ]);
        let feed = FeedAggregator::new(port);

        let capped = feed.load_until(&"k", 10, 3).await;
        assert_eq!(capped.items.len(), 3);
        assert_eq!(capped.cursor, PageCursor::Page(3));

        // Already holding enough items: served from memory
        let enough = feed.load_until(&"k", 2, 10).await;
        assert_eq!(enough.outcome, LoadOutcome::Cached);
        assert_eq!(feed.port().calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_unknown_key_snapshot_is_empty() {
        let feed = FeedAggregator::new(QueuePort::new(Vec::new()));
        let snap = feed.snapshot(&"nothing");
        assert!(snap.items.is_empty());
        assert_eq!(feed.cursor(&"nothing"), PageCursor::INITIAL);
        assert!(!feed.is_refreshing(&"nothing"));
    }
}
