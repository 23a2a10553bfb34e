//! One screen's worth of feed state: the selector, the aggregator and the
//! gesture bridge, plus the background tasks running its fetches.
//!
//! The session is the single owner of its aggregator. Each trigger becomes a
//! tokio task; finished snapshots are reported on the session's event
//! channel. Dropping or shutting down the session aborts every outstanding
//! task, and aborted fetches never touch the aggregated state.

use crate::feed::{FeedAggregator, FeedSnapshot, LoadOutcome};
use crate::port::FetchPort;
use crate::selector::TabSelector;
use crate::signal::{SignalBridge, Trigger, UiSignal};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

/// Input to a running session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionSignal<K> {
    /// Switch the active tab/filter key.
    Select(K),
    /// A pull-to-refresh or scroll gesture on the active list.
    Ui(UiSignal),
}

/// Output of a running session.
#[derive(Debug)]
pub enum SessionEvent<K, T> {
    /// A load, next-page or refresh finished for `snapshot.key`.
    Updated(FeedSnapshot<K, T>),
    /// A background fetch task panicked.
    TaskPanicked { error: String },
}

type Event<P> = SessionEvent<<P as FetchPort>::Key, <P as FetchPort>::Item>;

pub struct FeedSession<P: FetchPort> {
    aggregator: FeedAggregator<P>,
    selector: TabSelector<P::Key>,
    bridge: SignalBridge,
    tasks: JoinSet<()>,
    events: mpsc::Sender<Event<P>>,
}

impl<P: FetchPort> FeedSession<P> {
    pub fn new(
        aggregator: FeedAggregator<P>,
        initial: P::Key,
        events: mpsc::Sender<Event<P>>,
    ) -> Self {
        Self {
            aggregator,
            selector: TabSelector::new(initial),
            bridge: SignalBridge::new(),
            tasks: JoinSet::new(),
            events,
        }
    }

    pub fn aggregator(&self) -> &FeedAggregator<P> {
        &self.aggregator
    }

    pub fn active_key(&self) -> P::Key {
        self.selector.current()
    }

    pub fn selector(&self) -> &TabSelector<P::Key> {
        &self.selector
    }

    /// Number of fetch tasks not yet reaped.
    pub fn pending_tasks(&self) -> usize {
        self.tasks.len()
    }

    /// Start the first load of the active key.
    pub fn open(&mut self) {
        let key = self.selector.current();
        self.spawn_initial(key);
    }

    /// Apply one input signal.
    pub fn handle(&mut self, signal: SessionSignal<P::Key>) {
        match signal {
            SessionSignal::Select(key) => {
                if self.selector.select(key.clone()) {
                    self.bridge.reset();
                    self.spawn_initial(key);
                }
            }
            SessionSignal::Ui(ui) => {
                let key = self.selector.current();
                let refreshing = self.aggregator.is_refreshing(&key);
                match self.bridge.observe(ui, refreshing) {
                    Some(Trigger::Refresh) => self.spawn_refresh(key),
                    Some(Trigger::LoadNext) => self.spawn_next(key),
                    None => {}
                }
            }
        }
    }

    /// Process signals until the sender side closes, then shut down.
    pub async fn run(mut self, mut signals: mpsc::Receiver<SessionSignal<P::Key>>) {
        self.open();
        loop {
            tokio::select! {
                signal = signals.recv() => match signal {
                    Some(signal) => self.handle(signal),
                    None => break,
                },
                Some(joined) = self.tasks.join_next(), if !self.tasks.is_empty() => {
                    report_join(&self.events, joined).await;
                }
            }
        }
        self.shutdown().await;
    }

    /// Abort every outstanding fetch. Nothing in flight is committed.
    pub async fn shutdown(mut self) {
        self.tasks.abort_all();
        self.aggregator.cancel_pending();
        while self.tasks.join_next().await.is_some() {}
        tracing::debug!("Feed session closed");
    }

    fn spawn_initial(&mut self, key: P::Key) {
        let aggregator = self.aggregator.clone();
        let events = self.events.clone();
        self.tasks.spawn(async move {
            let snapshot = aggregator.load_initial(&key).await;
            publish(&events, snapshot).await;
        });
    }

    fn spawn_next(&mut self, key: P::Key) {
        let aggregator = self.aggregator.clone();
        let events = self.events.clone();
        self.tasks.spawn(async move {
            let snapshot = aggregator.load_next(&key).await;
            publish(&events, snapshot).await;
        });
    }

    fn spawn_refresh(&mut self, key: P::Key) {
        let aggregator = self.aggregator.clone();
        let events = self.events.clone();
        self.tasks.spawn(async move {
            let snapshot = aggregator.refresh(&key).await;
            publish(&events, snapshot).await;
        });
    }
}

async fn report_join<K, T>(
    events: &mpsc::Sender<SessionEvent<K, T>>,
    joined: Result<(), tokio::task::JoinError>,
) {
    let Err(e) = joined else {
        return;
    };
    if e.is_panic() {
        let error = e.to_string();
        tracing::error!(error = %error, "Feed task panicked");
        if events
            .send(SessionEvent::TaskPanicked { error })
            .await
            .is_err()
        {
            tracing::debug!("Session event receiver dropped");
        }
    }
}

async fn publish<K, T>(events: &mpsc::Sender<SessionEvent<K, T>>, snapshot: FeedSnapshot<K, T>) {
    if matches!(snapshot.outcome, LoadOutcome::Skipped(_)) {
        return;
    }
    if events.send(SessionEvent::Updated(snapshot)).await.is_err() {
        tracing::debug!("Session event receiver dropped");
    }
}
