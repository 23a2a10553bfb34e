//! Active tab / filter selection.
//!
//! The selector owns the currently active key and publishes changes through
//! a [`tokio::sync::watch`] channel. Re-selecting the active key does not
//! notify anyone, so it can never trigger a fetch.

use tokio::sync::watch;

#[derive(Debug)]
pub struct TabSelector<K> {
    tx: watch::Sender<K>,
}

impl<K: Clone + PartialEq> TabSelector<K> {
    pub fn new(initial: K) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    /// Make `key` active. Returns `true` if it differs from the current key,
    /// in which case subscribers are notified exactly once.
    pub fn select(&self, key: K) -> bool {
        self.tx.send_if_modified(|current| {
            if *current == key {
                false
            } else {
                *current = key;
                true
            }
        })
    }

    pub fn current(&self) -> K {
        self.tx.borrow().clone()
    }

    /// Receiver that wakes on every distinct selection.
    pub fn subscribe(&self) -> watch::Receiver<K> {
        self.tx.subscribe()
    }
}
