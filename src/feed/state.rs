//! Per-key pagination state and the merge rule.

use crate::model::FeedItem;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Position of a key's pagination.
///
/// `Page(0)` means nothing has been loaded yet, so the next request is page 1.
/// `End` is the end-of-data sentinel: an empty page was received and no
/// further pages will be requested until a refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageCursor {
    Page(u32),
    End,
}

impl PageCursor {
    pub const INITIAL: PageCursor = PageCursor::Page(0);

    /// Page to request next, or `None` at end of data.
    pub fn next_page(self) -> Option<u32> {
        match self {
            PageCursor::Page(page) => page.checked_add(1),
            PageCursor::End => None,
        }
    }

    pub fn is_end(self) -> bool {
        matches!(self, PageCursor::End)
    }

    /// Integer form used in logs: the page number, or -1 at end of data.
    pub fn as_raw(self) -> i64 {
        match self {
            PageCursor::Page(page) => i64::from(page),
            PageCursor::End => -1,
        }
    }
}

impl Default for PageCursor {
    fn default() -> Self {
        PageCursor::INITIAL
    }
}

impl fmt::Display for PageCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageCursor::Page(page) => write!(f, "page {page}"),
            PageCursor::End => f.write_str("end"),
        }
    }
}

/// Which kind of fetch is outstanding for a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    Initial,
    Next(u32),
    Refresh,
}

impl FetchKind {
    pub fn page(self) -> u32 {
        match self {
            FetchKind::Initial | FetchKind::Refresh => 1,
            FetchKind::Next(page) => page,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct InFlight {
    pub kind: FetchKind,
    pub ticket: u64,
}

/// Accumulated state for one filter key.
///
/// `items` is shared with snapshots through an `Arc`, so handing the list to
/// a caller is a reference-count bump; merges copy-on-write.
pub(crate) struct KeyState<T: FeedItem> {
    pub cursor: PageCursor,
    pub items: Arc<Vec<T>>,
    seen: HashSet<T::Id>,
    pub loaded: bool,
    pub in_flight: Option<InFlight>,
    /// Fetches that lost their marker but are still running against the port.
    pub superseded: Vec<InFlight>,
}

impl<T: FeedItem> Default for KeyState<T> {
    fn default() -> Self {
        Self {
            cursor: PageCursor::INITIAL,
            items: Arc::new(Vec::new()),
            seen: HashSet::new(),
            loaded: false,
            in_flight: None,
            superseded: Vec::new(),
        }
    }
}

impl<T: FeedItem> KeyState<T> {
    /// Append the items whose ids are not present yet, in arrival order.
    /// Returns how many were kept.
    pub fn append_unique(&mut self, incoming: Vec<T>) -> usize {
        let seen = &mut self.seen;
        let fresh: Vec<T> = incoming
            .into_iter()
            .filter(|item| seen.insert(item.id().clone()))
            .collect();
        let added = fresh.len();
        if added > 0 {
            Arc::make_mut(&mut self.items).extend(fresh);
        }
        added
    }

    /// Discard accumulated items and take `incoming` as the whole list.
    pub fn replace(&mut self, incoming: Vec<T>) -> usize {
        self.clear();
        self.append_unique(incoming)
    }

    /// Take the in-flight marker away from the outstanding fetch. Its request
    /// stays tracked until the fetch finishes or is dropped.
    pub fn supersede(&mut self) {
        if let Some(flight) = self.in_flight.take() {
            self.superseded.push(flight);
        }
    }

    /// The superseded fetch still requesting `page`, if any.
    pub fn superseded_page(&self, page: u32) -> Option<FetchKind> {
        self.superseded
            .iter()
            .map(|flight| flight.kind)
            .find(|kind| kind.page() == page)
    }

    /// Back to the pristine, unloaded state. In-flight tracking is left alone.
    pub fn clear(&mut self) {
        self.items = Arc::new(Vec::new());
        self.seen.clear();
        self.cursor = PageCursor::INITIAL;
        self.loaded = false;
    }
}

/// Remove later duplicates by stable key, keeping first-seen order.
pub fn dedup_by_id<T: FeedItem>(items: impl IntoIterator<Item = T>) -> Vec<T> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.id().clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MentionTicker, NewsArticle};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn ids(items: &[NewsArticle]) -> Vec<&str> {
        items.iter().map(|a| a.id.as_str()).collect()
    }

    fn news(id: &str) -> NewsArticle {
        NewsArticle::new(id, format!("title {id}"))
    }

    #[test]
    fn test_cursor_next_page() {
        assert_eq!(PageCursor::INITIAL.next_page(), Some(1));
        assert_eq!(PageCursor::Page(4).next_page(), Some(5));
        assert_eq!(PageCursor::End.next_page(), None);
        assert_eq!(PageCursor::Page(u32::MAX).next_page(), None);
    }

    #[test]
    fn test_cursor_raw_sentinel() {
        assert_eq!(PageCursor::End.as_raw(), -1);
        assert_eq!(PageCursor::Page(3).as_raw(), 3);
        assert_eq!(PageCursor::End.to_string(), "end");
    }

    #[test]
    fn test_append_unique_skips_existing_ids() {
        let mut state = KeyState::default();
        assert_eq!(state.append_unique(vec![news("a"), news("b")]), 2);

        let mut updated_b = news("b");
        updated_b.title = "changed".into();
        let added = state.append_unique(vec![updated_b, news("c")]);

        assert_eq!(added, 1);
        assert_eq!(ids(&state.items), vec!["a", "b", "c"]);
        // First-seen copy wins
        assert_eq!(state.items[1].title, "title b");
    }

    #[test]
    fn test_append_unique_dedups_within_page() {
        let mut state = KeyState::default();
        let added = state.append_unique(vec![news("a"), news("a"), news("b")]);
        assert_eq!(added, 2);
        assert_eq!(ids(&state.items), vec!["a", "b"]);
    }

    #[test]
    fn test_replace_forgets_old_ids() {
        let mut state = KeyState::default();
        state.append_unique(vec![news("a"), news("b")]);
        state.replace(vec![news("b"), news("z")]);
        assert_eq!(ids(&state.items), vec!["b", "z"]);

        // "a" is no longer known, so it can come back
        assert_eq!(state.append_unique(vec![news("a")]), 1);
    }

    #[test]
    fn test_merge_does_not_touch_shared_snapshot() {
        let mut state = KeyState::default();
        state.append_unique(vec![news("a")]);
        let snapshot = Arc::clone(&state.items);
        state.append_unique(vec![news("b")]);
        assert_eq!(snapshot.len(), 1);
        assert_eq!(state.items.len(), 2);
    }

    #[test]
    fn test_supersede_keeps_outstanding_page_tracked() {
        let mut state: KeyState<NewsArticle> = KeyState::default();
        state.in_flight = Some(InFlight {
            kind: FetchKind::Next(2),
            ticket: 7,
        });
        state.supersede();
        state.clear();

        assert!(state.in_flight.is_none());
        assert_eq!(state.superseded_page(2), Some(FetchKind::Next(2)));
        assert_eq!(state.superseded_page(3), None);
    }

    #[test]
    fn test_dedup_by_id_tickers() {
        let list = vec![
            MentionTicker::new("BTC", "Bitcoin"),
            MentionTicker::new("ETH", "Ethereum"),
            MentionTicker::new("BTC", "Bitcoin (dup)"),
        ];
        let unique = dedup_by_id(list);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].name, "Bitcoin");
    }

    proptest! {
        #[test]
        fn prop_merged_pages_hold_each_id_once_in_first_seen_order(
            pages in proptest::collection::vec(proptest::collection::vec(0u8..30, 0..12), 0..8)
        ) {
            let mut state = KeyState::default();
            let mut expected: Vec<String> = Vec::new();
            for page in &pages {
                let incoming: Vec<NewsArticle> = page.iter().map(|n| news(&n.to_string())).collect();
                state.append_unique(incoming);
                for n in page {
                    let id = n.to_string();
                    if !expected.contains(&id) {
                        expected.push(id);
                    }
                }
            }
            let got: Vec<String> = state.items.iter().map(|a| a.id.clone()).collect();
            prop_assert_eq!(got, expected);
        }
    }
}
