//! Paged feed aggregation.
//!
//! [`FeedAggregator`] keeps one pagination state per filter key: a cursor and
//! the items received so far, deduplicated by stable id and kept in arrival
//! order. It answers three operations:
//!
//! - **`load_initial`**: first page, served from memory once loaded
//! - **`load_next`**: the page after the cursor, appended without duplicates
//! - **`refresh`**: discard the key's list and reload page 1
//!
//! Pages are 1-based. An empty page moves the cursor to
//! [`PageCursor::End`]; from then on `load_next` makes no request until the
//! key is refreshed. Triggers that arrive while a fetch for the same key is
//! outstanding are ignored, except `refresh`, which supersedes a pending
//! next-page fetch.
//!
//! # Example
//!
//! ```ignore
//! let feed = FeedAggregator::new(NewsFeed::new(client));
//! let first = feed.load_initial(&NewsChannel::General).await;
//! let more = feed.load_next(&NewsChannel::General).await;
//! ```

mod aggregator;
mod state;

pub use aggregator::{FeedAggregator, FeedNotice, FeedSnapshot, LoadOutcome, SkipReason};
pub use state::{dedup_by_id, FetchKind, PageCursor};
