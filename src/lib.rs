//! Paginated, deduplicating feeds for a crypto news backend.
//!
//! The core is [`feed::FeedAggregator`], which keeps one page cursor and one
//! deduplicated item list per filter key and serializes first loads,
//! next-page loads and refreshes against a [`port::FetchPort`]. The
//! [`api`] module provides HTTP ports; [`session::FeedSession`] wires an
//! aggregator to tab selection and scroll/refresh gestures.

pub mod api;
pub mod config;
pub mod context;
pub mod feed;
pub mod home;
pub mod model;
pub mod port;
pub mod projection;
pub mod selector;
pub mod session;
pub mod signal;
pub mod util;
