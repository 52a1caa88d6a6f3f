//! In-process caching of website content sections.
//!
//! This module provides the `SectionCache` that sits between content-bound
//! pages and the remote content store. Section HTML is kept in memory and
//! considered stale after 5 minutes by default.
//!
//! - Reads are served from memory while fresh, otherwise fetched
//! - Concurrent misses on one section share a single fetch
//! - Admin writes go straight to the store and then drop the cached copy

pub mod manager;

pub use manager::{CacheStats, CachedContent, SectionCache};
