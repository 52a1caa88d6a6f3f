//! Vestry core library.
//!
//! Editable HTML sections of the church website live in the hosted
//! `site_content` table. This crate provides:
//!
//! - `ApiClient`: REST client for the hosted content table
//! - `SectionCache`: in-process TTL cache in front of any `ContentStore`
//! - `Config` and `CredentialStore`: project settings and the admin token
//!
//! Content-bound pages call [`SectionCache::read`] and render the returned
//! HTML, or fall back to static markup when it comes back empty.

pub mod api;
pub mod auth;
pub mod cache;
pub mod clock;
pub mod config;
pub mod models;
pub mod store;

pub use api::{ApiClient, ApiError};
pub use auth::CredentialStore;
pub use cache::{CacheStats, CachedContent, SectionCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use models::{ContentRecord, SectionId};
pub use store::{ContentStore, MemoryStore};
