use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::api::ApiError;
use crate::clock::{Clock, SystemClock};
use crate::models::{ContentRecord, SectionId};
use crate::store::ContentStore;

/// Consider cached section HTML stale after 5 minutes.
pub const DEFAULT_TTL_MINUTES: i64 = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct CachedContent {
    pub content: String,
    pub fetched_at: DateTime<Utc>,
}

impl CachedContent {
    pub fn new(content: String, fetched_at: DateTime<Utc>) -> Self {
        Self {
            content,
            fetched_at,
        }
    }

    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.fetched_at
    }

    /// Fresh iff `now - fetched_at < ttl`
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        self.age(now) < ttl
    }

    pub fn age_display(&self, now: DateTime<Utc>) -> String {
        let seconds = self.age(now).num_seconds();
        if seconds < 60 {
            // Negative ages come from clock skew
            "just now".to_string()
        } else if seconds < 3600 {
            format!("{}m ago", seconds / 60)
        } else if seconds < 86_400 {
            format!("{}h ago", seconds / 3600)
        } else {
            format!("{}d ago", seconds / 86_400)
        }
    }
}

/// Counters since the cache was created
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub fetch_errors: u64,
    pub entries: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    fetch_errors: AtomicU64,
}

/// Time-limited memo of section HTML in front of a [`ContentStore`].
///
/// Construct one per process and share it by reference (or `Arc`).
pub struct SectionCache<S> {
    store: S,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    entries: RwLock<HashMap<SectionId, CachedContent>>,
    /// One gate per section with a fetch in progress
    in_flight: Mutex<HashMap<SectionId, Arc<Mutex<()>>>>,
    /// Bumped by every invalidation, under the `entries` write lock
    generation: AtomicU64,
    counters: Counters,
}

impl<S: ContentStore> SectionCache<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            ttl: Duration::minutes(DEFAULT_TTL_MINUTES),
            entries: RwLock::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
            generation: AtomicU64::new(0),
            counters: Counters::default(),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Section HTML, or an empty string when it cannot be loaded.
    ///
    /// Never fails. Fetch errors are logged and leave the cache untouched.
    pub async fn read(&self, section: &str) -> String {
        match self.try_read(section).await {
            Ok(content) => content,
            Err(e) if e.is_not_found() => {
                debug!(section, "No stored content for section");
                String::new()
            }
            Err(e) => {
                warn!(section, error = %e, "Failed to fetch section content");
                String::new()
            }
        }
    }

    /// Like [`read`](Self::read) but substitutes `placeholder` for empty content
    pub async fn read_or(&self, section: &str, placeholder: &str) -> String {
        let content = self.read(section).await;
        if content.is_empty() {
            placeholder.to_string()
        } else {
            content
        }
    }

    /// Like [`read`](Self::read) but reports why nothing could be loaded.
    pub async fn try_read(&self, section: &str) -> Result<String, ApiError> {
        let section = SectionId::new(section)?;

        if let Some(content) = self.fresh_content(&section).await {
            return Ok(content);
        }

        let gate = self.gate(&section).await;
        let result = {
            let _guard = gate.lock().await;
            // Another caller may have filled the entry while we waited
            match self.fresh_content(&section).await {
                Some(content) => Ok(content),
                None => self.fetch_and_store(&section).await,
            }
        };
        self.release_gate(&section, gate).await;
        result
    }

    /// The cached entry for `section` if present and fresh. Never fetches.
    pub async fn peek(&self, section: &str) -> Option<CachedContent> {
        let section = SectionId::new(section).ok()?;
        let now = self.clock.now();
        self.entries
            .read()
            .await
            .get(&section)
            .filter(|entry| entry.is_fresh(now, self.ttl))
            .cloned()
    }

    /// Drop one section's entry, or every entry when `section` is `None`.
    pub async fn invalidate(&self, section: Option<&str>) {
        let mut entries = self.entries.write().await;
        self.generation.fetch_add(1, Ordering::SeqCst);
        match section {
            Some(section) => {
                let Ok(section) = SectionId::new(section) else {
                    return;
                };
                if entries.remove(&section).is_some() {
                    debug!(section = %section, "Invalidated cached section");
                }
            }
            None => {
                let count = entries.len();
                entries.clear();
                debug!(count, "Cleared section cache");
            }
        }
    }

    pub async fn clear(&self) {
        self.invalidate(None).await;
    }

    /// Store new HTML for `section`, then force the next read to refetch.
    ///
    /// On failure the cache is left as it was, so a fresh entry keeps being
    /// served until its TTL runs out.
    pub async fn write_and_invalidate(&self, section: &str, content: &str) -> Result<(), ApiError> {
        let section = SectionId::new(section)?;

        if let Err(e) = self.store.upsert_section(&section, content).await {
            warn!(section = %section, error = %e, "Failed to update section content");
            return Err(e);
        }

        self.invalidate(Some(section.as_str())).await;
        info!(section = %section, bytes = content.len(), "Updated section content");
        Ok(())
    }

    /// Every stored row, ordered by section. Bypasses the cache.
    pub async fn list_sections(&self) -> Result<Vec<ContentRecord>, ApiError> {
        self.store.list_sections().await
    }

    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            fetch_errors: self.counters.fetch_errors.load(Ordering::Relaxed),
            entries: self.entries.read().await.len(),
        }
    }

    async fn fresh_content(&self, section: &SectionId) -> Option<String> {
        let now = self.clock.now();
        let entries = self.entries.read().await;
        let entry = entries.get(section)?;
        if !entry.is_fresh(now, self.ttl) {
            return None;
        }
        self.counters.hits.fetch_add(1, Ordering::Relaxed);
        debug!(section = %section, age_secs = entry.age(now).num_seconds(), "Cache hit");
        Some(entry.content.clone())
    }

    async fn fetch_and_store(&self, section: &SectionId) -> Result<String, ApiError> {
        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        debug!(section = %section, "Cache miss, fetching from store");
        let generation = self.generation.load(Ordering::SeqCst);

        match self.store.fetch_section(section).await {
            Ok(record) => {
                let content = record.content.unwrap_or_default();
                let mut entries = self.entries.write().await;
                // An invalidation during the fetch means the row may predate a write
                if self.generation.load(Ordering::SeqCst) == generation {
                    let entry = CachedContent::new(content.clone(), self.clock.now());
                    entries.insert(section.clone(), entry);
                } else {
                    debug!(section = %section, "Invalidated during fetch, not caching");
                }
                Ok(content)
            }
            Err(e) => {
                self.counters.fetch_errors.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    async fn gate(&self, section: &SectionId) -> Arc<Mutex<()>> {
        self.in_flight
            .lock()
            .await
            .entry(section.clone())
            .or_default()
            .clone()
    }

    async fn release_gate(&self, section: &SectionId, gate: Arc<Mutex<()>>) {
        let mut in_flight = self.in_flight.lock().await;
        // Gates are only cloned under this lock: two refs means the map and us
        if Arc::strong_count(&gate) <= 2 {
            in_flight.remove(section);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
