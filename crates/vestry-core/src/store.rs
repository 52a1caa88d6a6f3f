//! The remote content store seam.
//!
//! `SectionCache` talks to the backend only through [`ContentStore`], so the
//! HTTP client can be swapped for [`MemoryStore`] in tests or offline runs.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;

use crate::api::ApiError;
use crate::models::{ContentRecord, SectionId};

#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Fetch the single row whose `section` matches.
    /// A missing row is `ApiError::NotFound`.
    async fn fetch_section(&self, section: &SectionId) -> Result<ContentRecord, ApiError>;

    /// Insert or replace the row for `section`, stamping `updated_at` with now.
    async fn upsert_section(&self, section: &SectionId, content: &str) -> Result<(), ApiError>;

    /// All rows ordered by section name.
    async fn list_sections(&self) -> Result<Vec<ContentRecord>, ApiError>;
}

#[derive(Default)]
struct MemoryState {
    rows: BTreeMap<String, ContentRecord>,
    failing_reads: HashSet<String>,
    failing_writes: HashSet<String>,
    next_id: u64,
}

/// In-memory content table. Clones share the same rows and counters.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    fetches: Arc<AtomicUsize>,
    writes: Arc<AtomicUsize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed a row without counting it as a write
    pub fn insert(&self, section: &str, content: &str) {
        let mut state = self.lock();
        state.next_id += 1;
        let record = ContentRecord {
            id: state.next_id.to_string(),
            section: section.to_string(),
            content: Some(content.to_string()),
            updated_at: Some(Utc::now()),
        };
        state.rows.insert(section.to_string(), record);
    }

    /// Make reads of `section` fail with a server error
    pub fn fail_reads(&self, section: &str) {
        self.lock().failing_reads.insert(section.to_string());
    }

    /// Make writes of `section` fail with an access-denied error
    pub fn fail_writes(&self, section: &str) {
        self.lock().failing_writes.insert(section.to_string());
    }

    pub fn heal(&self, section: &str) {
        let mut state = self.lock();
        state.failing_reads.remove(section);
        state.failing_writes.remove(section);
    }

    /// Number of `fetch_section` calls made so far
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn get(&self, section: &str) -> Option<ContentRecord> {
        self.lock().rows.get(section).cloned()
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn fetch_section(&self, section: &SectionId) -> Result<ContentRecord, ApiError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        // Let concurrent callers interleave the way they would on the network
        tokio::task::yield_now().await;

        let state = self.lock();
        if state.failing_reads.contains(section.as_str()) {
            return Err(ApiError::ServerError(format!(
                "simulated read failure for {}",
                section
            )));
        }
        state
            .rows
            .get(section.as_str())
            .cloned()
            .ok_or_else(|| ApiError::NotFound(section.to_string()))
    }

    async fn upsert_section(&self, section: &SectionId, content: &str) -> Result<(), ApiError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;

        let mut state = self.lock();
        if state.failing_writes.contains(section.as_str()) {
            return Err(ApiError::AccessDenied(format!(
                "simulated write failure for {}",
                section
            )));
        }
        state.next_id += 1;
        let next_id = state.next_id.to_string();
        let record = state
            .rows
            .entry(section.to_string())
            .or_insert_with(|| ContentRecord {
                id: next_id,
                section: section.to_string(),
                content: None,
                updated_at: None,
            });
        record.content = Some(content.to_string());
        record.updated_at = Some(Utc::now());
        Ok(())
    }

    async fn list_sections(&self) -> Result<Vec<ContentRecord>, ApiError> {
        Ok(self.lock().rows.values().cloned().collect())
    }
}
