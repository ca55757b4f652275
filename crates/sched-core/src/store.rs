//! Cached view of one backend collection.
//!
//! A store holds the last committed snapshot plus the flags the synchronization
//! controller reads (`is_fetching`, `did_invalidate`, the one-shot initial sync
//! marker). Snapshots are shared behind an `Arc`, so a reader that cloned one
//! never sees it change; every transition installs a new snapshot instead.

use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Recoverable record of the last failed fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    pub message: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ResourceStore<T, K = ()> {
    items: Option<Arc<Vec<T>>>,
    is_fetching: bool,
    did_invalidate: bool,
    last_updated_at: Option<DateTime<Utc>>,
    initial_sync_pending: bool,
    request_seq: u64,
    in_flight: Option<u64>,
    key: K,
    status: Option<String>,
    last_error: Option<FetchFailure>,
}

impl<T, K: Default> Default for ResourceStore<T, K> {
    fn default() -> Self {
        Self::with_key(K::default())
    }
}

impl<T> ResourceStore<T, ()> {
    pub fn new() -> Self {
        Self::with_key(())
    }
}

impl<T, K> ResourceStore<T, K> {
    pub fn with_key(key: K) -> Self {
        Self {
            items: None,
            is_fetching: false,
            did_invalidate: false,
            last_updated_at: None,
            initial_sync_pending: true,
            request_seq: 0,
            in_flight: None,
            key,
            status: None,
            last_error: None,
        }
    }

    /// Committed items, empty until the first successful fetch.
    pub fn items(&self) -> &[T] {
        self.items.as_deref().map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_items(&self) -> bool {
        self.items.is_some()
    }

    pub fn snapshot(&self) -> Option<Arc<Vec<T>>> {
        self.items.clone()
    }

    pub fn is_fetching(&self) -> bool {
        self.is_fetching
    }

    pub fn did_invalidate(&self) -> bool {
        self.did_invalidate
    }

    pub fn last_updated_at(&self) -> Option<DateTime<Utc>> {
        self.last_updated_at
    }

    pub fn is_initial_sync_pending(&self) -> bool {
        self.initial_sync_pending
    }

    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn last_error(&self) -> Option<&FetchFailure> {
        self.last_error.as_ref()
    }

    /// Sequence number of the outstanding fetch, if any.
    pub fn in_flight(&self) -> Option<u64> {
        self.in_flight
    }

    /// Flags a fetch as outstanding and returns its sequence number.
    pub fn mark_fetching(&mut self) -> u64 {
        self.request_seq += 1;
        self.is_fetching = true;
        self.in_flight = Some(self.request_seq);
        self.request_seq
    }

    /// Marks the snapshot stale. Items stay displayable until replaced.
    pub fn mark_invalid(&mut self) {
        self.did_invalidate = true;
    }

    pub fn commit(&mut self, items: Vec<T>) {
        self.items = Some(Arc::new(items));
        self.is_fetching = false;
        self.did_invalidate = false;
        self.in_flight = None;
        self.last_updated_at = Some(Utc::now());
        self.last_error = None;
    }

    /// Records a failed fetch and leaves the store ready for another attempt.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.is_fetching = false;
        self.did_invalidate = true;
        self.in_flight = None;
        self.last_error = Some(FetchFailure {
            message: message.into(),
            at: Utc::now(),
        });
    }

    pub fn set_status(&mut self, status: Option<String>) {
        self.status = status.filter(|value| !value.trim().is_empty());
    }

    pub(crate) fn consume_initial_sync(&mut self) {
        self.initial_sync_pending = false;
    }
}

impl<T, K: PartialEq> ResourceStore<T, K> {
    /// Points the store at a different key. A change drops the old snapshot,
    /// orphans any outstanding fetch and forces invalidation.
    pub fn select(&mut self, key: K) -> bool {
        if self.key == key {
            return false;
        }
        self.key = key;
        self.items = None;
        self.is_fetching = false;
        self.in_flight = None;
        self.did_invalidate = true;
        self.last_error = None;
        true
    }

    /// Whether a response issued with `(seq, key)` may still be committed.
    pub fn accepts(&self, seq: u64, key: &K) -> bool {
        self.in_flight == Some(seq) && &self.key == key
    }
}
