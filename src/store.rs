//! Stream Store
//!
//! The channel treats the application store as an opaque collaborator with
//! exactly one read (the current stream name) and one write (new content
//! arrived). [`FeedStore`] is an in-memory implementation used by the CLI
//! and in tests.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

/// Store capabilities consumed by the live-update channel
pub trait StreamStore: Send + Sync {
    /// Identifier of the stream currently displayed (e.g. `public`, `tag__rust`)
    fn stream_name(&self) -> String;

    /// Record that content with the given id was published to the stream
    ///
    /// Must tolerate arbitrary ids, including ids already seen.
    fn received_new_content(&self, content_id: &str);
}

/// In-memory feed store
///
/// Tracks content that the server announced but the client has not fetched
/// yet, in arrival order. Repeated announcements of the same id are counted
/// once.
pub struct FeedStore {
    stream_name: String,
    inner: Mutex<FeedState>,
}

#[derive(Debug, Default)]
struct FeedState {
    unfetched: Vec<String>,
    seen: HashSet<String>,
}

impl FeedStore {
    /// Create a store for the given stream
    pub fn new(stream_name: impl Into<String>) -> Self {
        Self {
            stream_name: stream_name.into(),
            inner: Mutex::new(FeedState::default()),
        }
    }

    /// Whether there is announced content not yet taken
    pub fn has_new_content(&self) -> bool {
        !self.lock().unfetched.is_empty()
    }

    /// Number of announced content items not yet taken
    pub fn new_content_count(&self) -> usize {
        self.lock().unfetched.len()
    }

    /// Snapshot of the unfetched content ids, oldest first
    pub fn unfetched(&self) -> Vec<String> {
        self.lock().unfetched.clone()
    }

    /// Drain the unfetched content ids, oldest first
    pub fn take_new_content(&self) -> Vec<String> {
        let mut state = self.lock();
        state.seen.clear();
        std::mem::take(&mut state.unfetched)
    }

    fn lock(&self) -> MutexGuard<'_, FeedState> {
        // Every mutation is a single push or take, never left half-done
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl StreamStore for FeedStore {
    fn stream_name(&self) -> String {
        self.stream_name.clone()
    }

    fn received_new_content(&self, content_id: &str) {
        let mut state = self.lock();
        if state.seen.insert(content_id.to_string()) {
            state.unfetched.push(content_id.to_string());
        }
        tracing::debug!(
            stream = %self.stream_name,
            content_id = %content_id,
            pending = state.unfetched.len(),
            "New content announced"
        );
    }
}
