//! The configuration store.
//!
//! Holds the current [`Document`] and hands it out to any number of readers.
//! Reads are a lock-free pointer load ([`arc_swap::ArcSwap`]); a write swaps
//! in a whole new document, so a reader always holds either the old or the
//! new document and never a mix of both.
//!
//! # Lifecycle
//!
//! ```text
//! new(base) ──▶ seed(path, list)* ──▶ initialize(resolved override)? ──▶ replace(...)*
//! ```
//!
//! Seeds are remembered and re-applied by [`ConfigStore::initialize`], so the
//! startup override does not wipe list data injected before it arrived.
//! Host replacements through [`ConfigStore::replace`] are stored exactly as
//! received.
//!
//! Every accepted write bumps the revision and is broadcast to subscribers.
//! Writes are expected from a single task (the page event loop).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use sitesync_core::protocol::{validate_document, ProtocolError};
use sitesync_core::{ConfigPath, Document, DocumentError};

/// Capacity of the change broadcast.  Slow subscribers that fall further
/// behind than this skip ahead; they can always re-read [`ConfigStore::current`].
const EVENT_CAPACITY: usize = 16;

/// Published after every accepted write.
#[derive(Debug, Clone)]
pub struct StoreEvent {
    pub revision: u64,
    pub document: Arc<Document>,
}

/// Result of a whole-document write.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplaceOutcome {
    Accepted { revision: u64 },
    /// The payload was dropped; the previous document is still current.
    Rejected(ProtocolError),
}

impl ReplaceOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, ReplaceOutcome::Accepted { .. })
    }
}

/// Shared, swappable configuration document.
#[derive(Debug)]
pub struct ConfigStore {
    current: ArcSwap<Document>,
    revision: AtomicU64,
    seeds: Mutex<Vec<(ConfigPath, Value)>>,
    events: broadcast::Sender<StoreEvent>,
}

impl ConfigStore {
    /// Creates a store holding `initial` at revision 0.
    pub fn new(initial: Document) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            current: ArcSwap::from_pointee(initial),
            revision: AtomicU64::new(0),
            seeds: Mutex::new(Vec::new()),
            events,
        }
    }

    /// The current document.  Never blocks.
    pub fn current(&self) -> Arc<Document> {
        self.current.load_full()
    }

    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::Acquire)
    }

    /// Subscribes to accepted writes.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    /// Replaces the whole document with an untrusted payload.
    ///
    /// Non-objects and empty objects are rejected and leave the current
    /// document in place.
    pub fn replace(&self, payload: Value) -> ReplaceOutcome {
        match validate_document(payload) {
            Ok(document) => self.commit(document),
            Err(reason) => {
                warn!("rejected document replacement: {reason}");
                ReplaceOutcome::Rejected(reason)
            }
        }
    }

    /// Replaces the whole document with an already-typed one.
    ///
    /// Only the emptiness check applies, since the root is an object by
    /// construction.
    pub fn replace_document(&self, document: Document) -> ReplaceOutcome {
        if document.is_empty() {
            warn!("rejected document replacement: {}", ProtocolError::EmptyDocument);
            return ReplaceOutcome::Rejected(ProtocolError::EmptyDocument);
        }
        self.commit(document)
    }

    /// Replaces the document with the resolved startup document and re-applies
    /// every seed recorded so far.
    pub fn initialize(&self, mut document: Document) -> ReplaceOutcome {
        for (path, value) in self.seed_snapshot() {
            if let Err(e) = document.set(&path, value) {
                warn!("could not re-apply seed at '{path}': {e}");
            }
        }
        self.replace_document(document)
    }

    /// Injects externally supplied data at `path` and remembers it for
    /// [`ConfigStore::initialize`].
    ///
    /// # Errors
    ///
    /// Returns the [`DocumentError`] from [`Document::set`]; the store is left
    /// unchanged.
    pub fn seed(&self, path: &ConfigPath, value: Value) -> Result<u64, DocumentError> {
        let mut next = Document::clone(&self.current());
        next.set(path, value.clone())?;
        if let Ok(mut seeds) = self.seeds.lock() {
            seeds.retain(|(existing, _)| existing != path);
            seeds.push((path.clone(), value));
        }
        debug!("seeded '{path}'");
        Ok(self.publish(next))
    }

    fn seed_snapshot(&self) -> Vec<(ConfigPath, Value)> {
        match self.seeds.lock() {
            Ok(seeds) => seeds.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn commit(&self, document: Document) -> ReplaceOutcome {
        let revision = self.publish(document);
        ReplaceOutcome::Accepted { revision }
    }

    fn publish(&self, document: Document) -> u64 {
        let document = Arc::new(document);
        self.current.store(Arc::clone(&document));
        let revision = self.revision.fetch_add(1, Ordering::AcqRel) + 1;
        // No subscribers is fine; the document is still current.
        let _ = self.events.send(StoreEvent { revision, document });
        revision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        Document::from_value(value).unwrap()
    }

    fn store() -> ConfigStore {
        ConfigStore::new(doc(json!({"meta": {"siteName": "Base"}})))
    }

    #[test]
    fn test_replace_accepts_non_empty_object_exactly() {
        let store = store();
        let payload = json!({"sections": {"hero": {"title": "New"}}});

        let outcome = store.replace(payload.clone());

        assert_eq!(outcome, ReplaceOutcome::Accepted { revision: 1 });
        assert_eq!(store.current().as_ref().clone().into_value(), payload);
    }

    #[test]
    fn test_replace_rejects_empty_and_non_object_payloads() {
        let store = store();
        let before = store.current();

        for payload in [json!({}), json!([1, 2]), json!("x"), json!(null), json!(3)] {
            let outcome = store.replace(payload);
            assert!(!outcome.is_accepted());
        }

        assert_eq!(store.current(), before);
        assert_eq!(store.revision(), 0);
    }

    #[test]
    fn test_readers_keep_their_snapshot_across_writes() {
        let store = store();
        let snapshot = store.current();

        store.replace(json!({"meta": {"siteName": "After"}}));

        assert_eq!(snapshot.as_map()["meta"]["siteName"], "Base");
        assert_eq!(store.current().as_map()["meta"]["siteName"], "After");
    }

    #[test]
    fn test_seed_then_initialize_keeps_seeded_list() {
        // Arrange
        let store = store();
        let path: ConfigPath = "sections.blog.posts".parse().unwrap();
        store.seed(&path, json!([{"slug": "a"}])).unwrap();

        // Act
        let outcome = store.initialize(doc(json!({"sections": {"blog": {"title": "Blog"}}})));

        // Assert
        assert!(outcome.is_accepted());
        let current = store.current();
        assert_eq!(current.get(&path), Some(&json!([{"slug": "a"}])));
        assert_eq!(current.as_map()["sections"]["blog"]["title"], "Blog");
    }

    #[test]
    fn test_host_replace_does_not_reapply_seeds() {
        let store = store();
        let path: ConfigPath = "sections.blog.posts".parse().unwrap();
        store.seed(&path, json!([])).unwrap();

        store.replace(json!({"theme": {"primary": "#fff"}}));

        assert_eq!(store.current().get(&path), None);
    }

    #[test]
    fn test_seed_failure_leaves_store_unchanged() {
        let store = store();
        let path: ConfigPath = "meta.siteName.inner".parse().unwrap();
        assert!(store.seed(&path, json!(1)).is_err());
        assert_eq!(store.revision(), 0);
    }

    #[tokio::test]
    async fn test_subscribers_receive_accepted_writes_only() {
        let store = store();
        let mut events = store.subscribe();

        store.replace(json!({}));
        store.replace(json!({"a": 1}));

        let event = events.recv().await.unwrap();
        assert_eq!(event.revision, 1);
        assert_eq!(event.document.as_map()["a"], 1);
        assert!(events.try_recv().is_err());
    }
}
