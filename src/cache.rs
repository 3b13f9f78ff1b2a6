//! Handler lifecycle cache: memoised readiness and format lists.
//!
//! Every handler moves through
//!
//! ```text
//! Uninitialized ──▶ Initializing ──▶ Ready   (formats cached, reused forever)
//!                                 └─▶ Failed  (excluded until clear())
//! ```
//!
//! The cache is the only shared mutable state in the router. Each handler's
//! entry is written exactly once, under a per-entry async gate, so two
//! overlapping requests for a handler that is still initialising wait on the
//! same `init()` call instead of starting a second one.
//!
//! ## Snapshots
//!
//! Running every handler's initialiser at start-up can be slow (codec
//! probing, WASM loading). [`HandlerLifecycleCache::export_snapshot`] dumps the
//! ready entries as an ordered list of `(handler name, formats)` pairs, and
//! [`HandlerLifecycleCache::load_snapshot`] seeds a fresh cache from that dump
//! so seeded handlers are never initialised just to build the catalog.

use crate::error::{ConvertError, HopError};
use crate::format::FormatDescriptor;
use crate::handler::FormatHandler;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::{debug, info, warn};

/// One snapshot entry: handler name and its declared formats.
pub type SnapshotEntry = (String, Vec<FormatDescriptor>);

/// Shared, immutable format list of a ready handler.
pub type FormatList = Arc<[FormatDescriptor]>;

/// Observable lifecycle state of one handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum HandlerState {
    Uninitialized,
    Initializing,
    Ready,
    Failed,
}

#[derive(Debug, Clone)]
enum Slot {
    Uninitialized,
    Initializing,
    Ready(FormatList),
    Failed(String),
}

#[derive(Debug)]
struct Entry {
    gate: tokio::sync::Mutex<()>,
    slot: RwLock<Slot>,
}

impl Entry {
    fn new(slot: Slot) -> Self {
        Self {
            gate: tokio::sync::Mutex::new(()),
            slot: RwLock::new(slot),
        }
    }

    fn read(&self) -> Slot {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn write(&self, slot: Slot) {
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = slot;
    }

    /// `Some` once the handler reached a terminal state.
    fn settled(&self, name: &str) -> Option<Result<FormatList, HopError>> {
        match self.read() {
            Slot::Ready(formats) => Some(Ok(formats)),
            Slot::Failed(detail) => Some(Err(HopError::Init {
                handler: name.to_string(),
                detail,
            })),
            Slot::Uninitialized | Slot::Initializing => None,
        }
    }
}

#[derive(Debug, Default)]
struct Registry {
    order: Vec<String>,
    by_name: HashMap<String, Arc<Entry>>,
}

impl Registry {
    fn get_or_insert(&mut self, name: &str) -> Arc<Entry> {
        if let Some(entry) = self.by_name.get(name) {
            return Arc::clone(entry);
        }
        let entry = Arc::new(Entry::new(Slot::Uninitialized));
        self.order.push(name.to_string());
        self.by_name.insert(name.to_string(), Arc::clone(&entry));
        entry
    }
}

/// Process-wide memo of handler readiness and declared formats.
#[derive(Debug, Default)]
pub struct HandlerLifecycleCache {
    registry: Mutex<Registry>,
}

impl HandlerLifecycleCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a cache whose handlers are already `Ready` with the given formats.
    pub fn from_snapshot(entries: impl IntoIterator<Item = SnapshotEntry>) -> Self {
        let cache = Self::new();
        cache.seed(entries);
        cache
    }

    /// Mark each named handler `Ready` with the given formats.
    ///
    /// Existing entries are overwritten; order of first appearance is kept.
    pub fn seed(&self, entries: impl IntoIterator<Item = SnapshotEntry>) {
        let mut registry = self.lock();
        let mut seeded = 0usize;
        for (name, formats) in entries {
            registry.get_or_insert(&name).write(Slot::Ready(formats.into()));
            seeded += 1;
        }
        debug!("Seeded format cache with {} handlers", seeded);
    }

    /// Read a snapshot file written by [`save_snapshot`](Self::save_snapshot)
    /// and seed a new cache from it.
    pub async fn load_snapshot(path: impl AsRef<Path>) -> Result<Self, ConvertError> {
        let path = path.as_ref();
        let raw = tokio::fs::read(path)
            .await
            .map_err(|e| ConvertError::SnapshotIo {
                path: path.to_path_buf(),
                source: e,
            })?;
        let entries: Vec<SnapshotEntry> =
            serde_json::from_slice(&raw).map_err(|e| ConvertError::SnapshotMalformed {
                detail: e.to_string(),
            })?;
        info!(
            "Loaded format cache snapshot: {} handlers from {}",
            entries.len(),
            path.display()
        );
        Ok(Self::from_snapshot(entries))
    }

    /// Ready entries as an ordered list of `(handler, formats)` pairs.
    pub fn export_snapshot(&self) -> Vec<SnapshotEntry> {
        let registry = self.lock();
        registry
            .order
            .iter()
            .filter_map(|name| match registry.by_name.get(name)?.read() {
                Slot::Ready(formats) => Some((name.clone(), formats.to_vec())),
                _ => None,
            })
            .collect()
    }

    /// Write [`export_snapshot`](Self::export_snapshot) as pretty JSON.
    pub async fn save_snapshot(&self, path: impl AsRef<Path>) -> Result<(), ConvertError> {
        let path = path.as_ref();
        let json = serde_json::to_vec_pretty(&self.export_snapshot())
            .map_err(|e| ConvertError::Internal(format!("snapshot serialisation: {e}")))?;
        tokio::fs::write(path, json)
            .await
            .map_err(|e| ConvertError::SnapshotIo {
                path: path.to_path_buf(),
                source: e,
            })
    }

    /// Return the handler's formats, running its initialiser if needed.
    ///
    /// `init()` runs at most once per entry: a concurrent caller waits on the
    /// entry gate and then reads the settled result. A failed handler stays
    /// failed until [`clear`](Self::clear).
    pub async fn ensure_ready(&self, handler: &dyn FormatHandler) -> Result<FormatList, HopError> {
        let name = handler.name();
        let entry = self.lock().get_or_insert(name);

        if let Some(settled) = entry.settled(name) {
            return settled;
        }

        let _gate = entry.gate.lock().await;
        if let Some(settled) = entry.settled(name) {
            return settled;
        }

        entry.write(Slot::Initializing);
        debug!("Initialising handler '{}'", name);

        match handler.init().await {
            Ok(formats) => {
                info!("Handler '{}' ready with {} formats", name, formats.len());
                let formats: FormatList = formats.into();
                entry.write(Slot::Ready(Arc::clone(&formats)));
                Ok(formats)
            }
            Err(e) => {
                let detail = e.to_string();
                warn!("Handler '{}' failed to initialise: {}", name, detail);
                entry.write(Slot::Failed(detail.clone()));
                Err(HopError::Init {
                    handler: name.to_string(),
                    detail,
                })
            }
        }
    }

    /// Cached formats of a ready handler, without initialising anything.
    pub fn formats(&self, name: &str) -> Option<FormatList> {
        let entry = self.lock().by_name.get(name).cloned()?;
        match entry.read() {
            Slot::Ready(formats) => Some(formats),
            _ => None,
        }
    }

    /// Current lifecycle state of the named handler.
    pub fn state(&self, name: &str) -> HandlerState {
        let Some(entry) = self.lock().by_name.get(name).cloned() else {
            return HandlerState::Uninitialized;
        };
        match entry.read() {
            Slot::Uninitialized => HandlerState::Uninitialized,
            Slot::Initializing => HandlerState::Initializing,
            Slot::Ready(_) => HandlerState::Ready,
            Slot::Failed(_) => HandlerState::Failed,
        }
    }

    /// Failure message of a failed handler.
    pub fn failure(&self, name: &str) -> Option<String> {
        let entry = self.lock().by_name.get(name).cloned()?;
        match entry.read() {
            Slot::Failed(detail) => Some(detail),
            _ => None,
        }
    }

    /// Drop every entry; the next catalog refresh re-initialises all handlers.
    pub fn clear(&self) {
        let mut registry = self.lock();
        info!("Clearing format cache ({} entries)", registry.order.len());
        *registry = Registry::default();
    }

    /// Number of known handlers, in any state.
    pub fn len(&self) -> usize {
        self.lock().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HandlerError;
    use crate::format::FileRecord;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct SlowHandler {
        name: &'static str,
        fail: bool,
        init_calls: AtomicUsize,
    }

    impl SlowHandler {
        fn new(name: &'static str, fail: bool) -> Self {
            Self {
                name,
                fail,
                init_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl FormatHandler for SlowHandler {
        fn name(&self) -> &str {
            self.name
        }

        async fn init(&self) -> Result<Vec<FormatDescriptor>, HandlerError> {
            self.init_calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            if self.fail {
                return Err(HandlerError::Init("codec missing".into()));
            }
            Ok(vec![FormatDescriptor::new("Text", "txt", "txt", "text/plain")
                .readable()
                .writable()])
        }

        async fn convert(
            &self,
            files: Vec<FileRecord>,
            _input: &FormatDescriptor,
            _output: &FormatDescriptor,
            _args: Option<&[String]>,
        ) -> Result<Vec<FileRecord>, HandlerError> {
            Ok(files)
        }
    }

    #[tokio::test]
    async fn overlapping_requests_initialise_once() {
        let cache = HandlerLifecycleCache::new();
        let handler = SlowHandler::new("slow", false);

        let (a, b) = tokio::join!(cache.ensure_ready(&handler), cache.ensure_ready(&handler));

        assert_eq!(handler.init_calls.load(Ordering::SeqCst), 1);
        assert_eq!(a.unwrap().len(), 1);
        assert_eq!(b.unwrap().len(), 1);
        assert_eq!(cache.state("slow"), HandlerState::Ready);
    }

    #[tokio::test]
    async fn failure_is_sticky_until_clear() {
        let cache = HandlerLifecycleCache::new();
        let handler = SlowHandler::new("broken", true);

        let first = cache.ensure_ready(&handler).await.unwrap_err();
        assert!(matches!(first, HopError::Init { .. }));
        assert_eq!(cache.state("broken"), HandlerState::Failed);
        assert_eq!(cache.failure("broken").as_deref(), Some("initialisation failed: codec missing"));

        // A second request does not retry.
        assert!(cache.ensure_ready(&handler).await.is_err());
        assert_eq!(handler.init_calls.load(Ordering::SeqCst), 1);

        cache.clear();
        assert_eq!(cache.state("broken"), HandlerState::Uninitialized);
        assert!(cache.ensure_ready(&handler).await.is_err());
        assert_eq!(handler.init_calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn seeded_handlers_skip_init() {
        let cache = HandlerLifecycleCache::from_snapshot(vec![(
            "slow".to_string(),
            vec![FormatDescriptor::new("Markdown", "md", "md", "text/markdown").readable()],
        )]);
        let handler = SlowHandler::new("slow", false);

        let formats = tokio_test::block_on(cache.ensure_ready(&handler)).unwrap();
        assert_eq!(formats[0].format, "md");
        assert_eq!(handler.init_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn export_keeps_order_and_skips_failed() {
        let cache = HandlerLifecycleCache::new();
        let ok_b = SlowHandler::new("b", false);
        let bad = SlowHandler::new("bad", true);
        let ok_a = SlowHandler::new("a", false);

        tokio_test::block_on(async {
            cache.ensure_ready(&ok_b).await.unwrap();
            let _ = cache.ensure_ready(&bad).await;
            cache.ensure_ready(&ok_a).await.unwrap();
        });

        let names: Vec<String> = cache.export_snapshot().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(cache.len(), 3);
    }

    #[tokio::test]
    async fn snapshot_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");

        let cache = HandlerLifecycleCache::new();
        cache.ensure_ready(&SlowHandler::new("slow", false)).await.unwrap();
        cache.save_snapshot(&path).await.unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.trim_start().starts_with('['), "snapshot is a JSON array: {raw}");

        let loaded = HandlerLifecycleCache::load_snapshot(&path).await.unwrap();
        assert_eq!(loaded.state("slow"), HandlerState::Ready);
        assert_eq!(loaded.export_snapshot(), cache.export_snapshot());
    }

    #[tokio::test]
    async fn malformed_snapshot_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, b"{\"not\": \"a list\"}").unwrap();

        let err = HandlerLifecycleCache::load_snapshot(&path).await.unwrap_err();
        assert!(matches!(err, ConvertError::SnapshotMalformed { .. }));
    }
}
