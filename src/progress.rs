//! Progress-callback trait for routing and per-hop conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConverterConfigBuilder::progress_callback`] to receive
//! events as the router tries candidate paths and drives each hop.
//!
//! The hooks fire at the same points where the router yields to the runtime,
//! so a terminal spinner or a UI channel stays live during long chains.
//!
//! # Example
//!
//! ```rust
//! use edgequake_anyconv::{ConversionProgressCallback, ConverterConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct HopCounter {
//!     hops: AtomicUsize,
//! }
//!
//! impl ConversionProgressCallback for HopCounter {
//!     fn on_hop_complete(&self, _hop: usize, _total: usize, handler: &str) {
//!         let n = self.hops.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("hop {n} done by {handler}");
//!     }
//! }
//!
//! let config = ConverterConfig::builder()
//!     .progress_callback(Arc::new(HopCounter { hops: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the router while it searches and executes paths.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once per file before the first candidate path is requested.
    fn on_route_start(&self, from: &str, to: &str) {
        let _ = (from, to);
    }

    /// Called before each candidate path is executed.
    ///
    /// # Arguments
    /// * `attempt` — 1-indexed attempt number
    /// * `path`    — human-readable rendering of the path
    fn on_path_attempt(&self, attempt: usize, path: &str) {
        let _ = (attempt, path);
    }

    /// Called just before a hop's handler is invoked.
    ///
    /// # Arguments
    /// * `hop`     — 1-indexed hop number within the current path
    /// * `total`   — hops in the current path
    /// * `handler` — handler name
    /// * `from`    — input format code
    /// * `to`      — output format code
    fn on_hop_start(&self, hop: usize, total: usize, handler: &str, from: &str, to: &str) {
        let _ = (hop, total, handler, from, to);
    }

    /// Called when a hop produced valid output.
    fn on_hop_complete(&self, hop: usize, total: usize, handler: &str) {
        let _ = (hop, total, handler);
    }

    /// Called when a candidate path is abandoned.
    fn on_path_failed(&self, attempt: usize, error: &str) {
        let _ = (attempt, error);
    }

    /// Called once per file after routing finished.
    ///
    /// # Arguments
    /// * `success`  — whether a path succeeded
    /// * `attempts` — number of paths executed
    fn on_route_complete(&self, success: bool, attempts: usize) {
        let _ = (success, attempts);
    }

    /// Called before each file of a batch is routed.
    fn on_file_start(&self, index: usize, total: usize, name: &str) {
        let _ = (index, total, name);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConverterConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        attempts: AtomicUsize,
        hops_started: AtomicUsize,
        hops_done: AtomicUsize,
        failures: AtomicUsize,
    }

    impl ConversionProgressCallback for TrackingCallback {
        fn on_path_attempt(&self, _attempt: usize, _path: &str) {
            self.attempts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_hop_start(&self, _hop: usize, _total: usize, _handler: &str, _from: &str, _to: &str) {
            self.hops_started.fetch_add(1, Ordering::SeqCst);
        }

        fn on_hop_complete(&self, _hop: usize, _total: usize, _handler: &str) {
            self.hops_done.fetch_add(1, Ordering::SeqCst);
        }

        fn on_path_failed(&self, _attempt: usize, _error: &str) {
            self.failures.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_route_start("png", "jpeg");
        cb.on_path_attempt(1, "png → jpeg");
        cb.on_hop_start(1, 1, "image", "png", "jpeg");
        cb.on_hop_complete(1, 1, "image");
        cb.on_path_failed(1, "boom");
        cb.on_route_complete(false, 1);
        cb.on_file_start(0, 1, "a.png");
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();

        tracker.on_path_attempt(1, "a → b → c");
        tracker.on_hop_start(1, 2, "h1", "a", "b");
        tracker.on_hop_complete(1, 2, "h1");
        tracker.on_hop_start(2, 2, "h2", "b", "c");
        tracker.on_path_failed(1, "h2 failed");

        assert_eq!(tracker.attempts.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.hops_started.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.hops_done.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.failures.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_route_start("txt", "html");
        cb.on_route_complete(true, 1);
    }
}
