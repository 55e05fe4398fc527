//! Progress-callback trait for pipeline events.
//!
//! Inject an [`Arc<dyn CompileProgressCallback>`] via
//! [`crate::config::ServiceConfigBuilder::progress_callback`] to observe each
//! compiler pass, each image resolution and the encryption step.
//!
//! # Example
//!
//! ```rust
//! use qp2pdf::{CompileProgressCallback, ServiceConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     passes: AtomicUsize,
//! }
//!
//! impl CompileProgressCallback for CountingCallback {
//!     fn on_attempt_start(&self, attempt: u32, max_attempts: u32) {
//!         let n = self.passes.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("pass {attempt}/{max_attempts} (#{n})");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { passes: AtomicUsize::new(0) });
//!
//! let config = ServiceConfig::builder()
//!     .progress_callback(counter as Arc<dyn CompileProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the pipeline as it works through a request.
///
/// Implementations must be `Send + Sync`: image callbacks fire from
/// concurrently running download futures. All methods have default no-op
/// implementations so callers only override what they care about.
pub trait CompileProgressCallback: Send + Sync {
    /// Called just before the compiler is spawned.
    ///
    /// # Arguments
    /// * `attempt`: 1-indexed pass number
    /// * `max_attempts`: configured number of passes
    fn on_attempt_start(&self, attempt: u32, max_attempts: u32) {
        let _ = (attempt, max_attempts);
    }

    /// Called when a compiler pass exits (not called on timeout).
    ///
    /// # Arguments
    /// * `attempt`: 1-indexed pass number
    /// * `exit_code`: process exit code, `None` if killed by a signal
    fn on_attempt_complete(&self, attempt: u32, exit_code: Option<i32>) {
        let _ = (attempt, exit_code);
    }

    /// Called when an image has been written to the workspace.
    fn on_image_resolved(&self, name: &str, bytes: usize) {
        let _ = (name, bytes);
    }

    /// Called when an image could not be resolved.
    fn on_image_failed(&self, name: &str, reason: String) {
        let _ = (name, reason);
    }

    /// Called after the encryption step.
    ///
    /// # Arguments
    /// * `tool`: the tool that encrypted the artifact, `None` if it was
    ///   returned unprotected
    fn on_protect(&self, tool: Option<&str>) {
        let _ = tool;
    }
}

/// A no-op implementation for callers that don't need progress events.
///
/// This is the default when no callback is configured.
pub struct NoopProgressCallback;

impl CompileProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ServiceConfig`].
pub type ProgressCallback = Arc<dyn CompileProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        failed_images: Mutex<Vec<String>>,
        protected_with: Mutex<Option<String>>,
    }

    impl CompileProgressCallback for TrackingCallback {
        fn on_attempt_start(&self, _attempt: u32, _max_attempts: u32) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_attempt_complete(&self, _attempt: u32, _exit_code: Option<i32>) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_image_failed(&self, name: &str, _reason: String) {
            self.failed_images.lock().unwrap().push(name.to_string());
        }

        fn on_protect(&self, tool: Option<&str>) {
            *self.protected_with.lock().unwrap() = tool.map(str::to_string);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_attempt_start(1, 2);
        cb.on_attempt_complete(1, Some(1));
        cb.on_image_resolved("logo.png", 42);
        cb.on_image_failed("logo.png", "HTTP 404".into());
        cb.on_protect(None);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();

        tracker.on_attempt_start(1, 2);
        tracker.on_attempt_complete(1, Some(1));
        tracker.on_attempt_start(2, 2);
        tracker.on_attempt_complete(2, Some(0));
        tracker.on_image_failed("fig1.png", "timeout".into());
        tracker.on_protect(Some("qpdf"));

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 2);
        assert_eq!(*tracker.failed_images.lock().unwrap(), vec!["fig1.png"]);
        assert_eq!(tracker.protected_with.lock().unwrap().as_deref(), Some("qpdf"));
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: Arc<dyn CompileProgressCallback> = Arc::new(NoopProgressCallback);
        cb.on_attempt_start(1, 2);
        cb.on_protect(Some("pdftk"));
    }
}
