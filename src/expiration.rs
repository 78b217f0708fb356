//! Periodic maintenance task.
//!
//! A "stop flag + joinable handle" pair; the sweeper runs as a `tokio` task
//! and shutdown joins it with a bounded timeout rather than blocking
//! forever.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::sketch::FrequencySketch;
use crate::store::Store;
use std::hash::Hash;

const MAINTENANCE_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle for the background maintenance task. Dropping it leaves the task
/// running; call [`MaintenanceHandle::shutdown`] to stop it deterministically.
pub(crate) struct MaintenanceHandle {
    stop: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl MaintenanceHandle {
    pub fn spawn<K, V>(store: Arc<Store<K, V>>, sketch: Option<Arc<FrequencySketch>>, interval: Duration) -> Self
    where
        K: Eq + Hash + Clone + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_task = Arc::clone(&stop);

        let join = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // first tick fires immediately; skip it
            loop {
                ticker.tick().await;
                if stop_task.load(Ordering::Acquire) {
                    break;
                }
                let purged = store.purge_expired();
                if purged > 0 {
                    tracing::debug!(purged, "maintenance sweep purged expired entries");
                }
                if let Some(sketch) = &sketch {
                    // Aging normally happens inline once W increments are
                    // recorded; the sweep is a backstop for low-traffic
                    // caches that would otherwise never age.
                    sketch.age();
                }
            }
        });

        MaintenanceHandle {
            stop,
            join: Some(join),
        }
    }

    /// Signals the task to stop and waits up to 5 seconds for it to exit.
    /// A task that doesn't exit in time is abandoned (best-effort) rather
    /// than blocking shutdown indefinitely.
    pub async fn shutdown(mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(join) = self.join.take() {
            let _ = tokio::time::timeout(MAINTENANCE_JOIN_TIMEOUT, join).await;
        }
    }
}

impl Drop for MaintenanceHandle {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(join) = self.join.take() {
            join.abort();
        }
    }
}
