//! Runtime knobs: shutdown signalling and back-pressure watermarks
//!
//! A small, cloneable context handle threaded through every spawned task
//! rather than a global singleton.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

/// Concurrency and back-pressure settings shared by every node task in a
/// running [`crate::graph::FlowGraph`].
#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    /// Default per-node concurrency permits when a node doesn't override it.
    pub default_concurrency: usize,
    /// In-flight store count above which the scheduler stops admitting new
    /// stores from the source (the high water mark).
    pub high_water_mark: usize,
    /// In-flight store count at or below which admission resumes.
    pub low_water_mark: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            default_concurrency: 4,
            high_water_mark: 1024,
            low_water_mark: 256,
        }
    }
}

/// Shared, cloneable handle used by the scheduler to coordinate shutdown
/// and back-pressure across all node tasks.
#[derive(Clone)]
pub struct RuntimeHandle {
    config: RuntimeConfig,
    shutdown: Arc<AtomicBool>,
    in_flight: Arc<AtomicUsize>,
    capacity: Arc<Notify>,
}

impl RuntimeHandle {
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            config,
            shutdown: Arc::new(AtomicBool::new(false)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            capacity: Arc::new(Notify::new()),
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Signal every node task to stop pulling new work and drain.
    pub fn signal_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.capacity.notify_waiters();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Record that a store has been admitted into the graph.
    pub fn enter(&self) {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
    }

    /// Record that a store has fully drained out of the graph (including
    /// its flush sentinel). Wakes anyone waiting on back-pressure.
    pub fn leave(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.capacity.notify_waiters();
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// `true` once in-flight count has crossed the high water mark — the
    /// source should stop producing until [`under_low_water_mark`](Self::under_low_water_mark).
    pub fn over_high_water_mark(&self) -> bool {
        self.in_flight() >= self.config.high_water_mark
    }

    pub fn under_low_water_mark(&self) -> bool {
        self.in_flight() <= self.config.low_water_mark
    }

    /// Wait until back-pressure has relaxed or shutdown was signalled.
    pub async fn wait_for_capacity(&self) {
        while self.over_high_water_mark() && !self.is_shutting_down() {
            self.capacity.notified().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn high_and_low_water_marks_bracket_admission() {
        let handle = RuntimeHandle::new(RuntimeConfig {
            default_concurrency: 1,
            high_water_mark: 2,
            low_water_mark: 1,
        });
        assert!(!handle.over_high_water_mark());
        handle.enter();
        handle.enter();
        assert!(handle.over_high_water_mark());
        handle.leave();
        assert!(handle.under_low_water_mark());
    }

    #[test]
    fn signal_shutdown_is_observable() {
        let handle = RuntimeHandle::new(RuntimeConfig::default());
        assert!(!handle.is_shutting_down());
        handle.signal_shutdown();
        assert!(handle.is_shutting_down());
    }
}
