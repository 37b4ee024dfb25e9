//! Source driver
//!
//! A [`Source`] is a user-supplied object satisfying one of two shapes:
//! `next(driver)` (override [`Source::next_with_driver`] directly) or
//! `next()` (the default `next_with_driver` polls it). The [`Driver`] it's
//! given exposes exactly two operations: [`Driver::yield_store`] and
//! [`Driver::finish`].

use std::collections::HashMap;
use std::sync::Mutex as StdMutex;

use async_trait::async_trait;

use crate::config::Configuration;
use crate::error::Result;
use crate::graph::GraphProxy;
use crate::runtime::RuntimeHandle;
use crate::scheduler::Scheduler;
use crate::store::ProductStore;
use tokio::sync::mpsc;

/// A compiled plugin's module-registration entry point. Dynamic loading
/// itself stays out of scope; this is only the shape a future loader
/// would call.
pub type ModuleInit = fn(&GraphProxy, &Configuration) -> Result<()>;

/// A source plugin's entry point, producing a boxed [`Source`] bound to
/// the given configuration.
pub type SourceInit = fn(&Configuration) -> Result<Box<dyn Source>>;

/// A user-supplied producer of process stores.
#[async_trait]
pub trait Source: Send {
    /// Produce the next store, or `None` once exhausted. Backs the
    /// default [`next_with_driver`](Self::next_with_driver) for sources
    /// that don't need direct driver access.
    async fn next(&mut self) -> Result<Option<ProductStore>> {
        Ok(None)
    }

    /// Drive an entire run. Override this directly for the `next(driver)`
    /// shape; the default implements the `next()`-only shape by polling
    /// it until exhaustion.
    async fn next_with_driver(&mut self, driver: &Driver) -> Result<()> {
        while let Some(store) = self.next().await? {
            driver.yield_store(store).await;
        }
        Ok(())
    }
}

/// Cheap handle into a running [`Scheduler`], used to build a [`Driver`].
#[derive(Clone)]
pub struct DriverFeed {
    pub(crate) sender: mpsc::UnboundedSender<ProductStore>,
    pub(crate) runtime: RuntimeHandle,
}

impl Scheduler {
    /// A lightweight feed into this scheduler, for constructing a [`Driver`].
    pub fn feed(&self) -> DriverFeed {
        DriverFeed {
            sender: self.dispatch_sender(),
            runtime: self.runtime().clone(),
        }
    }
}

/// Drives stores into the graph and closes out open hierarchy levels on
/// completion.
pub struct Driver {
    feed: DriverFeed,
    /// `id -> most recently yielded store at that id`, in first-seen order.
    opened: StdMutex<HashMap<String, ProductStore>>,
    order: StdMutex<Vec<String>>,
}

impl Driver {
    pub fn new(feed: DriverFeed) -> Self {
        Self {
            feed,
            opened: StdMutex::new(HashMap::new()),
            order: StdMutex::new(Vec::new()),
        }
    }

    /// Admit `store` into the graph, respecting back-pressure.
    pub async fn yield_store(&self, store: ProductStore) {
        self.feed.runtime.wait_for_capacity().await;
        self.register_opened(&store);
        let _ = self.feed.sender.send(store);
    }

    /// Record `store` and every ancestor of it as an "open level": a
    /// flush is owed for each of them. A fold partitioned at an ancestor
    /// level (e.g. "job") only ever sees the leaf stores (e.g. "event")
    /// pass through the graph, never the ancestor itself directly, so the
    /// driver must walk the whole chain rather than just the leaf id —
    /// otherwise an ancestor level with no store of its own ever yielded
    /// through the driver would never be flushed.
    fn register_opened(&self, store: &ProductStore) {
        let mut opened = self.opened.lock().unwrap();
        let mut order = self.order.lock().unwrap();
        let mut cursor = Some(store.clone());
        while let Some(s) = cursor {
            let key = s.level_id().to_string();
            if !opened.contains_key(&key) {
                order.push(key.clone());
                opened.insert(key, s.clone());
            }
            cursor = s.immediate_parent();
        }
    }

    /// Emit a flush store for every level this driver opened, deepest
    /// first, then signal graph-wide shutdown.
    pub fn finish(&self) {
        let opened = self.opened.lock().unwrap();
        let mut order = self.order.lock().unwrap().clone();
        order.sort_by_key(|key| {
            std::cmp::Reverse(opened.get(key).map(|s| s.level_id().depth()).unwrap_or(0))
        });
        for key in order {
            if let Some(store) = opened.get(&key) {
                let _ = self.feed.sender.send(store.make_flush());
            }
        }
        self.feed.runtime.signal_shutdown();
    }
}
