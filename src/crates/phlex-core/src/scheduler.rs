//! The concurrent task graph
//!
//! One long-lived `tokio::spawn` task runs per catalog node, pulling
//! arrived stores from its own `mpsc` channel. A central dispatch loop
//! fans every arriving store out to all node channels; each node decides
//! independently whether it is eligible. This is an event-driven model
//! rather than a whole-graph-synchronous superstep driver, behind a
//! scheduler interface that could be swapped for one.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex as StdMutex};

use futures::future::join_all;
use serde_json::Value;
use tokio::sync::{mpsc, Mutex as AsyncMutex, Semaphore};
use tracing::{debug, error, info, instrument, warn};

use crate::catalog::Catalog;
use crate::error::PhlexError;
use crate::node::{Concurrency, Node, NodeError, NodeKind, NodeState};
use crate::runtime::RuntimeHandle;
use crate::store::ProductStore;

/// Outcome of a completed run, returned to the driver for reporting.
#[derive(Debug, Default)]
pub struct RunReport {
    /// Ids (rendered `LevelId`s) for which at least one node invocation failed.
    pub failed_ids: Vec<String>,
    /// Human-readable execution errors, one per failed invocation.
    pub errors: Vec<String>,
}

struct NodeTrackState {
    states: StdMutex<HashMap<String, NodeState>>,
}

impl NodeTrackState {
    fn new() -> Self {
        Self {
            states: StdMutex::new(HashMap::new()),
        }
    }

    /// Mark `id_key` terminal for this node if it wasn't already.
    /// Returns `true` the first time (the caller should act on it).
    fn mark_terminal_once(&self, id_key: &str, state: NodeState) -> bool {
        let mut states = self.states.lock().unwrap();
        if states.contains_key(id_key) {
            return false;
        }
        states.insert(id_key.to_string(), state);
        true
    }

    fn is_terminal(&self, id_key: &str) -> bool {
        self.states.lock().unwrap().contains_key(id_key)
    }
}

/// Shared bookkeeping every node task and the central dispatcher consult.
pub(crate) struct SchedulerState {
    pub(crate) runtime: RuntimeHandle,
    bus: mpsc::UnboundedSender<ProductStore>,
    node_count: usize,
    id_pending: StdMutex<HashMap<String, usize>>,
    failed_ids: StdMutex<HashSet<String>>,
    errors: StdMutex<Vec<String>>,
    fold_state: StdMutex<HashMap<(String, String), Value>>,
    fold_locks: StdMutex<HashMap<(String, String), Arc<AsyncMutex<()>>>>,
}

impl SchedulerState {
    fn record_error(&self, id_key: &str, message: String) {
        self.failed_ids.lock().unwrap().insert(id_key.to_string());
        self.errors.lock().unwrap().push(message);
    }

    fn is_failed(&self, id_key: &str) -> bool {
        self.failed_ids.lock().unwrap().contains(id_key)
    }

    /// Register a fresh id if this is the first time it's been seen, and
    /// admit it for back-pressure accounting.
    fn note_arrival(&self, id_key: &str) {
        let mut pending = self.id_pending.lock().unwrap();
        if !pending.contains_key(id_key) {
            pending.insert(id_key.to_string(), self.node_count);
            self.runtime.enter();
        }
    }

    /// A node reached a terminal outcome for `id_key`; release it once
    /// every node has.
    fn note_terminal(&self, id_key: &str) {
        let mut pending = self.id_pending.lock().unwrap();
        if let Some(count) = pending.get_mut(id_key) {
            *count -= 1;
            if *count == 0 {
                pending.remove(id_key);
                drop(pending);
                self.runtime.leave();
            }
        }
    }

    fn fold_lock(&self, node: &str, partition_key: &str) -> Arc<AsyncMutex<()>> {
        let key = (node.to_string(), partition_key.to_string());
        self.fold_locks
            .lock()
            .unwrap()
            .entry(key)
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    fn publish(&self, store: ProductStore) {
        let _ = self.bus.send(store);
    }
}

/// Resolve `node`'s predicates and inputs against `store`, returning
/// `(predicates_satisfied, Some(inputs))` when every label and predicate
/// resolves, or `(_, None)` when something is still missing (the caller
/// should wait for a later arrival).
///
/// Both predicates and inputs are resolved straight off `store` via
/// [`ProductStore::resolve_product`], which already walks `store`'s own
/// predecessor chain before climbing to ancestors — so a predicate
/// published on a continuation and a plain input carried by the store it
/// continues are both visible from `store` without building a separate
/// "most derived" context. Folding `most_derived` over `store` and each
/// input's resolved owning store is unsound here: a continuation and the
/// store it continues share the same `level_id`/`parent` and are mutually
/// incomparable under `is_ancestor_of` (they're linked only by
/// `predecessor`, which `is_ancestor_of` doesn't walk), so such a fold can
/// discard `store` itself in favor of an older predecessor with no
/// forward visibility into `store`'s own products.
fn resolve(node: &Node, store: &ProductStore) -> Option<(bool, Vec<Value>)> {
    for predicate in &node.predicates {
        match store.resolve_product(predicate) {
            Some(Value::Bool(true)) => {}
            Some(Value::Bool(false)) => return Some((false, Vec::new())),
            Some(_) | None => return None,
        }
    }

    let mut inputs = Vec::with_capacity(node.input_labels.len());
    for label in &node.input_labels {
        inputs.push(store.resolve_product(&label.name)?);
    }
    Some((true, inputs))
}

/// Render a node-execution failure through [`PhlexError::NodeExecution`]
/// so the message text has a single source of truth, same as the
/// registration-error variants in `error.rs`.
fn execution_error(node: &Node, id_key: &str, source: NodeError) -> String {
    PhlexError::NodeExecution {
        node: node.full_name(),
        id: id_key.to_string(),
        source,
    }
    .to_string()
}

#[instrument(skip(node, store, state), fields(node = %node.full_name()))]
async fn handle_process_store(node: &Node, store: ProductStore, state: &Arc<SchedulerState>, tracker: &NodeTrackState) {
    let id_key = store.level_id().to_string();
    if tracker.is_terminal(&id_key) || state.is_failed(&id_key) {
        return;
    }

    let resolution = match resolve(node, &store) {
        Some(r) => r,
        None => {
            debug!(id = %id_key, "inputs not yet resolvable; waiting for more data");
            return;
        }
    };

    let (gated, inputs) = resolution;
    if !gated {
        if tracker.mark_terminal_once(&id_key, NodeState::BlockedOnPredicate) {
            state.note_terminal(&id_key);
        }
        return;
    }

    if !tracker.mark_terminal_once(&id_key, NodeState::Scheduled) {
        return;
    }

    match &node.kind {
        NodeKind::Transform(f) => match f(&inputs) {
            Ok(outputs) => {
                let products = node
                    .output_products
                    .iter()
                    .cloned()
                    .zip(outputs)
                    .collect::<HashMap<_, _>>();
                let continuation = store.make_continuation(node.full_name(), products);
                state.publish(continuation);
            }
            Err(source) => {
                error!(id = %id_key, error = %source, "transform failed");
                state.record_error(&id_key, execution_error(node, &id_key, source));
            }
        },
        NodeKind::Predicate(f) => match f(&inputs) {
            Ok(result) => {
                if let Some(name) = node.output_products.first() {
                    let mut products = HashMap::new();
                    products.insert(name.clone(), Value::Bool(result));
                    state.publish(store.make_continuation(node.full_name(), products));
                }
            }
            Err(source) => {
                error!(id = %id_key, error = %source, "predicate failed");
                state.record_error(&id_key, execution_error(node, &id_key, source));
            }
        },
        NodeKind::Observer(f) => {
            if let Err(source) = f(&inputs) {
                error!(id = %id_key, error = %source, "observer failed");
                state.record_error(&id_key, execution_error(node, &id_key, source));
            }
        }
        NodeKind::Output(f) => {
            if let Err(source) = f(&inputs).await {
                error!(id = %id_key, error = %source, "output failed");
                state.record_error(&id_key, execution_error(node, &id_key, source));
            }
        }
        NodeKind::Fold(fold) => {
            let partition_store = store.parent(&fold.partition).unwrap_or_else(|| store.clone());
            let partition_key = partition_store.level_id().to_string();
            let lock = state.fold_lock(&node.full_name(), &partition_key);
            let _guard = lock.lock().await;
            let key = (node.full_name(), partition_key.clone());
            let current = state
                .fold_state
                .lock()
                .unwrap()
                .get(&key)
                .cloned()
                .unwrap_or_else(|| fold.initial_state.clone());
            match (fold.combiner)(&current, &inputs) {
                Ok(next_state) => {
                    state.fold_state.lock().unwrap().insert(key, next_state);
                }
                Err(source) => {
                    warn!(id = %id_key, partition = %partition_key, error = %source, "fold combiner failed; keeping prior state");
                    state.record_error(&id_key, execution_error(node, &id_key, source));
                }
            }
        }
        NodeKind::Unfold(unfold) => match (unfold.predicate)(&inputs) {
            Ok(true) => match (unfold.generator)(&inputs) {
                Ok(children) => {
                    let mut last = None;
                    for (idx, payload) in children.iter().enumerate() {
                        let child = store.make_child(
                            unfold.destination_data_layer.clone(),
                            idx as u64,
                            node.full_name(),
                            payload.clone(),
                        );
                        state.publish(child.clone());
                        last = Some(child);
                    }
                    let flush_base = last.unwrap_or_else(|| {
                        store.make_child_empty(unfold.destination_data_layer.clone(), children.len() as u64, node.full_name())
                    });
                    state.publish(flush_base.make_flush());
                }
                Err(source) => {
                    error!(id = %id_key, error = %source, "unfold generator failed");
                    state.record_error(&id_key, execution_error(node, &id_key, source));
                }
            },
            Ok(false) => {}
            Err(source) => {
                error!(id = %id_key, error = %source, "unfold predicate failed");
                state.record_error(&id_key, execution_error(node, &id_key, source));
            }
        },
    }

    tracker.states.lock().unwrap().insert(id_key.clone(), NodeState::CompletedForId);
    state.note_terminal(&id_key);
}

#[instrument(skip(node, store, state))]
async fn handle_flush_store(node: &Node, store: ProductStore, state: &Arc<SchedulerState>) {
    let NodeKind::Fold(fold) = &node.kind else {
        return;
    };
    if store.level_id().level_name() != fold.partition {
        return;
    }
    let partition_key = store.level_id().to_string();
    let lock = state.fold_lock(&node.full_name(), &partition_key);
    let _guard = lock.lock().await;
    let key = (node.full_name(), partition_key.clone());
    let final_state = state
        .fold_state
        .lock()
        .unwrap()
        .remove(&key)
        .unwrap_or_else(|| fold.initial_state.clone());

    let outputs = match &fold.finalizer {
        Some(finalizer) => match finalizer(&final_state) {
            Ok(outputs) => outputs,
            Err(source) => {
                error!(partition = %partition_key, error = %source, "fold finalizer failed");
                state.record_error(&partition_key, execution_error(node, &partition_key, source));
                return;
            }
        },
        None => vec![final_state],
    };

    let products = node
        .output_products
        .iter()
        .cloned()
        .zip(outputs)
        .collect::<HashMap<_, _>>();
    // A root-partitioned fold's flush has no parent to continue into (`base()`
    // carries none); publish against the flush store's own id instead so the
    // output is still resolvable by anything downstream of this id.
    let target = store.immediate_parent().unwrap_or_else(|| store.clone());
    state.publish(target.make_continuation(node.full_name(), products));
    info!(partition = %partition_key, "fold finalized");
}

/// Pull every store arriving on this node's channel and hand it to its own
/// spawned task, so that a node with `Concurrency::Bounded(k)` or
/// `Unlimited` actually processes up to `k` (or unboundedly many) stores at
/// once rather than draining its channel one store at a time. The permit,
/// when present, is acquired inside the spawned task — acquiring it in the
/// consumer loop itself would serialize stores behind whichever one is
/// currently holding the single loop iteration.
async fn node_task(
    node: Arc<Node>,
    mut rx: mpsc::UnboundedReceiver<ProductStore>,
    state: Arc<SchedulerState>,
    permits: Option<Arc<Semaphore>>,
) {
    let tracker = Arc::new(NodeTrackState::new());
    let mut in_flight = Vec::new();
    while let Some(store) = rx.recv().await {
        let node = node.clone();
        let state = state.clone();
        let tracker = tracker.clone();
        let permits = permits.clone();
        in_flight.push(tokio::spawn(async move {
            let _permit = match &permits {
                Some(sem) => Some(sem.clone().acquire_owned().await.expect("semaphore never closed")),
                None => None,
            };
            if store.is_flush() {
                handle_flush_store(&node, store, &state).await;
            } else {
                handle_process_store(&node, store, &state, &tracker).await;
            }
        }));
    }
    for handle in join_all(in_flight).await {
        if let Err(join_error) = handle {
            error!(error = %join_error, "node store task panicked");
        }
    }
}

/// Wires up one `tokio::spawn` task per node plus the central dispatch
/// loop, and exposes a handle to feed stores in and await completion.
pub struct Scheduler {
    state: Arc<SchedulerState>,
    dispatch_tx: mpsc::UnboundedSender<ProductStore>,
    node_senders: Vec<mpsc::UnboundedSender<ProductStore>>,
    node_handles: Vec<tokio::task::JoinHandle<()>>,
    dispatch_handle: tokio::task::JoinHandle<()>,
}

impl Scheduler {
    pub fn spawn(catalog: &Arc<Catalog>, runtime: RuntimeHandle) -> Self {
        let nodes = catalog.nodes();
        let (bus_tx, mut bus_rx) = mpsc::unbounded_channel::<ProductStore>();
        let (dispatch_tx, mut dispatch_rx) = mpsc::unbounded_channel::<ProductStore>();

        let state = Arc::new(SchedulerState {
            runtime,
            bus: bus_tx.clone(),
            node_count: nodes.len().max(1),
            id_pending: StdMutex::new(HashMap::new()),
            failed_ids: StdMutex::new(HashSet::new()),
            errors: StdMutex::new(Vec::new()),
            fold_state: StdMutex::new(HashMap::new()),
            fold_locks: StdMutex::new(HashMap::new()),
        });

        let mut node_senders = Vec::with_capacity(nodes.len());
        let mut node_handles = Vec::with_capacity(nodes.len());
        for node in &nodes {
            let (tx, rx) = mpsc::unbounded_channel();
            let permits = node.concurrency.permits().map(|n| Arc::new(Semaphore::new(n)));
            node_senders.push(tx);
            node_handles.push(tokio::spawn(node_task(node.clone(), rx, state.clone(), permits)));
        }

        // Forward `dispatch_rx` (external arrivals) into the shared bus so
        // node-produced continuations/children flow through the same path.
        let forward_tx = bus_tx.clone();
        tokio::spawn(async move {
            while let Some(store) = dispatch_rx.recv().await {
                let _ = forward_tx.send(store);
            }
        });

        let fanout_state = state.clone();
        let fanout_senders = node_senders.clone();
        let dispatch_handle = tokio::spawn(async move {
            while let Some(store) = bus_rx.recv().await {
                if !store.is_flush() {
                    fanout_state.note_arrival(&store.level_id().to_string());
                }
                let _ = join_all(fanout_senders.iter().map(|tx| {
                    let store = store.clone();
                    let tx = tx.clone();
                    async move {
                        let _ = tx.send(store);
                    }
                }))
                .await;
            }
        });

        Self {
            state,
            dispatch_tx,
            node_senders,
            node_handles,
            dispatch_handle,
        }
    }

    /// Feed a store (seeded by the driver, or the very first process
    /// store of a run) into the graph.
    pub fn submit(&self, store: ProductStore) {
        let _ = self.dispatch_tx.send(store);
    }

    pub fn runtime(&self) -> &RuntimeHandle {
        &self.state.runtime
    }

    pub(crate) fn dispatch_sender(&self) -> mpsc::UnboundedSender<ProductStore> {
        self.dispatch_tx.clone()
    }

    /// Close all channels and wait for every node task to drain and exit.
    pub async fn shutdown(self) -> RunReport {
        drop(self.dispatch_tx);
        // Let in-flight fanout drain before dropping the per-node senders.
        let _ = self.dispatch_handle.await;
        drop(self.node_senders);
        for handle in join_all(self.node_handles).await {
            if let Err(join_error) = handle {
                error!(error = %join_error, "node task panicked");
            }
        }
        let failed_ids: Vec<String> = self.state.failed_ids.lock().unwrap().iter().cloned().collect();
        let errors = self.state.errors.lock().unwrap().clone();
        RunReport { failed_ids, errors }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::graph::GraphProxy;
    use crate::runtime::RuntimeHandle;
    use serde_json::json;
    use std::collections::HashMap as StdHashMap;

    #[tokio::test]
    async fn transform_publishes_a_continuation_the_bus_forwards_to_other_nodes() {
        let proxy = GraphProxy::new();
        let captured = Arc::new(StdMutex::new(Vec::new()));
        let sink = captured.clone();
        let _ = proxy
            .transform("p", "double", Concurrency::Unlimited, 1, Arc::new(|inputs: &[Value]| Ok(vec![json!(inputs[0].as_i64().unwrap_or(0) * 2)])))
            .input_family(["x"])
            .output_products(["y"]);
        let _ = proxy
            .observe("p", "capture", Concurrency::Unlimited, 1, Arc::new(move |inputs: &[Value]| {
                sink.lock().unwrap().push(inputs[0].clone());
                Ok(())
            }))
            .input_family(["y"]);

        let catalog: Arc<Catalog> = proxy.catalog().clone();
        assert!(!catalog.has_errors());
        let runtime = RuntimeHandle::new(crate::runtime::RuntimeConfig::default());
        let scheduler = Scheduler::spawn(&catalog, runtime);

        let mut products = StdHashMap::new();
        products.insert("x".to_string(), json!(4));
        scheduler.submit(ProductStore::base().make_child("event", 0, "test", products));

        // Give the dispatch/fanout loop a turn to settle before shutting down.
        tokio::task::yield_now().await;
        let report = scheduler.shutdown().await;

        assert!(report.errors.is_empty());
        assert_eq!(*captured.lock().unwrap(), vec![json!(8)]);
    }
}
