//! Algorithm nodes
//!
//! A [`Node`] wraps one of six behaviors behind a single tagged-variant
//! type rather than a type-erased template instantiation. User callbacks
//! are stored as `Arc<dyn Fn(...) + Send + Sync>` boxed closures.

use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;

use crate::name::AlgorithmName;

/// Boxed error returned by user closures; wrapped into
/// [`crate::error::PhlexError::NodeExecution`] by the scheduler.
pub type NodeError = Box<dyn StdError + Send + Sync>;

/// A pure function of resolved input products to a tuple of outputs.
pub type TransformFn = Arc<dyn Fn(&[Value]) -> Result<Vec<Value>, NodeError> + Send + Sync>;

/// A pure function of resolved input products to a boolean gate.
pub type PredicateFn = Arc<dyn Fn(&[Value]) -> Result<bool, NodeError> + Send + Sync>;

/// A side-effecting function of resolved input products; never publishes.
pub type ObserverFn = Arc<dyn Fn(&[Value]) -> Result<(), NodeError> + Send + Sync>;

/// `state ⊕ inputs → state`, serialized per partition key by the scheduler.
pub type FoldCombiner = Arc<dyn Fn(&Value, &[Value]) -> Result<Value, NodeError> + Send + Sync>;

/// `state → outputs`, run once at partition flush.
pub type FoldFinalizer = Arc<dyn Fn(&Value) -> Result<Vec<Value>, NodeError> + Send + Sync>;

/// Selects which parent stores an unfold should expand.
pub type UnfoldPredicate = Arc<dyn Fn(&[Value]) -> Result<bool, NodeError> + Send + Sync>;

/// Produces the per-child product maps for one parent store.
pub type UnfoldGenerator = Arc<dyn Fn(&[Value]) -> Result<Vec<HashMap<String, Value>>, NodeError> + Send + Sync>;

/// A future-returning persistence call.
pub type OutputFn = Arc<
    dyn Fn(&[Value]) -> Pin<Box<dyn Future<Output = Result<(), NodeError>> + Send>> + Send + Sync,
>;

/// Per-node concurrency budget.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Concurrency {
    /// Exactly one in-flight invocation at a time.
    Serial,
    /// Up to `n` concurrent invocations.
    Bounded(usize),
    /// No permit is acquired at all.
    Unlimited,
}

impl Concurrency {
    /// The semaphore size this budget implies, or `None` for `Unlimited`
    /// (meaning: don't create a semaphore at all).
    pub fn permits(self) -> Option<usize> {
        match self {
            Concurrency::Serial => Some(1),
            Concurrency::Bounded(n) => Some(n),
            Concurrency::Unlimited => None,
        }
    }
}

/// Fold-specific parameters.
pub struct FoldSpec {
    /// Level name identifying the partition grouping key.
    pub partition: String,
    pub initial_state: Value,
    pub combiner: FoldCombiner,
    pub finalizer: Option<FoldFinalizer>,
}

/// Unfold-specific parameters.
pub struct UnfoldSpec {
    pub destination_data_layer: String,
    pub predicate: UnfoldPredicate,
    pub generator: UnfoldGenerator,
}

/// The tagged variant for a node's behavior.
pub enum NodeKind {
    Transform(TransformFn),
    Predicate(PredicateFn),
    Observer(ObserverFn),
    Fold(FoldSpec),
    Unfold(UnfoldSpec),
    Output(OutputFn),
}

impl NodeKind {
    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::Transform(_) => "transform",
            NodeKind::Predicate(_) => "predicate",
            NodeKind::Observer(_) => "observer",
            NodeKind::Fold(_) => "fold",
            NodeKind::Unfold(_) => "unfold",
            NodeKind::Output(_) => "output",
        }
    }
}

/// A registered algorithm: shared attributes plus its behavior.
///
/// `(full_name, graph)` must be unique and output names must be disjoint
/// across nodes — both are enforced by [`crate::catalog::Catalog`], not
/// here; `Node` itself is a passive value once built.
pub struct Node {
    pub algorithm_name: AlgorithmName,
    /// Ordered input labels; length is this node's arity.
    pub input_labels: Vec<crate::name::SpecifiedLabel>,
    /// Names of predicate products gating this node (the `when(...)` set).
    pub predicates: Vec<String>,
    /// Product names this node publishes. Empty for predicate/observer/output.
    pub output_products: Vec<String>,
    pub concurrency: Concurrency,
    pub kind: NodeKind,
    /// Registration order, used for deterministic dispatch ordering among
    /// nodes eligible against the same store.
    pub registration_order: usize,
}

impl Node {
    pub fn full_name(&self) -> String {
        self.algorithm_name
            .full_name()
            .unwrap_or_else(|| self.algorithm_name.to_string())
    }

    pub fn arity(&self) -> usize {
        self.input_labels.len()
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("full_name", &self.full_name())
            .field("kind", &self.kind.label())
            .field("arity", &self.arity())
            .field("predicates", &self.predicates)
            .field("output_products", &self.output_products)
            .finish()
    }
}

/// Per-node, per-id execution state in a node's dispatch state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeState {
    Idle,
    Scheduled,
    Running,
    BlockedOnPredicate,
    BlockedOnConcurrency,
    CompletedForId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlimited_concurrency_has_no_permit_count() {
        assert_eq!(Concurrency::Unlimited.permits(), None);
        assert_eq!(Concurrency::Serial.permits(), Some(1));
        assert_eq!(Concurrency::Bounded(4).permits(), Some(4));
    }

    #[test]
    fn node_kind_label_matches_variant() {
        let kind = NodeKind::Observer(Arc::new(|_: &[Value]| Ok(())));
        assert_eq!(kind.label(), "observer");
    }
}
