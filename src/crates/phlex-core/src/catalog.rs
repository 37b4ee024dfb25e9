//! Node catalog
//!
//! The catalog is the single source of truth for what has been
//! registered: a `full_name -> node` map, a `product_name -> producers`
//! index used to resolve declaration-time labels, and a shared vector of
//! human-readable registration errors. Errors accumulate instead of
//! raising immediately, so a whole declaration batch can be reported
//! together before execution is refused.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::name::{AlgorithmName, SpecifiedLabel};
use crate::node::{Node, NodeKind};

/// Registered nodes plus the indices needed to resolve labels against them.
pub struct Catalog {
    nodes: RwLock<HashMap<String, Arc<Node>>>,
    /// `product_name -> full_names of nodes that publish it`.
    producers: RwLock<HashMap<String, Vec<String>>>,
    errors: Mutex<Vec<String>>,
    next_order: AtomicUsize,
}

impl Catalog {
    pub fn new() -> Self {
        Self {
            nodes: RwLock::new(HashMap::new()),
            producers: RwLock::new(HashMap::new()),
            errors: Mutex::new(Vec::new()),
            next_order: AtomicUsize::new(0),
        }
    }

    /// The next registration-order index, consumed once per built node so
    /// dispatch ordering among nodes eligible for the same store is
    /// deterministic.
    pub fn next_registration_order(&self) -> usize {
        self.next_order.fetch_add(1, Ordering::SeqCst)
    }

    /// Append a human-readable registration error.
    pub fn record_error(&self, message: impl Into<String>) {
        self.errors.lock().unwrap().push(message.into());
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.lock().unwrap().is_empty()
    }

    /// Insert a built node. A duplicate full name is rejected: the
    /// existing entry is kept, and exactly one duplicate-registration
    /// error is recorded. A node whose output products collide with an
    /// already-registered node's outputs is also rejected outright —
    /// `spec.md` §3 requires output names to stay disjoint across nodes.
    pub fn register(&self, node: Node) {
        let full_name = node.full_name();
        let mut nodes = self.nodes.write().unwrap();
        if nodes.contains_key(&full_name) {
            drop(nodes);
            self.record_error(crate::error::PhlexError::DuplicateRegistration(full_name).to_string());
            return;
        }

        let producers = self.producers.read().unwrap();
        for product in &node.output_products {
            if let Some(existing) = producers.get(product).and_then(|names| names.first()) {
                let message = crate::error::PhlexError::DuplicateOutputProduct {
                    product: product.clone(),
                    existing: existing.clone(),
                    node: full_name.clone(),
                }
                .to_string();
                drop(producers);
                self.record_error(message);
                return;
            }
        }
        drop(producers);

        let mut producers = self.producers.write().unwrap();
        for product in &node.output_products {
            producers.entry(product.clone()).or_default().push(full_name.clone());
        }
        drop(producers);
        nodes.insert(full_name, Arc::new(node));
    }

    pub fn get(&self, full_name: &str) -> Option<Arc<Node>> {
        self.nodes.read().unwrap().get(full_name).cloned()
    }

    /// All registered nodes, ordered by registration order (deterministic
    /// iteration for the scheduler and for tests).
    pub fn nodes(&self) -> Vec<Arc<Node>> {
        let mut nodes: Vec<Arc<Node>> = self.nodes.read().unwrap().values().cloned().collect();
        nodes.sort_by_key(|n| n.registration_order);
        nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Full names of nodes that publish `product`, optionally narrowed to
    /// a specific producer qualifier.
    pub fn producers_of(&self, label: &SpecifiedLabel) -> Vec<String> {
        let producers = self.producers.read().unwrap();
        let candidates = match producers.get(&label.name) {
            Some(names) => names.clone(),
            None => return Vec::new(),
        };
        drop(producers);
        match &label.qualifier {
            None => candidates,
            Some(qualifier) => {
                let nodes = self.nodes.read().unwrap();
                candidates
                    .into_iter()
                    .filter(|full_name| {
                        nodes
                            .get(full_name)
                            .map(|n| n.algorithm_name.matches(qualifier))
                            .unwrap_or(false)
                    })
                    .collect()
            }
        }
    }

    /// Full names of *predicate* nodes that publish `name`, used to
    /// validate a `when(...)` reference.
    pub fn predicate_producers_of(&self, name: &str) -> Vec<String> {
        let label = SpecifiedLabel::bare(name);
        self.producers_of(&label)
            .into_iter()
            .filter(|full_name| {
                self.get(full_name)
                    .map(|n| matches!(n.kind, NodeKind::Predicate(_)))
                    .unwrap_or(false)
            })
            .collect()
    }

    /// `true` if any node in the catalog has the fully specified name
    /// `algorithm_name` — used by the registrar to detect a duplicate
    /// before eagerly reporting a more specific error.
    pub fn contains_name(&self, algorithm_name: &AlgorithmName) -> bool {
        algorithm_name
            .full_name()
            .map(|full_name| self.nodes.read().unwrap().contains_key(&full_name))
            .unwrap_or(false)
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Concurrency, NodeKind};
    use std::sync::Arc as StdArc;

    fn observer_node(order: usize, plugin: &str, algorithm: &str, outputs: Vec<&str>) -> Node {
        Node {
            algorithm_name: AlgorithmName::new(plugin, algorithm),
            input_labels: Vec::new(),
            predicates: Vec::new(),
            output_products: outputs.into_iter().map(String::from).collect(),
            concurrency: Concurrency::Unlimited,
            kind: NodeKind::Observer(StdArc::new(|_| Ok(()))),
            registration_order: order,
        }
    }

    #[test]
    fn duplicate_registration_yields_one_entry_and_one_error() {
        let catalog = Catalog::new();
        catalog.register(observer_node(0, "p", "a", vec!["x"]));
        catalog.register(observer_node(1, "p", "a", vec!["y"]));
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.errors().len(), 1);
        // first registration wins: "x" is still the producer, "y" is not
        assert_eq!(catalog.producers_of(&SpecifiedLabel::bare("x")).len(), 1);
        assert!(catalog.producers_of(&SpecifiedLabel::bare("y")).is_empty());
    }

    #[test]
    fn qualified_label_narrows_to_matching_producer() {
        let catalog = Catalog::new();
        catalog.register(observer_node(0, "plugin_a", "double", vec!["y"]));
        let bare = catalog.producers_of(&SpecifiedLabel::bare("y"));
        assert_eq!(bare, vec!["plugin_a:double".to_string()]);
        let qualified = catalog.producers_of(&SpecifiedLabel::parse("plugin_a:double:y"));
        assert_eq!(qualified, vec!["plugin_a:double".to_string()]);
        // A qualifier naming a plugin that never published "y" narrows to nothing.
        let mismatched = catalog.producers_of(&SpecifiedLabel::parse("plugin_b:double:y"));
        assert!(mismatched.is_empty());
    }

    #[test]
    fn duplicate_output_product_is_rejected() {
        let catalog = Catalog::new();
        catalog.register(observer_node(0, "plugin_a", "double", vec!["y"]));
        catalog.register(observer_node(1, "plugin_b", "triple", vec!["y"]));
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.errors().len(), 1);
        assert!(catalog.errors()[0].contains("already published"));
        // the first registration's producer index is untouched
        assert_eq!(catalog.producers_of(&SpecifiedLabel::bare("y")), vec!["plugin_a:double".to_string()]);
    }
}
