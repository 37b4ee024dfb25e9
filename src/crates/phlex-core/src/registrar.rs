//! Deferred-construction registrar
//!
//! A [`Registrar`] is the scoped builder returned by every declaration
//! chain. It fires its captured creator exactly once —
//! on an explicit [`Registrar::build`] or, failing that, on [`Drop`] —
//! so that every fluent option (`when`, `output_products`) preceding the
//! statement terminator has been observed before the node is installed.
//! `Registrar` is intentionally not `Clone`: there must be exactly one
//! destructor responsible for firing the creator.

use std::sync::Arc;

use crate::catalog::Catalog;
use crate::error::PhlexError;
use crate::name::{AlgorithmName, SpecifiedLabel};
use crate::node::{Concurrency, Node, NodeKind};

fn label_display(label: &SpecifiedLabel) -> String {
    match &label.qualifier {
        None => label.name.clone(),
        Some(qualifier) => format!("{qualifier}:{}", label.name),
    }
}

type Creator = Box<dyn FnOnce(Vec<String>, Vec<String>) + Send>;

/// Returned by `GraphProxy::transform`/`predicate`/`fold`/`unfold`/
/// `observe`/`output` before input labels are known. Not yet a
/// `Registrar`: arity is checked as soon as `input_family` supplies the
/// label count.
pub struct NodeBuilder {
    pub(crate) catalog: Arc<Catalog>,
    pub(crate) algorithm_name: AlgorithmName,
    pub(crate) concurrency: Concurrency,
    pub(crate) expected_arity: usize,
    pub(crate) kind: NodeKind,
}

impl NodeBuilder {
    /// Supply the ordered input labels for this node, fixing its arity.
    pub fn input_family<I, L>(self, labels: I) -> Registrar
    where
        I: IntoIterator<Item = L>,
        L: Into<SpecifiedLabel>,
    {
        let labels: Vec<SpecifiedLabel> = labels.into_iter().map(Into::into).collect();
        let catalog = self.catalog;
        let algorithm_name = self.algorithm_name;
        let full_name = algorithm_name
            .full_name()
            .unwrap_or_else(|| algorithm_name.to_string());
        let expected_arity = self.expected_arity;
        let actual = labels.len();
        let concurrency = self.concurrency;
        let kind = self.kind;

        let creator: Creator = Box::new(move |predicates, outputs| {
            if actual != expected_arity {
                catalog.record_error(
                    PhlexError::ArityMismatch {
                        node: full_name.clone(),
                        expected: expected_arity,
                        actual,
                    }
                    .to_string(),
                );
                return;
            }
            for label in &labels {
                match (catalog.producers_of(label).len(), &label.qualifier) {
                    // A bare label with no registered producer is allowed: it
                    // may be seeded externally (e.g. by the source driver)
                    // rather than published by any catalog node. Only a
                    // qualified label makes a concrete claim ("this exact
                    // producer exists") that's checkable at registration time.
                    (0, None) => {}
                    (0, Some(_)) => {
                        catalog.record_error(
                            PhlexError::MissingProducer {
                                node: full_name.clone(),
                                label: label_display(label),
                            }
                            .to_string(),
                        );
                        return;
                    }
                    (1, _) => {}
                    (n, _) => {
                        catalog.record_error(
                            PhlexError::AmbiguousProducer {
                                node: full_name.clone(),
                                label: label_display(label),
                                count: n,
                            }
                            .to_string(),
                        );
                        return;
                    }
                }
            }
            for predicate in &predicates {
                if catalog.predicate_producers_of(predicate).is_empty() {
                    catalog.record_error(
                        PhlexError::UnknownPredicate {
                            node: full_name.clone(),
                            predicate: predicate.clone(),
                        }
                        .to_string(),
                    );
                    return;
                }
            }
            let registration_order = catalog.next_registration_order();
            catalog.register(Node {
                algorithm_name,
                input_labels: labels,
                predicates,
                output_products: outputs,
                concurrency,
                kind,
                registration_order,
            });
        });

        Registrar {
            creator: Some(creator),
            predicates: Vec::new(),
            outputs: None,
        }
    }

    /// Shorthand for nodes with no inputs (e.g. a source-fed root transform).
    pub fn no_inputs(self) -> Registrar {
        self.input_family(Vec::<SpecifiedLabel>::new())
    }
}

/// The scoped builder itself. Accepts `when(...)` and `output_products(...)`
/// in either order; fires its creator on the first of `output_products`,
/// `build`, or `Drop`.
pub struct Registrar {
    creator: Option<Creator>,
    predicates: Vec<String>,
    outputs: Option<Vec<String>>,
}

impl Registrar {
    fn fire(&mut self) {
        if let Some(creator) = self.creator.take() {
            let predicates = std::mem::take(&mut self.predicates);
            let outputs = self.outputs.take().unwrap_or_default();
            creator(predicates, outputs);
        }
    }

    /// Add gating predicate names to this node's `when` set.
    pub fn when<I, S>(mut self, predicates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.predicates.extend(predicates.into_iter().map(Into::into));
        self
    }

    /// Declare the product names this node publishes. This may trigger
    /// construction eagerly — it's usually the last call in a chain, and
    /// firing here means a dropped intermediate value (e.g. assigned to
    /// `_`) still registers correctly.
    pub fn output_products<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.outputs = Some(names.into_iter().map(Into::into).collect());
        self.fire();
        self
    }

    /// Force construction now. Idempotent: calling it twice, or letting
    /// the value drop afterward, is a no-op the second time.
    pub fn build(mut self) {
        self.fire();
    }
}

impl Drop for Registrar {
    fn drop(&mut self) {
        self.fire();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::name::AlgorithmName;
    use serde_json::json;
    use std::sync::Arc as StdArc;

    fn transform_builder(catalog: Arc<Catalog>, plugin: &str, algorithm: &str, arity: usize) -> NodeBuilder {
        NodeBuilder {
            catalog,
            algorithm_name: AlgorithmName::new(plugin, algorithm),
            concurrency: Concurrency::Unlimited,
            expected_arity: arity,
            kind: NodeKind::Transform(StdArc::new(|inputs| Ok(inputs.to_vec()))),
        }
    }

    #[test]
    fn drop_fires_the_creator_exactly_once() {
        let catalog = Arc::new(Catalog::new());
        {
            let _registrar = transform_builder(catalog.clone(), "p", "double", 0)
                .no_inputs()
                .output_products(["y"]);
        }
        assert_eq!(catalog.len(), 1);
        assert!(!catalog.has_errors());
    }

    #[test]
    fn build_then_drop_does_not_double_register() {
        let catalog = Arc::new(Catalog::new());
        let registrar = transform_builder(catalog.clone(), "p", "double", 0)
            .no_inputs()
            .output_products(["y"]);
        registrar.build();
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn arity_mismatch_is_recorded_and_node_is_not_registered() {
        let catalog = Arc::new(Catalog::new());
        let _ = transform_builder(catalog.clone(), "p", "double", 1)
            .no_inputs()
            .output_products(["y"]);
        assert_eq!(catalog.len(), 0);
        assert_eq!(catalog.errors().len(), 1);
        assert!(catalog.errors()[0].contains("expects 1 input"));
    }

    #[test]
    fn bare_label_with_no_producer_is_allowed_as_an_external_input() {
        // Nothing in the catalog produces "x" — it's seeded by the source
        // driver directly onto the root store, not published by a node.
        let catalog = Arc::new(Catalog::new());
        let _ = transform_builder(catalog.clone(), "p", "double", 1)
            .input_family(["x"])
            .output_products(["y"]);
        assert_eq!(catalog.len(), 1);
        assert!(!catalog.has_errors());
    }

    #[test]
    fn qualified_reference_to_a_nonexistent_producer_is_recorded() {
        let catalog = Arc::new(Catalog::new());
        let _ = transform_builder(catalog.clone(), "p", "double", 1)
            .input_family([SpecifiedLabel {
                name: "x".to_string(),
                qualifier: Some(AlgorithmName::new("other", "producer")),
            }])
            .output_products(["y"]);
        assert_eq!(catalog.len(), 0);
        assert!(catalog.errors()[0].contains("unknown product"));
    }

    #[test]
    fn unknown_predicate_is_recorded() {
        let catalog = Arc::new(Catalog::new());
        let _ = transform_builder(catalog.clone(), "p", "source", 0)
            .no_inputs()
            .output_products(["x"]);
        let _ = transform_builder(catalog.clone(), "p", "double", 1)
            .input_family(["x"])
            .when(["not_a_predicate"])
            .output_products(["y"]);
        assert!(catalog.errors().iter().any(|e| e.contains("unknown predicate")));
    }

    #[test]
    fn a_value_assigned_to_underscore_still_registers() {
        let catalog = Arc::new(Catalog::new());
        let _ = transform_builder(catalog.clone(), "p", "double", 0)
            .no_inputs()
            .output_products(["y"]);
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn json_value_inputs_round_trip_through_transform_kind() {
        let catalog = Arc::new(Catalog::new());
        let _ = transform_builder(catalog.clone(), "p", "source", 0)
            .no_inputs()
            .output_products(["x"]);
        let node = catalog.get("p:source").unwrap();
        if let NodeKind::Transform(f) = &node.kind {
            assert_eq!(f(&[json!(3)]).unwrap(), vec![json!(3)]);
        } else {
            panic!("expected transform kind");
        }
    }
}
