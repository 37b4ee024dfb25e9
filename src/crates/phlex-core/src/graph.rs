//! Graph proxy (registration facade) and the built, executable flow graph
//!
//! `GraphProxy` is the typed registration facade:
//! `.transform()/.predicate()/.fold()/.unfold()/.observe()/.output()`
//! each return a [`crate::registrar::NodeBuilder`] awaiting
//! `input_family(...)`. `.make::<T>(instance)` binds a shared instance so
//! member-function algorithms can be registered against it; an unbound
//! `GraphProxy` only accepts free-function/lambda algorithms.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::catalog::Catalog;
use crate::error::{PhlexError, Result};
use crate::node::{
    Concurrency, FoldCombiner, FoldFinalizer, FoldSpec, NodeBuilder, NodeError, NodeKind, ObserverFn,
    OutputFn, PredicateFn, TransformFn, UnfoldGenerator, UnfoldPredicate, UnfoldSpec,
};
use crate::name::AlgorithmName;
use crate::runtime::RuntimeConfig;

/// The registration facade handed to plugin `create_module` functions.
#[derive(Clone)]
pub struct GraphProxy {
    catalog: Arc<Catalog>,
}

impl GraphProxy {
    pub fn new() -> Self {
        Self {
            catalog: Arc::new(Catalog::new()),
        }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    fn builder(&self, plugin: &str, algorithm: &str, concurrency: Concurrency, arity: usize, kind: NodeKind) -> NodeBuilder {
        NodeBuilder {
            catalog: self.catalog.clone(),
            algorithm_name: AlgorithmName::new(plugin, algorithm),
            concurrency,
            expected_arity: arity,
            kind,
        }
    }

    pub fn transform(
        &self,
        plugin: &str,
        algorithm: &str,
        concurrency: Concurrency,
        arity: usize,
        f: TransformFn,
    ) -> NodeBuilder {
        self.builder(plugin, algorithm, concurrency, arity, NodeKind::Transform(f))
    }

    pub fn predicate(
        &self,
        plugin: &str,
        algorithm: &str,
        concurrency: Concurrency,
        arity: usize,
        f: PredicateFn,
    ) -> NodeBuilder {
        self.builder(plugin, algorithm, concurrency, arity, NodeKind::Predicate(f))
    }

    pub fn observe(
        &self,
        plugin: &str,
        algorithm: &str,
        concurrency: Concurrency,
        arity: usize,
        f: ObserverFn,
    ) -> NodeBuilder {
        self.builder(plugin, algorithm, concurrency, arity, NodeKind::Observer(f))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn fold(
        &self,
        plugin: &str,
        algorithm: &str,
        concurrency: Concurrency,
        arity: usize,
        partition: impl Into<String>,
        initial_state: Value,
        combiner: FoldCombiner,
        finalizer: Option<FoldFinalizer>,
    ) -> NodeBuilder {
        self.builder(
            plugin,
            algorithm,
            concurrency,
            arity,
            NodeKind::Fold(FoldSpec {
                partition: partition.into(),
                initial_state,
                combiner,
                finalizer,
            }),
        )
    }

    pub fn unfold(
        &self,
        plugin: &str,
        algorithm: &str,
        concurrency: Concurrency,
        arity: usize,
        destination_data_layer: impl Into<String>,
        predicate: UnfoldPredicate,
        generator: UnfoldGenerator,
    ) -> NodeBuilder {
        self.builder(
            plugin,
            algorithm,
            concurrency,
            arity,
            NodeKind::Unfold(UnfoldSpec {
                destination_data_layer: destination_data_layer.into(),
                predicate,
                generator,
            }),
        )
    }

    pub fn output(
        &self,
        plugin: &str,
        algorithm: &str,
        concurrency: Concurrency,
        arity: usize,
        f: OutputFn,
    ) -> NodeBuilder {
        self.builder(plugin, algorithm, concurrency, arity, NodeKind::Output(f))
    }

    /// Bind a shared instance so member-function algorithms can close
    /// over it. An unbound proxy simply never has this method called,
    /// which is how it refuses member binding.
    pub fn make<T: Send + Sync + 'static>(&self, instance: T) -> BoundGraphProxy<T> {
        BoundGraphProxy {
            proxy: self.clone(),
            instance: Arc::new(instance),
        }
    }
}

impl Default for GraphProxy {
    fn default() -> Self {
        Self::new()
    }
}

/// A `GraphProxy` bound to a shared instance, for member-function
/// algorithms. Closures registered through it close over `instance`
/// rather than requiring the caller to pre-capture an `Arc`.
pub struct BoundGraphProxy<T> {
    proxy: GraphProxy,
    instance: Arc<T>,
}

impl<T: Send + Sync + 'static> BoundGraphProxy<T> {
    pub fn instance(&self) -> &Arc<T> {
        &self.instance
    }

    pub fn transform(
        &self,
        plugin: &str,
        algorithm: &str,
        concurrency: Concurrency,
        arity: usize,
        method: impl Fn(&T, &[Value]) -> std::result::Result<Vec<Value>, NodeError> + Send + Sync + 'static,
    ) -> NodeBuilder {
        let instance = self.instance.clone();
        self.proxy
            .transform(plugin, algorithm, concurrency, arity, Arc::new(move |inputs: &[Value]| method(&instance, inputs)))
    }

    pub fn observe(
        &self,
        plugin: &str,
        algorithm: &str,
        concurrency: Concurrency,
        arity: usize,
        method: impl Fn(&T, &[Value]) -> std::result::Result<(), NodeError> + Send + Sync + 'static,
    ) -> NodeBuilder {
        let instance = self.instance.clone();
        self.proxy
            .observe(plugin, algorithm, concurrency, arity, Arc::new(move |inputs: &[Value]| method(&instance, inputs)))
    }
}

/// A built, executable graph: a catalog known to be free of registration
/// errors, paired with its runtime settings.
pub struct FlowGraph {
    catalog: Arc<Catalog>,
    runtime_config: RuntimeConfig,
}

impl FlowGraph {
    /// Validate `proxy`'s catalog and, if clean, produce a runnable graph.
    /// Refuses to run if the catalog has accumulated registration errors.
    pub fn build(proxy: &GraphProxy, runtime_config: RuntimeConfig) -> Result<Self> {
        let catalog = proxy.catalog().clone();
        if catalog.has_errors() {
            return Err(PhlexError::CatalogErrors(catalog.errors().len()));
        }
        Ok(Self {
            catalog,
            runtime_config,
        })
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn runtime_config(&self) -> &RuntimeConfig {
        &self.runtime_config
    }

    /// Run this graph to completion against `source`: spawn the node
    /// tasks, drive `source` until exhaustion, flush every level the
    /// driver opened, and wait for every node to drain.
    pub async fn run(&self, mut source: impl crate::driver::Source + Send + 'static) -> crate::scheduler::RunReport {
        let runtime = crate::runtime::RuntimeHandle::new(self.runtime_config.clone());
        let scheduler = crate::scheduler::Scheduler::spawn(&self.catalog, runtime);
        let driver = crate::driver::Driver::new(scheduler.feed());

        let source_result = source.next_with_driver(&driver).await;
        driver.finish();
        // `driver` holds its own clone of the dispatch sender; drop it
        // before awaiting shutdown; otherwise the forwarder task never
        // sees the dispatch channel close and `shutdown` hangs forever.
        drop(driver);
        let mut report = scheduler.shutdown().await;
        if let Err(err) = source_result {
            let message = PhlexError::SourceFailure(err.to_string()).to_string();
            tracing::error!(error = %message, "source failed");
            report.errors.push(message);
        }
        report
    }
}

/// Products seeded alongside a root store, used by [`crate::driver::Driver`].
pub type SeedProducts = HashMap<String, Value>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn build_refuses_when_catalog_has_errors() {
        // Arity mismatch: the node expects 2 inputs but only 1 label is
        // supplied, which the registrar records as a registration error
        // (unlike a bare unresolved label, which is allowed as an
        // externally-seeded input).
        let proxy = GraphProxy::new();
        let _ = proxy
            .transform("p", "double", Concurrency::Unlimited, 2, Arc::new(|inputs: &[Value]| Ok(inputs.to_vec())))
            .input_family(["x"])
            .output_products(["y"]);
        assert!(proxy.catalog().has_errors());
        let err = FlowGraph::build(&proxy, RuntimeConfig::default()).unwrap_err();
        assert!(matches!(err, PhlexError::CatalogErrors(1)));
    }

    #[test]
    fn build_succeeds_on_a_clean_catalog() {
        let proxy = GraphProxy::new();
        let _ = proxy
            .transform("p", "source", Concurrency::Unlimited, 0, Arc::new(|_: &[Value]| Ok(vec![json!(3)])))
            .no_inputs()
            .output_products(["x"]);
        let graph = FlowGraph::build(&proxy, RuntimeConfig::default()).unwrap();
        assert_eq!(graph.catalog().len(), 1);
    }

    #[test]
    fn bound_proxy_closes_over_a_shared_instance() {
        struct Doubler {
            factor: i64,
        }
        let proxy = GraphProxy::new();
        let bound = proxy.make(Doubler { factor: 2 });
        let _ = bound
            .transform("p", "source", Concurrency::Unlimited, 0, |_, _| Ok(vec![json!(3)]))
            .no_inputs()
            .output_products(["x"]);
        let _ = bound
            .transform("p", "scale", Concurrency::Unlimited, 1, |instance, inputs| {
                let x = inputs[0].as_i64().unwrap_or(0);
                Ok(vec![json!(x * instance.factor)])
            })
            .input_family(["x"])
            .output_products(["y"]);
        assert_eq!(proxy.catalog().len(), 2);
    }
}
