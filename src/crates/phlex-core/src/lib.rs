//! # phlex-core
//!
//! A dataflow-graph runtime for hierarchical, streaming event data. A
//! pipeline is declared as a graph of named algorithms — transforms,
//! predicates, folds, unfolds, observers, and outputs — that communicate
//! by publishing and consuming named *products* keyed by a hierarchical
//! *level identifier* (`job → run → event → segment`, or whatever shape
//! a deployment needs).
//!
//! ## Architecture
//!
//! ```text
//!            GraphProxy (registration)
//!                   │
//!                   ▼
//!      Catalog ──── Node ──── Node ──── ...
//!                   │
//!                   ▼
//!      FlowGraph::build() — refuses to run if the catalog has errors
//!                   │
//!                   ▼
//!      Scheduler: one tokio task per node, fed by a central store bus
//!                   ▲
//!                   │
//!      Driver ◀──── Source (next() or next(driver))
//! ```
//!
//! Data moves through the [`store::ProductStore`] hierarchy: a root store
//! from [`store::ProductStore::base`], extended by `make_child`,
//! `make_continuation`, and `make_flush` as nodes and unfolds run.
//!
//! ## Quick start
//!
//! ```
//! use std::sync::Arc;
//! use phlex_core::config::Configuration;
//! use phlex_core::graph::{FlowGraph, GraphProxy};
//! use phlex_core::node::Concurrency;
//! use phlex_core::runtime::RuntimeConfig;
//! use serde_json::json;
//!
//! let proxy = GraphProxy::new();
//! let _ = proxy
//!     .transform("demo", "double", Concurrency::Unlimited, 1, Arc::new(|inputs: &[serde_json::Value]| {
//!         let x = inputs[0].as_i64().unwrap_or(0);
//!         Ok(vec![json!(x * 2)])
//!     }))
//!     .input_family(["x"])
//!     .output_products(["y"]);
//!
//! let graph = FlowGraph::build(&proxy, RuntimeConfig::default());
//! assert!(graph.is_ok());
//! let _ = Configuration::new();
//! ```

pub mod catalog;
pub mod config;
pub mod driver;
pub mod error;
pub mod graph;
pub mod level;
pub mod name;
pub mod node;
pub mod registrar;
pub mod runtime;
pub mod scheduler;
pub mod store;

pub use catalog::Catalog;
pub use config::Configuration;
pub use driver::{Driver, ModuleInit, Source, SourceInit};
pub use error::{PhlexError, Result};
pub use graph::{BoundGraphProxy, FlowGraph, GraphProxy};
pub use level::LevelId;
pub use name::{AlgorithmName, QualifiedName, SpecifiedLabel};
pub use node::{Concurrency, Node, NodeKind, NodeState};
pub use registrar::{NodeBuilder, Registrar};
pub use runtime::{RuntimeConfig, RuntimeHandle};
pub use scheduler::{RunReport, Scheduler};
pub use store::{most_derived, most_derived_all, ProductStore, Stage};
