//! Error types for catalog construction and graph execution
//!
//! Phlex distinguishes *registration* errors (duplicate names, arity
//! mismatches, missing producers, unknown predicates) from *execution*
//! errors (a node's user code failing for a given store). Registration
//! errors are accumulated rather than raised immediately — see
//! [`crate::catalog::Catalog`] — so a whole declaration batch can be
//! reported at once; execution errors are per-id and never stop the rest
//! of the graph.

use thiserror::Error;

/// Result type used throughout `phlex-core`.
pub type Result<T> = std::result::Result<T, PhlexError>;

/// Errors raised while building or running a Phlex flow graph.
#[derive(Error, Debug)]
pub enum PhlexError {
    /// Two nodes were registered under the same full algorithm name.
    #[error("duplicate registration of node '{0}'")]
    DuplicateRegistration(String),

    /// A node's declared input label count didn't match its algorithm's arity.
    #[error("node '{node}' expects {expected} input(s), got {actual}")]
    ArityMismatch {
        /// Full name of the node being built.
        node: String,
        /// Arity inferred from the algorithm at registration time.
        expected: usize,
        /// Number of labels actually supplied via `input_family`.
        actual: usize,
    },

    /// An input label did not resolve to any producer in the catalog.
    #[error("node '{node}' references unknown product '{label}'")]
    MissingProducer {
        /// Full name of the node being built.
        node: String,
        /// The label text that failed to resolve.
        label: String,
    },

    /// An input label resolved to more than one producer and no qualifier
    /// was given to disambiguate.
    #[error("node '{node}' label '{label}' is ambiguous among {count} producers")]
    AmbiguousProducer {
        /// Full name of the node being built.
        node: String,
        /// The label text that was ambiguous.
        label: String,
        /// Number of candidate producers found.
        count: usize,
    },

    /// `when(...)` referenced a product that isn't a predicate node's output.
    #[error("node '{node}' references unknown predicate '{predicate}'")]
    UnknownPredicate {
        /// Full name of the node being built.
        node: String,
        /// The predicate product name that failed to resolve.
        predicate: String,
    },

    /// Two nodes declared the same output product name. `spec.md` §3
    /// requires output names to be disjoint across nodes in a graph.
    #[error("product '{product}' is already published by node '{existing}'; node '{node}' cannot also publish it")]
    DuplicateOutputProduct {
        /// The colliding product name.
        product: String,
        /// Full name of the node that already publishes it.
        existing: String,
        /// Full name of the node attempting to publish it too.
        node: String,
    },

    /// The catalog has accumulated registration errors; execution was refused.
    #[error("catalog has {0} registration error(s); execution refused")]
    CatalogErrors(usize),

    /// A product name was written twice to the same store.
    #[error("product '{0}' already present in store")]
    ProductExists(String),

    /// A node's user-supplied closure returned an error while processing a store.
    #[error("node '{node}' failed for id {id}: {source}")]
    NodeExecution {
        /// Full name of the node that failed.
        node: String,
        /// String form of the store id being processed.
        id: String,
        /// Underlying error from the node's closure.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The user-supplied source failed while producing stores.
    #[error("source failed: {0}")]
    SourceFailure(String),

    /// A persistence backend call made from an output node failed.
    #[error("persistence error: {0}")]
    Persistence(#[from] phlex_persistence::PersistenceError),
}
