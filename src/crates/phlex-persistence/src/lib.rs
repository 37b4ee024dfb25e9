//! # phlex-persistence — the output-side storage contract for Phlex
//!
//! Phlex's core (`phlex-core`) resolves data dependencies and drives
//! algorithm nodes, but it never writes a byte to disk itself. Output
//! nodes instead talk to a [`PersistenceBackend`]: a small write/read
//! contract the core can call through without knowing anything about
//! what's on the other side — Parquet, a database, object storage, or (as
//! provided here) an in-memory map for tests and examples.
//!
//! ## Why a separate crate
//!
//! Persistence backends are deliberately out of scope for the
//! dataflow-graph runtime itself — only their write/read contract is
//! needed. Keeping the contract in its own crate means `phlex-core`
//! depends on an interface, not an implementation, and a real backend
//! (a Parquet writer, a database-backed store) can be added later without
//! touching the scheduler or node code at all.
//!
//! ## The contract
//!
//! [`PersistenceBackend`] has four operations, in the order an Output
//! node calls them:
//!
//! 1. [`create_containers`](PersistenceBackend::create_containers) once,
//!    at graph build time.
//! 2. [`register_write`](PersistenceBackend::register_write) once per
//!    product, per store id the node is invoked for.
//! 3. [`commit_output`](PersistenceBackend::commit_output) once per store
//!    id, after all of that id's writes are staged.
//! 4. [`read`](PersistenceBackend::read) any time afterwards, by anything
//!    that wants the committed value back (tests, downstream tooling).
//!
//! ## Example
//!
//! ```rust
//! use phlex_persistence::{InMemoryBackend, PersistenceBackend};
//! use serde_json::json;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let backend = InMemoryBackend::new();
//! backend.create_containers("histogram", &[("counts".into(), "json".into())]).await.unwrap();
//! backend.register_write("histogram", "counts", "job:0", json!([1, 2, 3]), "json").await.unwrap();
//! backend.commit_output("histogram", "job:0").await.unwrap();
//!
//! let value = backend.read("histogram", "counts", "job:0", "json").await.unwrap();
//! assert_eq!(value, json!([1, 2, 3]));
//! # }
//! ```

pub mod error;
pub mod memory;
pub mod traits;

pub use error::{PersistenceError, Result};
pub use memory::InMemoryBackend;
pub use traits::{Creator, PersistenceBackend, StoreIdKey};
