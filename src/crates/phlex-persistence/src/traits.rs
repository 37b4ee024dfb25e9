//! Persistence backend contract consumed by Output nodes
//!
//! Phlex's core never interprets what an Output node writes — it only
//! brokers calls between the node and a storage backend through
//! [`PersistenceBackend`]. This mirrors the "persistence backends... only
//! their write/read contract is needed" boundary: the core is agnostic to
//! whether the backend is a Parquet writer, a database, or (as in tests)
//! an in-memory map.
//!
//! # The four operations
//!
//! - [`create_containers`](PersistenceBackend::create_containers) — called
//!   once per output node at graph build time, declaring which products it
//!   will write and the (opaque, string) type name each carries.
//! - [`register_write`](PersistenceBackend::register_write) — stage one
//!   product's payload for a given store id.
//! - [`commit_output`](PersistenceBackend::commit_output) — flush all
//!   staged writes for an id atomically from the backend's point of view.
//! - [`read`](PersistenceBackend::read) — read back a committed payload,
//!   used by tests and by nodes that consume previously persisted output.
//!
//! None of these are durability guarantees — exactly-once persistence is
//! explicitly not guaranteed by this contract; that is the backend's
//! business, not the core's.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// An opaque creator handle, naming the node that owns a set of containers.
///
/// The core treats this as an opaque string; backends are free to use it
/// as a table name prefix, a namespace, or to ignore it entirely.
pub type Creator = str;

/// An opaque store-id key, stringified from a Phlex level identifier.
///
/// The core does not require any particular format — `register_write` and
/// `read` must simply agree on the same string for the same store.
pub type StoreIdKey = str;

/// Write/read contract between an Output node and a storage backend.
///
/// Implementations must be `Send + Sync` so a single backend instance can
/// be shared across concurrently-running output nodes.
#[async_trait]
pub trait PersistenceBackend: Send + Sync {
    /// Declare the containers a creator will write into.
    ///
    /// `products` maps product name to an opaque type-name string agreed
    /// between the producing node and the backend (the core never parses
    /// it). Called once, before any `register_write` for that creator.
    async fn create_containers(
        &self,
        creator: &Creator,
        products: &[(String, String)],
    ) -> Result<()>;

    /// Stage a single product's payload for the given store id.
    ///
    /// `data` is the already-serialized payload; `type_name` must match
    /// one previously declared via `create_containers`.
    async fn register_write(
        &self,
        creator: &Creator,
        product: &str,
        id: &StoreIdKey,
        data: Value,
        type_name: &str,
    ) -> Result<()>;

    /// Commit all writes staged for `id` under `creator`.
    ///
    /// After this returns `Ok`, a `read` for any committed product at this
    /// id must see the staged value.
    async fn commit_output(&self, creator: &Creator, id: &StoreIdKey) -> Result<()>;

    /// Read back a previously committed payload.
    ///
    /// Returns [`PersistenceError::NotFound`](crate::error::PersistenceError::NotFound)
    /// if no write was ever committed for this product/id pair.
    async fn read(&self, creator: &Creator, product: &str, id: &StoreIdKey, type_name: &str) -> Result<Value>;
}
