//! The product store hierarchy
//!
//! A [`ProductStore`] is a node in the hierarchy carrying products at one
//! level. Stores are cheap to clone (an `Arc` underneath) and hold their
//! parent by shared ownership rather than a weak reference — the
//! hierarchy is a tree, so nothing here ever needs to break a cycle, and
//! the parent living exactly as long as its youngest child falls out for
//! free.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde_json::Value;

use crate::error::{PhlexError, Result};
use crate::level::LevelId;

/// Whether a store carries products (`Process`) or marks the end of a
/// level's process stores (`Flush`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    /// An ordinary store carrying zero or more products.
    Process,
    /// A sentinel store: no products, signals "no more process stores at
    /// this level for this id."
    Flush,
}

struct StoreInner {
    parent: Option<ProductStore>,
    /// The store this one continues, if any — same `level_id`, same
    /// `parent`, but a distinct products map. `store_for_product` walks
    /// this chain before climbing to `parent`, so a continuation's own
    /// new products don't shadow the products the store it continues
    /// already carries; both remain visible at the same id.
    predecessor: Option<ProductStore>,
    level_id: LevelId,
    source: String,
    stage: Stage,
    products: RwLock<HashMap<String, Value>>,
}

/// A node in the product-store hierarchy.
///
/// Cloning a `ProductStore` clones an `Arc`, not the data — all clones
/// refer to the same store and observe the same products.
#[derive(Clone)]
pub struct ProductStore {
    inner: Arc<StoreInner>,
}

impl ProductStore {
    /// The root store: `job:0`, stage `Process`, no products.
    pub fn base() -> Self {
        Self {
            inner: Arc::new(StoreInner {
                parent: None,
                predecessor: None,
                level_id: LevelId::root("job", 0),
                source: String::new(),
                stage: Stage::Process,
                products: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// A child store one level deeper, seeded with `products`.
    pub fn make_child(
        &self,
        level_name: impl Into<String>,
        level_number: u64,
        source: impl Into<String>,
        products: HashMap<String, Value>,
    ) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                parent: Some(self.clone()),
                predecessor: None,
                level_id: self.inner.level_id.child(level_name, level_number),
                source: source.into(),
                stage: Stage::Process,
                products: RwLock::new(products),
            }),
        }
    }

    /// A child store one level deeper, with no products yet.
    pub fn make_child_empty(&self, level_name: impl Into<String>, level_number: u64, source: impl Into<String>) -> Self {
        self.make_child(level_name, level_number, source, HashMap::new())
    }

    /// A store at the same level as `self`, with additional products appended.
    pub fn make_continuation(&self, source: impl Into<String>, products: HashMap<String, Value>) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                parent: self.inner.parent.clone(),
                predecessor: Some(self.clone()),
                level_id: self.inner.level_id.clone(),
                source: source.into(),
                stage: Stage::Process,
                products: RwLock::new(products),
            }),
        }
    }

    /// A flush sentinel at the same level as `self`: no products, stage `Flush`.
    pub fn make_flush(&self) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                parent: self.inner.parent.clone(),
                predecessor: None,
                level_id: self.inner.level_id.clone(),
                source: "<flush>".to_string(),
                stage: Stage::Flush,
                products: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// `true` iff this store's stage is `Flush`.
    pub fn is_flush(&self) -> bool {
        self.inner.stage == Stage::Flush
    }

    pub fn stage(&self) -> Stage {
        self.inner.stage
    }

    pub fn level_id(&self) -> &LevelId {
        &self.inner.level_id
    }

    pub fn source(&self) -> &str {
        &self.inner.source
    }

    /// The immediate parent, or `None` at the root.
    pub fn immediate_parent(&self) -> Option<ProductStore> {
        self.inner.parent.clone()
    }

    /// Insert a new product. Re-adding an existing key is a logic error;
    /// the calling task should abort, not the whole process, so this
    /// returns a `Result` rather than panicking.
    pub fn put(&self, name: impl Into<String>, value: Value) -> Result<()> {
        let name = name.into();
        let mut products = self.inner.products.write().unwrap();
        if products.contains_key(&name) {
            return Err(PhlexError::ProductExists(name));
        }
        products.insert(name, value);
        Ok(())
    }

    /// The product `name` if this exact store carries it (no ancestor walk).
    pub fn get_own(&self, name: &str) -> Option<Value> {
        self.inner.products.read().unwrap().get(name).cloned()
    }

    /// All product names carried directly by this store.
    pub fn own_product_names(&self) -> Vec<String> {
        self.inner.products.read().unwrap().keys().cloned().collect()
    }

    /// Search `self` and every store it continues (same id, same parent,
    /// older products) before climbing to an ancestor level.
    fn search_own_and_continuations(&self, name: &str) -> Option<ProductStore> {
        let mut cursor = Some(self.clone());
        while let Some(store) = cursor {
            if store.get_own(name).is_some() {
                return Some(store);
            }
            cursor = store.inner.predecessor.clone();
        }
        None
    }

    /// Walk up from this store (inclusive) until a store owning `name` is
    /// found. The closest ancestor wins (the most-derived rule); at each
    /// level, every continuation sharing that level's id is checked before
    /// climbing further, since a continuation only adds products rather
    /// than replacing the ones already published at its id.
    pub fn store_for_product(&self, name: &str) -> Option<ProductStore> {
        let mut cursor = Some(self.clone());
        let cap = self.level_id().depth() + 1;
        for _ in 0..=cap {
            let store = cursor?;
            if let Some(found) = store.search_own_and_continuations(name) {
                return Some(found);
            }
            cursor = store.inner.parent.clone();
        }
        None
    }

    /// Resolve `name` through [`store_for_product`](Self::store_for_product) and return its value.
    pub fn resolve_product(&self, name: &str) -> Option<Value> {
        self.store_for_product(name).and_then(|s| s.get_own(name))
    }

    /// The nearest store — starting the search at `self` — whose level
    /// name matches `level_name`.
    ///
    /// This is inclusive of `self` deliberately: `base().make_child(1,
    /// "run", "", {}).parent("run")` must return that same child (see
    /// `DESIGN.md`), which only holds if the search doesn't skip `self`.
    /// Use [`immediate_parent`](Self::immediate_parent) when you want the
    /// strict parent regardless of level name.
    pub fn parent(&self, level_name: &str) -> Option<ProductStore> {
        let mut cursor = Some(self.clone());
        let cap = self.level_id().depth() + 1;
        for _ in 0..=cap {
            let store = cursor?;
            if store.level_id().level_name() == level_name {
                return Some(store);
            }
            cursor = store.inner.parent.clone();
        }
        None
    }

    /// `true` if `self` is an ancestor of (or equal to) `other`, by Arc identity.
    pub fn is_ancestor_of(&self, other: &ProductStore) -> bool {
        let mut cursor = Some(other.clone());
        let cap = other.level_id().depth() + 1;
        for _ in 0..=cap {
            let store = match cursor {
                Some(s) => s,
                None => return false,
            };
            if Arc::ptr_eq(&self.inner, &store.inner) {
                return true;
            }
            cursor = store.inner.parent.clone();
        }
        false
    }
}

/// Among two stores, the one deeper in the hierarchy: if `a` is an
/// ancestor of `b`, `b` wins and vice versa; if neither is an ancestor
/// of the other, the second argument wins.
pub fn most_derived(a: &ProductStore, b: &ProductStore) -> ProductStore {
    if b.is_ancestor_of(a) {
        a.clone()
    } else {
        b.clone()
    }
}

/// Left-fold [`most_derived`] over a non-empty slice of stores.
pub fn most_derived_all(stores: &[ProductStore]) -> Option<ProductStore> {
    let mut iter = stores.iter();
    let mut acc = iter.next()?.clone();
    for store in iter {
        acc = most_derived(&acc, store);
    }
    Some(acc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn base_is_process_job_zero() {
        let base = ProductStore::base();
        assert!(!base.is_flush());
        assert_eq!(base.level_id().to_string(), "job:0");
        assert!(base.immediate_parent().is_none());
    }

    #[test]
    fn put_twice_is_an_error() {
        let store = ProductStore::base();
        store.put("x", json!(1)).unwrap();
        let err = store.put("x", json!(2)).unwrap_err();
        assert!(matches!(err, PhlexError::ProductExists(_)));
    }

    #[test]
    fn store_for_product_finds_ancestor_value() {
        let base = ProductStore::base();
        base.put("x", json!(3)).unwrap();
        let child = base.make_child_empty("event", 0, "source");
        let found = child.store_for_product("x").unwrap();
        assert!(Arc::ptr_eq(&found.inner, &base.inner));
        assert_eq!(child.resolve_product("x"), Some(json!(3)));
    }

    #[test]
    fn store_for_product_returns_none_off_the_chain() {
        let base = ProductStore::base();
        let sibling_a = base.make_child_empty("event", 0, "a");
        let sibling_b = base.make_child_empty("event", 1, "b");
        sibling_a.put("only_a", json!(true)).unwrap();
        assert!(sibling_b.store_for_product("only_a").is_none());
    }

    #[test]
    fn most_derived_of_ancestor_and_descendant_is_descendant() {
        let base = ProductStore::base();
        let child = base.make_child_empty("event", 0, "source");
        assert!(Arc::ptr_eq(&most_derived(&base, &child).inner, &child.inner));
    }

    #[test]
    fn continuation_shares_id_and_parent() {
        let base = ProductStore::base();
        let child = base.make_child_empty("run", 1, "s");
        let cont = child.make_continuation("s2", HashMap::new());
        assert_eq!(cont.level_id(), child.level_id());
        assert!(cont
            .immediate_parent()
            .zip(child.immediate_parent())
            .map(|(a, b)| Arc::ptr_eq(&a.inner, &b.inner))
            .unwrap_or(true));
    }

    #[test]
    fn continuation_still_sees_products_it_continues() {
        // A node downstream of both the store a transform ran on and the
        // continuation it published must resolve inputs published on
        // either one: the continuation only appends, it never hides what
        // the store it continues already carried.
        let base = ProductStore::base();
        let event = base.make_child("event", 0, "source", HashMap::from([("x".to_string(), json!(3))]));
        let mut pos = HashMap::new();
        pos.insert("pos".to_string(), json!(true));
        let continuation = event.make_continuation("demo:is_positive", pos);

        assert_eq!(continuation.resolve_product("pos"), Some(json!(true)));
        assert_eq!(continuation.resolve_product("x"), Some(json!(3)));
        assert!(Arc::ptr_eq(&continuation.store_for_product("x").unwrap().inner, &event.inner));
    }

    #[test]
    fn parent_lookup_is_inclusive_then_walks_up() {
        let base = ProductStore::base();
        let run = base.make_child_empty("run", 1, "s");
        assert!(Arc::ptr_eq(&run.parent("run").unwrap().inner, &run.inner));
        assert!(Arc::ptr_eq(&run.immediate_parent().unwrap().inner, &base.inner));
        assert!(run.parent("job").is_some());
    }

    #[test]
    fn make_flush_carries_no_products_and_is_flush() {
        let base = ProductStore::base();
        let run = base.make_child_empty("run", 1, "s");
        let flush = run.make_flush();
        assert!(flush.is_flush());
        assert!(flush.own_product_names().is_empty());
        assert_eq!(flush.level_id(), run.level_id());
    }
}
