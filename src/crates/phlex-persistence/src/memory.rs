//! Reference in-memory [`PersistenceBackend`] implementation
//!
//! Used by `phlex-core`'s integration tests and by examples exercising
//! Output nodes. Not a durability guarantee: data lives only as long as
//! the process.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{PersistenceError, Result};
use crate::traits::{Creator, PersistenceBackend, StoreIdKey};

#[derive(Default)]
struct CreatorState {
    containers: HashMap<String, String>,
    staged: HashMap<String, HashMap<String, Value>>,
    committed: HashMap<String, HashMap<String, Value>>,
}

/// A `PersistenceBackend` backed by an in-process `HashMap`.
pub struct InMemoryBackend {
    creators: Mutex<HashMap<String, CreatorState>>,
}

impl InMemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self {
            creators: Mutex::new(HashMap::new()),
        }
    }

    /// Number of distinct ids committed for a creator, for test assertions.
    pub fn committed_id_count(&self, creator: &str) -> usize {
        self.creators
            .lock()
            .unwrap()
            .get(creator)
            .map(|s| s.committed.len())
            .unwrap_or(0)
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PersistenceBackend for InMemoryBackend {
    async fn create_containers(&self, creator: &Creator, products: &[(String, String)]) -> Result<()> {
        let mut creators = self.creators.lock().unwrap();
        let state = creators.entry(creator.to_string()).or_default();
        for (product, type_name) in products {
            if state.containers.contains_key(product) {
                return Err(PersistenceError::ContainerExists(product.clone()));
            }
            state.containers.insert(product.clone(), type_name.clone());
        }
        Ok(())
    }

    async fn register_write(
        &self,
        creator: &Creator,
        product: &str,
        id: &StoreIdKey,
        data: Value,
        type_name: &str,
    ) -> Result<()> {
        let mut creators = self.creators.lock().unwrap();
        let state = creators
            .get_mut(creator)
            .ok_or_else(|| PersistenceError::NoContainer(product.to_string()))?;
        if state.containers.get(product).map(String::as_str) != Some(type_name) {
            return Err(PersistenceError::NoContainer(product.to_string()));
        }
        state
            .staged
            .entry(id.to_string())
            .or_default()
            .insert(product.to_string(), data);
        Ok(())
    }

    async fn commit_output(&self, creator: &Creator, id: &StoreIdKey) -> Result<()> {
        let mut creators = self.creators.lock().unwrap();
        let state = creators.entry(creator.to_string()).or_default();
        if let Some(staged) = state.staged.remove(id) {
            state.committed.entry(id.to_string()).or_default().extend(staged);
        }
        Ok(())
    }

    async fn read(&self, creator: &Creator, product: &str, id: &StoreIdKey, _type_name: &str) -> Result<Value> {
        let creators = self.creators.lock().unwrap();
        creators
            .get(creator)
            .and_then(|s| s.committed.get(id))
            .and_then(|products| products.get(product))
            .cloned()
            .ok_or_else(|| PersistenceError::NotFound {
                product: product.to_string(),
                id: id.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_then_read_after_commit() {
        let backend = InMemoryBackend::new();
        backend
            .create_containers("sum_fold", &[("sum".to_string(), "int".to_string())])
            .await
            .unwrap();
        backend
            .register_write("sum_fold", "sum", "job:0", Value::from(6), "int")
            .await
            .unwrap();

        assert!(backend.read("sum_fold", "sum", "job:0", "int").await.is_err());

        backend.commit_output("sum_fold", "job:0").await.unwrap();
        let value = backend.read("sum_fold", "sum", "job:0", "int").await.unwrap();
        assert_eq!(value, Value::from(6));
        assert_eq!(backend.committed_id_count("sum_fold"), 1);
    }

    #[tokio::test]
    async fn duplicate_container_is_an_error() {
        let backend = InMemoryBackend::new();
        backend
            .create_containers("node", &[("x".to_string(), "int".to_string())])
            .await
            .unwrap();
        let err = backend
            .create_containers("node", &[("x".to_string(), "int".to_string())])
            .await
            .unwrap_err();
        assert!(matches!(err, PersistenceError::ContainerExists(_)));
    }
}
