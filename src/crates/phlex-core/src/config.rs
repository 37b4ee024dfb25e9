//! Configuration surface
//!
//! This is deliberately a passive data bag: Phlex itself never parses a
//! config file format. Callers build a [`Configuration`] however suits
//! their deployment (YAML, env vars, a hand-built struct) and hand it to
//! the catalog at registration time.

use std::collections::HashMap;

use serde_json::Value;

/// Opaque, per-node configuration plus the job-wide output item list.
#[derive(Clone, Debug, Default)]
pub struct Configuration {
    /// `full_name -> { parameter -> value }`, looked up during registration.
    node_parameters: HashMap<String, HashMap<String, Value>>,
    /// Product names the job should persist via an output node.
    output_items: Vec<String>,
}

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a parameter bag for the node registered under `full_name`.
    pub fn with_node_parameters(mut self, full_name: impl Into<String>, params: HashMap<String, Value>) -> Self {
        self.node_parameters.insert(full_name.into(), params);
        self
    }

    /// Declare that `product` should be persisted by an output node.
    pub fn with_output_item(mut self, product: impl Into<String>) -> Self {
        self.output_items.push(product.into());
        self
    }

    /// The parameter bag registered for `full_name`, if any.
    pub fn parameters_for(&self, full_name: &str) -> Option<&HashMap<String, Value>> {
        self.node_parameters.get(full_name)
    }

    /// A single typed parameter for `full_name`, if present and of the
    /// right shape. Returns `None` on missing key or wrong type — callers
    /// decide whether that's a hard error for their own algorithm.
    pub fn parameter<T: serde::de::DeserializeOwned>(&self, full_name: &str, key: &str) -> Option<T> {
        self.node_parameters
            .get(full_name)?
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// The job-wide list of products to persist.
    pub fn output_items(&self) -> &[String] {
        &self.output_items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn typed_parameter_round_trips() {
        let mut params = HashMap::new();
        params.insert("factor".to_string(), json!(3));
        let config = Configuration::new().with_node_parameters("plugin_a:double", params);
        assert_eq!(config.parameter::<i64>("plugin_a:double", "factor"), Some(3));
        assert_eq!(config.parameter::<i64>("plugin_a:double", "missing"), None);
        assert_eq!(config.parameter::<i64>("unknown:node", "factor"), None);
    }

    #[test]
    fn output_items_accumulate_in_order() {
        let config = Configuration::new().with_output_item("a").with_output_item("b");
        assert_eq!(config.output_items(), &["a".to_string(), "b".to_string()]);
    }
}
