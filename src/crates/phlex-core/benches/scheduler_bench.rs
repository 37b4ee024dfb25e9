use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use phlex_core::error::Result;
use phlex_core::graph::{FlowGraph, GraphProxy};
use phlex_core::node::Concurrency;
use phlex_core::runtime::RuntimeConfig;
use phlex_core::store::ProductStore;
use phlex_core::Source;
use serde_json::{json, Value};

struct EventBurst {
    remaining: u64,
}

#[async_trait]
impl Source for EventBurst {
    async fn next(&mut self) -> Result<Option<ProductStore>> {
        if self.remaining == 0 {
            return Ok(None);
        }
        self.remaining -= 1;
        let mut products = HashMap::new();
        products.insert("x".to_string(), json!(self.remaining as i64));
        Ok(Some(ProductStore::base().make_child("event", self.remaining, "bench-source", products)))
    }
}

fn build_graph() -> FlowGraph {
    let proxy = GraphProxy::new();
    let _ = proxy
        .transform(
            "bench",
            "double",
            Concurrency::Unlimited,
            1,
            Arc::new(|inputs: &[Value]| Ok(vec![json!(inputs[0].as_i64().unwrap_or(0) * 2)])),
        )
        .input_family(["x"])
        .output_products(["y"]);
    let _ = proxy
        .fold(
            "bench",
            "sum",
            Concurrency::Unlimited,
            1,
            "job",
            json!(0),
            Arc::new(|state: &Value, inputs: &[Value]| {
                Ok(json!(state.as_i64().unwrap_or(0) + inputs[0].as_i64().unwrap_or(0)))
            }),
            None,
        )
        .input_family(["y"])
        .output_products(["sum"]);
    FlowGraph::build(&proxy, RuntimeConfig::default()).unwrap()
}

fn scheduler_throughput_benchmark(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("scheduler 1k events through transform+fold", |b| {
        b.to_async(&runtime).iter(|| async {
            let graph = build_graph();
            let report = graph.run(black_box(EventBurst { remaining: 1000 })).await;
            black_box(report.errors.len());
        });
    });
}

criterion_group!(benches, scheduler_throughput_benchmark);
criterion_main!(benches);
