//! Benchmark for transformation operations
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use onnx_graft::compose::{merge_models, MergeOptions};
use onnx_graft::opset::reconcile_opset;
use onnx_graft::proto::extensions::{make_float_initializer, make_node, make_tensor_value_info};
use onnx_graft::proto::{GraphProto, ModelProto, OperatorSetIdProto, ValueInfoProto};
use onnx_graft::validate::validate_model;

/// x -> Add(w_0) -> Add(w_1) -> ... `n` nodes deep
fn chain_model(n: usize) -> ModelProto {
    let mut nodes = Vec::with_capacity(n);
    let mut initializers = Vec::with_capacity(n);
    let mut prev = "x".to_string();
    for i in 0..n {
        let weight = format!("w_{i}");
        let out = format!("t_{i}");
        initializers.push(make_float_initializer(&weight, &[4], &[1.0, 2.0, 3.0, 4.0]));
        nodes.push(make_node(
            "Add",
            &[prev.as_str(), weight.as_str()],
            &[out.as_str()],
            &format!("add_{i}"),
        ));
        prev = out;
    }
    ModelProto {
        ir_version: 8,
        opset_import: vec![OperatorSetIdProto {
            domain: String::new(),
            version: 13,
        }],
        graph: Some(GraphProto {
            name: "chain".to_string(),
            node: nodes,
            input: vec![make_tensor_value_info("x", 1, &[4])],
            output: vec![ValueInfoProto {
                name: prev,
                ..Default::default()
            }],
            initializer: initializers,
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn transform_benchmark(c: &mut Criterion) {
    let model = chain_model(256);
    let other = chain_model(256);

    c.bench_function("validate_chain_256", |b| {
        b.iter(|| validate_model(black_box(&model)))
    });

    c.bench_function("reconcile_chain_256", |b| {
        b.iter(|| reconcile_opset(black_box(&model), 17))
    });

    c.bench_function("merge_chain_256", |b| {
        b.iter(|| {
            merge_models(
                black_box(&model),
                black_box(&other),
                &MergeOptions::default(),
            )
        })
    });
}

criterion_group!(benches, transform_benchmark);
criterion_main!(benches);
