//! Benchmarks for the routing hot path
//!
//! This benchmark measures:
//! - Text classification against the default keyword rules
//! - Route plan resolution per category
//! - Metrics recording under a full latency window
//! - A whole request that lands on the fallback responder

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::time::Duration;

use ai_nihongo_router::{
    AttemptRecord, ClassifierConfig, MetricsCollector, OrchestrationRequest, OrchestratorBuilder,
    ProviderRegistry, ProviderId, RoutingPolicy, RoutingTable, SimpleResponder, TaskCategory,
    TaskClassifier,
};
use std::sync::Arc;

const SAMPLE_TEXTS: &[(&str, &str)] = &[
    ("short_question", "これは何？"),
    ("translation", "Translate 猫が好きです to English please"),
    ("grammar", "Can you explain the particle は versus が in this sentence"),
    ("vocabulary", "Search JLPT N3 vocabulary about weather"),
    (
        "long_chat",
        "今日は天気がいいですね。週末に友達と京都へ行く予定です。おすすめの場所があれば教えてください。",
    ),
];

fn bench_classify(c: &mut Criterion) {
    let classifier = TaskClassifier::new(ClassifierConfig::default()).unwrap();
    let mut group = c.benchmark_group("classify");

    for (name, text) in SAMPLE_TEXTS {
        group.bench_with_input(BenchmarkId::new("default_rules", name), text, |b, text| {
            b.iter(|| classifier.classify(black_box(text), None))
        });
    }

    group.finish();
}

fn bench_resolve(c: &mut Criterion) {
    let registry = ProviderRegistry::default();
    registry
        .register(Arc::new(SimpleResponder::with_id("local")))
        .unwrap();
    registry
        .register(Arc::new(SimpleResponder::with_id("ollama")))
        .unwrap();
    let policy = RoutingPolicy::new(RoutingTable::default());
    let mut group = c.benchmark_group("resolve");

    for category in TaskCategory::ALL {
        group.bench_with_input(
            BenchmarkId::new("default_table", category.as_str()),
            &category,
            |b, category| b.iter(|| policy.resolve(black_box(*category), None, &registry)),
        );
    }

    let override_id = ProviderId::from("ollama");
    group.bench_function("with_override", |b| {
        b.iter(|| {
            policy.resolve(TaskCategory::Translation, Some(black_box(&override_id)), &registry)
        })
    });

    group.finish();
}

fn bench_metrics(c: &mut Criterion) {
    let metrics = MetricsCollector::default();
    let record = AttemptRecord::success(
        ProviderId::from("ollama"),
        TaskCategory::Chat,
        Duration::from_millis(42),
    );
    for _ in 0..metrics.latency_window() {
        metrics.record(&record);
    }

    let mut group = c.benchmark_group("metrics");
    group.bench_function("record", |b| b.iter(|| metrics.record(black_box(&record))));
    group.bench_function("snapshot", |b| b.iter(|| metrics.snapshot()));
    group.finish();
}

fn bench_fallback_request(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let orchestrator = OrchestratorBuilder::new()
        .without_builtin_adapters()
        .build()
        .unwrap();

    c.bench_function("execute/fallback_only", |b| {
        b.to_async(&runtime).iter(|| async {
            orchestrator
                .execute(OrchestrationRequest::new(black_box("日本語を勉強しています")))
                .await
                .unwrap()
        })
    });
}

criterion_group!(
    benches,
    bench_classify,
    bench_resolve,
    bench_metrics,
    bench_fallback_request
);
criterion_main!(benches);
