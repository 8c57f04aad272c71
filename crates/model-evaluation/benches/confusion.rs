//! Benchmarks for confusion-matrix computation.
//!
//! Run with: cargo bench -p model-evaluation

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use model_evaluation::{Classification, ConfusionMatrix, FixedClassifier, Result};
use std::collections::HashMap;
use window_data::{DataWindow, LabeledWindow};

/// Buckets the window mean into one of four values
struct BucketClassifier;

impl FixedClassifier for BucketClassifier {
    fn classify(&self, window: &DataWindow) -> Result<HashMap<String, Classification>> {
        let samples = window.samples();
        let mean = samples.iter().sum::<f64>() / samples.len() as f64;
        let value = ["a", "b", "c", "d"][(mean.abs() as usize) % 4];
        Ok(HashMap::from([("bucket".to_string(), Classification::new("bucket", value, 1.0))]))
    }

    fn trained_label(&self) -> Option<&str> {
        Some("bucket")
    }
}

fn create_windows(count: usize) -> Vec<LabeledWindow> {
    (0..count)
        .map(|i| {
            let samples: Vec<f64> = (0..256).map(|j| ((i * 31 + j) % 17) as f64 * 0.25).collect();
            let value = ["a", "b", "c", "d"][i % 4];
            LabeledWindow::with_label(DataWindow::new(samples, 1000.0), "bucket", value)
        })
        .collect()
}

fn bench_compute(c: &mut Criterion) {
    let mut group = c.benchmark_group("confusion_compute");
    for count in [100, 1_000, 10_000] {
        let data = create_windows(count);
        group.throughput(Throughput::Elements(count as u64));
        for parallel in [false, true] {
            let name = if parallel { "parallel" } else { "serial" };
            group.bench_with_input(BenchmarkId::new(name, count), &data, |b, data| {
                b.iter(|| ConfusionMatrix::compute("bucket", &BucketClassifier, black_box(data), parallel))
            });
        }
    }
    group.finish();
}

fn bench_add(c: &mut Criterion) {
    let labels: Vec<String> = (0..1_000).map(|i| format!("v{}", i % 20)).collect();
    let shifted: Vec<String> = (0..1_000).map(|i| format!("v{}", (i + 3) % 20)).collect();
    let a = ConfusionMatrix::new("x", &labels, &labels).unwrap();
    let b = ConfusionMatrix::new("x", &labels, &shifted).unwrap();

    c.bench_function("confusion_add", |bench| bench.iter(|| black_box(&a).add(black_box(&b))));
}

criterion_group!(benches, bench_compute, bench_add);
criterion_main!(benches);
