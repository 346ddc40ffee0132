use criterion::{black_box, criterion_group, criterion_main, Criterion};
use page_preview::{
    format_bytes, Anchor, Config, CropSpec, Dimensions, JobPaths, OutputSizes, PreviewRequest,
    Viewport,
};
use serde_json::json;
use std::time::Duration;

// Fast settings for all benchmarks
fn configure_fast_group(group: &mut criterion::BenchmarkGroup<criterion::measurement::WallTime>) {
    group.warm_up_time(Duration::from_millis(500));
    group.measurement_time(Duration::from_millis(500));
    group.sample_size(20);
}

fn benchmark_request_prepare(c: &mut Criterion) {
    let mut group = c.benchmark_group("request");
    configure_fast_group(&mut group);

    let config = Config::default();
    let sizes: OutputSizes = (0..10)
        .map(|i| (format!("size{i}"), Dimensions::new(100 + i, 75 + i)))
        .collect();
    let request = PreviewRequest::new("https://example.com", "job", "/tmp/previews")
        .with_viewport(Viewport::new(1280, 800))
        .with_output_sizes(sizes);

    group.bench_function("prepare", |b| {
        b.iter(|| black_box(request.prepare(&config)));
    });

    let value = json!({
        "url": "https://example.com",
        "name": "job",
        "parentDirectory": "/tmp/previews",
        "viewport": {"width": 1280, "height": 800},
        "outputSizes": {"thumb": {"width": 100, "height": 75}, "bad": "x"}
    });

    group.bench_function("from_value", |b| {
        b.iter(|| black_box(PreviewRequest::from_value(&value)));
    });

    group.finish();
}

fn benchmark_job_paths(c: &mut Criterion) {
    let mut group = c.benchmark_group("job_paths");
    configure_fast_group(&mut group);

    group.bench_function("path_for", |b| {
        let mut paths = JobPaths::new("/tmp/previews/job");
        b.iter(|| black_box(paths.path_for("medium")));
    });

    group.finish();
}

fn benchmark_crop_region(c: &mut Criterion) {
    let mut group = c.benchmark_group("crop_region");
    configure_fast_group(&mut group);

    let crop = CropSpec {
        width: 1024,
        height: 768,
        x: 0,
        y: 0,
        anchor: Anchor::North,
    };

    group.bench_function("north", |b| {
        b.iter(|| black_box(crop.region(black_box(1280), black_box(4000))));
    });

    group.bench_function("format_bytes", |b| {
        b.iter(|| black_box(format_bytes(black_box(734_003))));
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_request_prepare,
    benchmark_job_paths,
    benchmark_crop_region
);
criterion_main!(benches);
