//! Columnar Object Benchmarks
//!
//! | Benchmark | What it exercises |
//! |-----------|-------------------|
//! | columnar_write/* | shredding values into columns, segment spills, close |
//! | columnar_read/* | trailer scan, reassembly, full value reconstruction |
//! | columnar_cut/* | reading one leaf column without touching the rest |
//! | zng_encode/* | the row-oriented baseline for the same values |
//!
//! ## Running
//!
//! ```bash
//! cargo bench --bench columnar
//! cargo bench --bench columnar -- "columnar_cut"
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use zed::columnar::{Object, Writer, WriterConfig};
use zed::data::{to_value, CancellationToken, Context, FieldPath};
use zed::Value;

/// Fixed seed so that runs are comparable.
const BENCH_SEED: u64 = 0xBE7C;

#[derive(serde::Serialize)]
struct Flow {
    ts: i64,
    src: String,
    dst: String,
    bytes: u64,
    ports: Vec<u16>,
    score: f64,
}

fn flows(ctx: &Context, n: usize) -> Vec<Value> {
    let mut rng = StdRng::seed_from_u64(BENCH_SEED);
    (0..n)
        .map(|i| {
            let flow = Flow {
                ts: i as i64,
                src: format!("10.0.0.{}", rng.gen_range(0..255)),
                dst: format!("10.1.0.{}", rng.gen_range(0..255)),
                bytes: rng.gen_range(0..1_000_000),
                ports: (0..rng.gen_range(1..4)).map(|_| rng.gen()).collect(),
                score: rng.gen(),
            };
            to_value(ctx, &flow).expect("bench values marshal")
        })
        .collect()
}

fn write_object(values: &[Value], config: WriterConfig) -> Vec<u8> {
    let mut w = Writer::new(Vec::new(), config).expect("valid config");
    for v in values {
        w.write(v).expect("write");
    }
    w.close().expect("close")
}

fn bench_write(c: &mut Criterion) {
    let ctx = Context::new();
    let mut group = c.benchmark_group("columnar_write");
    for n in [1_000usize, 10_000] {
        let values = flows(&ctx, n);
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::new("default", n), &values, |b, values| {
            b.iter(|| black_box(write_object(values, WriterConfig::default())))
        });
        group.bench_with_input(BenchmarkId::new("small_segments", n), &values, |b, values| {
            let config = WriterConfig::default()
                .with_segment_thresh(4096)
                .with_skew_thresh(64 * 1024);
            b.iter(|| black_box(write_object(values, config)))
        });
    }
    group.finish();
}

fn bench_read(c: &mut Criterion) {
    let ctx = Arc::new(Context::new());
    let mut group = c.benchmark_group("columnar_read");
    for n in [1_000usize, 10_000] {
        let object = bytes::Bytes::from(write_object(&flows(&ctx, n), WriterConfig::default()));
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::new("all", n), &object, |b, object| {
            b.iter(|| {
                let mut obj = Object::from_bytes(ctx.clone(), object.clone()).expect("open");
                let mut count = 0;
                while let Some(v) = obj.read().expect("read") {
                    black_box(v);
                    count += 1;
                }
                count
            })
        });
    }
    group.finish();
}

fn bench_cut(c: &mut Criterion) {
    let ctx = Arc::new(Context::new());
    let n = 10_000usize;
    let object = bytes::Bytes::from(write_object(&flows(&ctx, n), WriterConfig::default()));
    let obj = Object::from_bytes(ctx, object).expect("open");
    let path: FieldPath = "bytes".parse().expect("path");

    let mut group = c.benchmark_group("columnar_cut");
    group.throughput(Throughput::Elements(n as u64));
    group.bench_function("one_leaf", |b| {
        b.iter(|| {
            let mut cut = obj.cut(&path, CancellationToken::new()).expect("cut");
            let mut sum = 0u64;
            while let Some(v) = cut.read().expect("read") {
                sum += v.as_uint().unwrap_or(0);
            }
            sum
        })
    });
    group.finish();
}

fn bench_zng(c: &mut Criterion) {
    let ctx = Context::new();
    let n = 10_000usize;
    let values = flows(&ctx, n);
    let mut group = c.benchmark_group("zng_encode");
    group.throughput(Throughput::Elements(n as u64));
    group.bench_function("flows", |b| {
        b.iter(|| black_box(zed::zng::encode_all(&values).expect("encode")))
    });
    group.finish();
}

criterion_group!(benches, bench_write, bench_read, bench_cut, bench_zng);
criterion_main!(benches);
