use criterion::*;
use std::hint::black_box;

use staged_compute::{PrefixScan, BLOCK_SIZE};

mod gpu_common;
use gpu_common::*;

fn gpu_scan_hot_benchmark(c: &mut Criterion) {
    let Some(context) = bench_context() else { return };

    let n = 256 * BLOCK_SIZE;
    let values: Vec<f32> = (0..n).map(|i| (i % 7) as f32).collect();
    let scan = PrefixScan::new(context, n).unwrap();
    scan.seed(context, &values).unwrap();

    scan.execute(context).unwrap();

    c.bench_function("gpu_scan_hot_65536", |b| {
        b.iter(|| {
            black_box(scan.execute(context).unwrap());
        });
    });
}

criterion_group!(benches, gpu_scan_hot_benchmark);
criterion_main!(benches);
