use criterion::*;
use std::hint::black_box;

use staged_compute::{TotalReduce, BLOCK_SIZE};

mod gpu_common;
use gpu_common::*;

fn gpu_reduce_hot_benchmark(c: &mut Criterion) {
    let Some(context) = bench_context() else { return };

    let n = BLOCK_SIZE * BLOCK_SIZE;
    let reduce = TotalReduce::new(context, n).unwrap();
    reduce.seed(context, &vec![1.0f32; n as usize]).unwrap();

    // Warm the pipelines before measuring the hot path.
    reduce.execute(context).unwrap();

    c.bench_function("gpu_reduce_hot_65536", |b| {
        b.iter(|| {
            black_box(reduce.execute(context).unwrap());
        });
    });
}

criterion_group!(benches, gpu_reduce_hot_benchmark);
criterion_main!(benches);
