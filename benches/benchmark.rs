// Benchmarks for corpus building and embedding evaluation
use basketvec_core::{build_corpus, EmbeddingTable, TransactionRecord, Vector};
use basketvec_eval::{nearest, pairwise_cosine_distances};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::prelude::*;

fn generate_random_vector(rng: &mut StdRng, dim: usize) -> Vector {
    let data: Vec<f32> = (0..dim).map(|_| rng.random_range(-1.0f32..1.0f32)).collect();
    Vector::new(data)
}

fn generate_table(size: usize, dim: usize) -> EmbeddingTable {
    let mut rng = StdRng::seed_from_u64(42);
    let rows = (0..size)
        .map(|i| (i.to_string(), generate_random_vector(&mut rng, dim)))
        .collect();
    EmbeddingTable::from_rows(dim, rows).unwrap()
}

fn generate_records(orders: u64, per_order: u32) -> Vec<TransactionRecord> {
    let mut rng = StdRng::seed_from_u64(7);
    let mut records: Vec<TransactionRecord> = (0..orders)
        .flat_map(|order| {
            (1..=per_order).map(move |pos| TransactionRecord::new(order, order * 31 % 5000, pos))
        })
        .collect();
    records.shuffle(&mut rng);
    records
}

fn benchmark_build_corpus(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_corpus");

    for orders in [1_000u64, 10_000, 100_000].iter() {
        let records = generate_records(*orders, 10);
        group.bench_with_input(BenchmarkId::new("shuffled", orders), &records, |b, records| {
            b.iter(|| black_box(build_corpus(black_box(records)).unwrap()));
        });
    }

    group.finish();
}

fn benchmark_nearest(c: &mut Criterion) {
    let mut group = c.benchmark_group("nearest");

    for size in [1_000, 10_000, 50_000].iter() {
        let table = generate_table(*size, 100);
        group.bench_with_input(BenchmarkId::new("top10", size), &table, |b, table| {
            b.iter(|| black_box(nearest(table, black_box("0"), 10, false).unwrap()));
        });
    }

    group.finish();
}

fn benchmark_pairwise(c: &mut Criterion) {
    let mut group = c.benchmark_group("pairwise_cosine");
    group.sample_size(10);

    for size in [500, 2_000].iter() {
        let table = generate_table(*size, 100);
        let rows: Vec<&[f32]> = table.iter().map(|(_, v)| v.as_slice()).collect();
        group.bench_with_input(BenchmarkId::new("dense", size), &rows, |b, rows| {
            b.iter(|| black_box(pairwise_cosine_distances(rows).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_build_corpus, benchmark_nearest, benchmark_pairwise);
criterion_main!(benches);
