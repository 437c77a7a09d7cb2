use criterion::{black_box, criterion_group, criterion_main, Criterion};
use genograph_model::{merge_edges_and_average_score, EdgeObservation};

fn fixture(n: usize) -> Vec<EdgeObservation> {
    (0..n)
        .map(|i| EdgeObservation {
            gene1: format!("g{}", i % 64),
            gene2: format!("g{}", (i * 7) % 64),
            interaction_type: ["PPI", "COEXPRESSION", "PATHWAY"][i % 3].to_string(),
            score: (i % 100) as f64 / 100.0,
        })
        .collect()
}

fn bench_merge_edges(c: &mut Criterion) {
    let small = fixture(128);
    let large = fixture(4096);

    c.bench_function("merge_edges_128", |b| {
        b.iter(|| merge_edges_and_average_score(black_box(&small)))
    });
    c.bench_function("merge_edges_4096", |b| {
        b.iter(|| merge_edges_and_average_score(black_box(&large)))
    });
}

criterion_group!(benches, bench_merge_edges);
criterion_main!(benches);
