use criterion::{criterion_group, criterion_main, Criterion};
use diary_core::{pow::Difficulty, DiaryEntry, Identity, Miner, SearchStrategy};
use std::hint::black_box;

fn bench_pow(c: &mut Criterion) {
    let identity = Identity::parse("bench").unwrap();
    let genesis = Miner::default().seal_genesis(&identity).unwrap();

    let sequential = Miner::new(Difficulty::default(), u64::MAX);
    c.bench_function("seal_hex_prefix_000", |b| {
        b.iter(|| {
            let _sealed = sequential.seal(black_box(&genesis), DiaryEntry::new("bench entry"));
        });
    });

    let parallel = Miner::new(Difficulty::LeadingZeroBits(16), u64::MAX)
        .with_strategy(SearchStrategy::Parallel);
    c.bench_function("seal_parallel_16_bits", |b| {
        b.iter(|| {
            let _sealed = parallel.seal(black_box(&genesis), DiaryEntry::new("bench entry"));
        });
    });
}

criterion_group!(benches, bench_pow);
criterion_main!(benches);
