use criterion::{criterion_group, criterion_main, Criterion};
use hashchain_core::{constants::DEFAULT_DIFFICULTY, mine::mine_parallel, Block, StopSignal};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde_json::json;

fn candidate(rng: &mut StdRng) -> Block {
    let transfers: Vec<_> = (0..10)
        .map(|i| json!({ "from": format!("alice-{i}"), "to": "bob", "amount": rng.gen_range(1..10) }))
        .collect();
    Block::new(1, "01/01/2018", transfers)
}

fn bench_pow(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(42);
    let block = candidate(&mut rng);
    let difficulty = DEFAULT_DIFFICULTY + 2;

    c.bench_function("mine_sequential_difficulty_4", |b| {
        b.iter(|| {
            let mut mined = block.clone();
            mined.mine(difficulty)
        });
    });

    c.bench_function("mine_parallel_difficulty_4", |b| {
        let stop = StopSignal::new();
        b.iter(|| {
            let mut mined = block.clone();
            mine_parallel(&mut mined, difficulty, &stop)
        });
    });
}

criterion_group!(benches, bench_pow);
criterion_main!(benches);
