use criterion::{criterion_group, criterion_main, Criterion};
use ledger_core::{Block, LedgerConfig, Transaction, Wallet};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::hint::black_box;

fn bench_pow(c: &mut Criterion) {
    c.bench_function("mine_block_difficulty_3", |b| {
        let config = LedgerConfig::default();
        let mut rng = StdRng::seed_from_u64(42);
        let sender = Wallet::new(&config);
        let txs: Vec<Transaction> = (0..10)
            .map(|i| {
                Transaction::new(&sender, &format!("bob-{i}"), rng.gen_range(1..10), 1_000)
                    .expect("amount within balance")
            })
            .collect();
        let data = serde_json::to_value(&txs).expect("transactions serialize");
        let genesis = Block::genesis(&config);

        b.iter(|| {
            black_box(Block::mine(&genesis, black_box(data.clone()), &config))
        });
    });
}

criterion_group!(benches, bench_pow);
criterion_main!(benches);
