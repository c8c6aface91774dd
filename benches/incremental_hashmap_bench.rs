use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use incremental_hashmap::IncrementalHashMap;
use std::time::{Duration, Instant};

fn lcg(mut s: u64) -> impl Iterator<Item = u64> {
    std::iter::from_fn(move || {
        s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
        Some(s)
    })
}

fn key(n: u64) -> String {
    format!("k{:016x}", n)
}

fn bench_insert(c: &mut Criterion) {
    c.bench_function("incremental_hashmap_insert_10k", |b| {
        b.iter_batched(
            || IncrementalHashMap::<String, u64>::with_capacity(16),
            |mut m| {
                for (i, x) in lcg(1).take(10_000).enumerate() {
                    m.set(key(x), i as u64);
                }
                black_box(m)
            },
            BatchSize::SmallInput,
        )
    });
    c.bench_function("hashbrown_insert_10k", |b| {
        b.iter_batched(
            || hashbrown::HashMap::<String, u64>::with_capacity(16),
            |mut m| {
                for (i, x) in lcg(1).take(10_000).enumerate() {
                    m.insert(key(x), i as u64);
                }
                black_box(m)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_get_hit(c: &mut Criterion) {
    c.bench_function("incremental_hashmap_get_hit", |b| {
        let mut m = IncrementalHashMap::new();
        let keys: Vec<_> = lcg(7).take(20_000).map(key).collect();
        for (i, k) in keys.iter().cloned().enumerate() {
            m.set(k, i as u64);
        }
        let mut it = keys.iter().cycle();
        b.iter(|| {
            let k = it.next().unwrap();
            black_box(m.get(k.as_str()).is_ok());
        })
    });
}

fn bench_get_miss(c: &mut Criterion) {
    c.bench_function("incremental_hashmap_get_miss", |b| {
        let mut m = IncrementalHashMap::new();
        for (i, x) in lcg(11).take(10_000).enumerate() {
            m.set(key(x), i as u64);
        }
        let mut miss = lcg(0xdead_beef);
        b.iter(|| {
            // generate keys unlikely in map
            let k = key(miss.next().unwrap());
            black_box(m.get(k.as_str()).is_err());
        })
    });
}

// Slowest calls while growing from one bucket to 100k keys. Reported as
// the summed time of the 100 slowest `set` calls per iteration, so a
// stop-the-world rehash would dominate it.
fn bench_growth_tail_latency(c: &mut Criterion) {
    c.bench_function("incremental_hashmap_growth_tail_100k", |b| {
        b.iter_custom(|iters| {
            let mut total = Duration::ZERO;
            for _ in 0..iters {
                let mut m = IncrementalHashMap::<u64, u64>::with_capacity(1);
                let mut samples = Vec::with_capacity(100_000);
                for (i, x) in lcg(3).take(100_000).enumerate() {
                    let t = Instant::now();
                    m.set(x, i as u64);
                    samples.push(t.elapsed());
                }
                samples.sort_unstable();
                total += samples.iter().rev().take(100).sum::<Duration>();
            }
            total
        })
    });
}

fn bench_config() -> Criterion {
    Criterion::default()
        .sample_size(50)
        .measurement_time(Duration::from_secs(8))
        .warm_up_time(Duration::from_secs(2))
}

criterion_group! {
    name = benches;
    config = bench_config();
    targets = bench_insert, bench_get_hit, bench_get_miss, bench_growth_tail_latency
}
criterion_main!(benches);
