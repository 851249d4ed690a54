use core::hash::BuildHasher;
use core::hint::black_box;

use criterion::Criterion;
use criterion::Throughput;
use criterion::criterion_group;
use criterion::criterion_main;
use hashbrown::HashMap as HashbrownHashMap;
use ordhash::OrderedMap;
use rand::TryRngCore;
use rand::rngs::OsRng;
use siphasher::sip::SipHasher;
use std::collections::HashMap as StdHashMap;

#[derive(Clone)]
struct SipHashBuilder {
    k1: u64,
    k2: u64,
}

impl BuildHasher for SipHashBuilder {
    type Hasher = SipHasher;

    fn build_hasher(&self) -> Self::Hasher {
        SipHasher::new_with_keys(self.k1, self.k2)
    }
}

impl Default for SipHashBuilder {
    fn default() -> Self {
        let mut rng = OsRng;
        Self {
            k1: rng.try_next_u64().unwrap_or(0),
            k2: rng.try_next_u64().unwrap_or(0),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct TestItem {
    key: String,
    value: u64,
}

impl TestItem {
    fn new(key: u64) -> Self {
        black_box(Self {
            key: format!("key_{}", key),
            value: key,
        })
    }
}

const SIZES: &[usize] = &[
    ((1 << 10) as f32 * 0.87) as usize,
    ((1 << 15) as f32 * 0.87) as usize,
    ((1 << 19) as f32 * 0.87) as usize,
];

fn bench_insert_sequential(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert_sequential");

    for size in SIZES.iter() {
        let items = (0..*size)
            .map(|i| TestItem::new(i as u64))
            .collect::<Vec<_>>();

        group.throughput(Throughput::Elements(*size as u64));
        group.bench_function(format!("ordhash/{}", size), |b| {
            b.iter(|| {
                let mut map = OrderedMap::with_hasher(SipHashBuilder::default());
                for item in items.iter() {
                    map.insert(black_box(item.key.clone()), black_box(item.value));
                }
                black_box(map.len())
            });
        });

        group.bench_function(format!("std/{}", size), |b| {
            b.iter(|| {
                let mut map = StdHashMap::with_hasher(SipHashBuilder::default());
                for item in items.iter() {
                    map.insert(black_box(item.key.clone()), black_box(item.value));
                }
                black_box(map.len())
            });
        });

        group.bench_function(format!("hashbrown/{}", size), |b| {
            b.iter(|| {
                let mut map = HashbrownHashMap::with_hasher(SipHashBuilder::default());
                for item in items.iter() {
                    map.insert(black_box(item.key.clone()), black_box(item.value));
                }
                black_box(map.len())
            });
        });
    }

    group.finish();
}

fn bench_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("lookup_hit");

    for size in SIZES.iter() {
        let items = (0..*size)
            .map(|i| TestItem::new(i as u64))
            .collect::<Vec<_>>();

        let hasher = SipHashBuilder::default();
        let mut ord = OrderedMap::with_hasher(hasher.clone());
        let mut std_map = StdHashMap::with_hasher(hasher.clone());
        let mut brown = HashbrownHashMap::with_hasher(hasher);
        for item in items.iter() {
            ord.insert(item.key.clone(), item.value);
            std_map.insert(item.key.clone(), item.value);
            brown.insert(item.key.clone(), item.value);
        }

        group.throughput(Throughput::Elements(*size as u64));
        group.bench_function(format!("ordhash/{}", size), |b| {
            b.iter(|| {
                let mut sum = 0u64;
                for item in items.iter() {
                    sum = sum.wrapping_add(*ord.get(black_box(&item.key)).unwrap());
                }
                black_box(sum)
            });
        });

        group.bench_function(format!("std/{}", size), |b| {
            b.iter(|| {
                let mut sum = 0u64;
                for item in items.iter() {
                    sum = sum.wrapping_add(*std_map.get(black_box(&item.key)).unwrap());
                }
                black_box(sum)
            });
        });

        group.bench_function(format!("hashbrown/{}", size), |b| {
            b.iter(|| {
                let mut sum = 0u64;
                for item in items.iter() {
                    sum = sum.wrapping_add(*brown.get(black_box(&item.key)).unwrap());
                }
                black_box(sum)
            });
        });
    }

    group.finish();
}

fn bench_lookup_miss(c: &mut Criterion) {
    let mut group = c.benchmark_group("lookup_miss");

    for size in SIZES.iter() {
        let items = (0..*size)
            .map(|i| TestItem::new(i as u64))
            .collect::<Vec<_>>();
        let misses = (0..*size)
            .map(|i| format!("missing_{}", i))
            .collect::<Vec<_>>();

        let hasher = SipHashBuilder::default();
        let mut ord = OrderedMap::with_hasher(hasher.clone());
        let mut brown = HashbrownHashMap::with_hasher(hasher);
        for item in items.iter() {
            ord.insert(item.key.clone(), item.value);
            brown.insert(item.key.clone(), item.value);
        }

        group.throughput(Throughput::Elements(*size as u64));
        group.bench_function(format!("ordhash/{}", size), |b| {
            b.iter(|| {
                let mut found = 0usize;
                for key in misses.iter() {
                    found += ord.get(black_box(key)).is_some() as usize;
                }
                black_box(found)
            });
        });

        group.bench_function(format!("hashbrown/{}", size), |b| {
            b.iter(|| {
                let mut found = 0usize;
                for key in misses.iter() {
                    found += brown.get(black_box(key)).is_some() as usize;
                }
                black_box(found)
            });
        });
    }

    group.finish();
}

fn bench_iterate(c: &mut Criterion) {
    let mut group = c.benchmark_group("iterate");

    for size in SIZES.iter() {
        let hasher = SipHashBuilder::default();
        let mut ord = OrderedMap::with_hasher(hasher.clone());
        let mut brown = HashbrownHashMap::with_hasher(hasher);
        for i in 0..*size {
            let item = TestItem::new(i as u64);
            ord.insert(item.key.clone(), item.value);
            brown.insert(item.key, item.value);
        }

        group.throughput(Throughput::Elements(*size as u64));
        group.bench_function(format!("ordhash/{}", size), |b| {
            b.iter(|| {
                let mut sum = 0u64;
                for (_, value) in ord.iter() {
                    sum = sum.wrapping_add(*value);
                }
                black_box(sum)
            });
        });

        group.bench_function(format!("hashbrown/{}", size), |b| {
            b.iter(|| {
                let mut sum = 0u64;
                for (_, value) in brown.iter() {
                    sum = sum.wrapping_add(*value);
                }
                black_box(sum)
            });
        });
    }

    group.finish();
}

fn bench_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert_remove_churn");

    for size in SIZES.iter().take(2) {
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_function(format!("ordhash/{}", size), |b| {
            b.iter(|| {
                let mut map = OrderedMap::with_hasher(SipHashBuilder::default());
                for i in 0..*size as u64 {
                    map.insert(i, i);
                    if i % 3 == 0 {
                        map.remove(&(i / 2));
                    }
                }
                black_box(map.len())
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_insert_sequential,
    bench_lookup,
    bench_lookup_miss,
    bench_iterate,
    bench_churn
);
criterion_main!(benches);
