use criterion::{black_box, criterion_group, criterion_main, Criterion};
use sidepool_crypto::{blake2b_256, derive_chained_seed, hash_template};
use sidepool_types::ChainId;

fn bench_hashing(c: &mut Criterion) {
    let blob = vec![0xABu8; 1024];

    c.bench_function("blake2b_256_1k", |b| {
        b.iter(|| blake2b_256(black_box(&blob)))
    });

    // Roughly the shape of a template-id preimage: main blob + side blob +
    // domain id.
    let main_blob = vec![0x01u8; 400];
    let side_blob = vec![0x02u8; 250];
    let domain = [0x03u8; 32];
    c.bench_function("hash_template", |b| {
        b.iter(|| hash_template(black_box(&[&main_blob, &side_blob, &domain])))
    });

    let seed = ChainId([4; 32]);
    let prev = ChainId([5; 32]);
    c.bench_function("derive_chained_seed", |b| {
        b.iter(|| derive_chained_seed(black_box(&seed), black_box(&prev)))
    });
}

criterion_group!(benches, bench_hashing);
criterion_main!(benches);
