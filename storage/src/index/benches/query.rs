use super::{populate, DISTINCT_VALUES};
use criterion::{criterion_group, Criterion};
use rand::{rngs::StdRng, Rng, SeedableRng};

fn bench_query(c: &mut Criterion) {
    for buckets in [1_024, 65_536] {
        let dir = tempfile::tempdir().unwrap();
        let mut index = populate(&dir.path().join("bench.idx"), buckets, 50_000);
        let mut rng = StdRng::seed_from_u64(1);
        c.bench_function(&format!("{}/buckets={}", module_path!(), buckets), |b| {
            b.iter(|| {
                let value = format!("value-{}", rng.gen_range(0..DISTINCT_VALUES));
                index.query(&value).unwrap().count()
            });
        });
    }
}

criterion_group! {
    name = benches;
    config = Criterion::default().sample_size(10);
    targets = bench_query
}
