// Benchmarks for the config long-poll listener payload encoder
// Measures Listening-Configs payload construction as watch-set size grows

use batata_client::model::{ConfigKey, WatchedConfig};
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

fn watch_set(n: usize) -> Vec<WatchedConfig> {
    (0..n)
        .map(|i| {
            let key = ConfigKey::new(format!("data-id-{i}"), "DEFAULT_GROUP");
            WatchedConfig::new(key, format!("content-body-{i}"))
        })
        .collect()
}

fn bench_build_listening_payload(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_listening_payload");

    for size in [1usize, 10, 100, 1000] {
        let entries = watch_set(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &entries, |b, entries| {
            b.iter(|| batata_client::config::build_listening_payload(black_box(entries)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_build_listening_payload);
criterion_main!(benches);
