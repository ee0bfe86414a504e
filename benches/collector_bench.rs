//! Collector 벤치마크
//!
//! stats 문서 디코딩과 record 매핑 성능 측정

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use uwsgi_exporter::collector::{decode_snapshot, emit};
use uwsgi_exporter::sink::Metric;

/// worker `n`개, worker당 app 2개인 stats 문서 생성
fn stats_document(workers: usize) -> String {
    let workers: Vec<String> = (1..=workers)
        .map(|id| {
            format!(
                r#"{{"id": {id}, "pid": {pid}, "requests": 1000, "delta_requests": 4,
                "accepting": 1, "status": "idle", "rss": 31457280, "vsz": 262144000,
                "running_time": 123456, "last_spawn": 1700000000, "respawn_count": 1,
                "tx": 8192, "avg_rt": 1520,
                "apps": [
                    {{"id": 0, "modifier1": 0, "mountpoint": "/", "requests": 600, "exceptions": 1, "chdir": "/srv/app"}},
                    {{"id": 1, "modifier1": 0, "mountpoint": "/admin", "requests": 400, "exceptions": 0, "chdir": "/srv/app"}}
                ]}}"#,
                id = id,
                pid = 1000 + id
            )
        })
        .collect();

    format!(
        r#"{{"version": "2.0.21", "listen_queue": 0, "load": 1, "pid": 1000,
        "uid": 33, "gid": 33, "cwd": "/srv/app", "workers": [{}]}}"#,
        workers.join(",")
    )
}

fn benchmark_decode_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_snapshot");

    for workers in [1, 16, 128] {
        let document = stats_document(workers);
        group.bench_with_input(
            BenchmarkId::new("workers", workers),
            &document,
            |b, doc| b.iter(|| decode_snapshot(doc.as_bytes())),
        );
    }

    group.bench_function("truncated", |b| {
        let document = stats_document(16);
        let truncated = &document.as_bytes()[..document.len() / 2];
        b.iter(|| decode_snapshot(truncated))
    });

    group.finish();
}

fn benchmark_emit(c: &mut Criterion) {
    let snapshot = decode_snapshot(stats_document(16).as_bytes());

    c.bench_function("emit/workers_16", |b| {
        b.iter(|| {
            let mut records: Vec<Metric> = Vec::with_capacity(64);
            emit(&snapshot, &mut records);
            records
        })
    });
}

criterion_group!(benches, benchmark_decode_snapshot, benchmark_emit);
criterion_main!(benches);
