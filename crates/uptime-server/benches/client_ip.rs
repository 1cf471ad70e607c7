// Benchmark client IP resolution on the connection hot path
// Compare trusted and untrusted proxy handling

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use http::HeaderMap;
use std::hint::black_box;
use uptime_server::ConnectionInfo;
use uptime_server::client_ip::resolve_client_ip;

fn info(headers: &[(&'static str, &str)], remote: &str) -> ConnectionInfo {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        map.insert(*name, value.parse().unwrap());
    }
    ConnectionInfo {
        headers: map,
        remote_addr: Some(remote.to_string()),
    }
}

fn bench_resolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve_client_ip");

    let cases = [
        ("direct", info(&[], "::ffff:10.0.0.5")),
        ("cloudflare", info(&[("cf-connecting-ip", "198.51.100.7")], "10.0.0.5")),
        (
            "forwarded_chain",
            info(
                &[
                    ("x-forwarded-for", "1.2.3.4, 5.6.7.8, 10.0.0.1"),
                    ("x-real-ip", "9.9.9.9"),
                ],
                "::ffff:10.0.0.5",
            ),
        ),
    ];

    for (name, conn) in &cases {
        for trust_proxy in [false, true] {
            group.bench_with_input(
                BenchmarkId::new(*name, trust_proxy),
                &trust_proxy,
                |b, &trust| b.iter(|| resolve_client_ip(black_box(conn), black_box(trust))),
            );
        }
    }

    group.finish();
}

criterion_group!(benches, bench_resolve);
criterion_main!(benches);
