//! Performance benchmarks for profile resolution and event collection.
//!
//! Run with: `cargo bench --bench resolution`
//!
//! ## Performance Targets
//!
//! | Operation | Target | Notes |
//! |-----------|--------|-------|
//! | Heuristic classification | <50µs p99 | Precompiled patterns, 512-byte cap |
//! | Full request resolution | <50ms p99 | Soft budget, usually microseconds |
//! | Concurrent resolution | Linear scaling | Shared immutable resolver |
//! | Aggregation | Linear in events | One pass over the log |

use criterion::{
    black_box, criterion_group, criterion_main,
    BenchmarkId, Criterion, Throughput,
};
use std::sync::Arc;
use std::thread;

use visitor_signals::{
    aggregate, classify, ElementInfo, ManualClock, MemoryStorage, PageContext,
    ProfileResolver, RequestParts, TelemetryCollector,
};

const USER_AGENTS: &[(&str, &str)] = &[
    ("desktop", "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36"),
    ("iphone", "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 Mobile/15E148"),
    ("legacy", "Mozilla/5.0 (Linux; U; Android 4.0.3; ko-kr; LG-L160L Build/IML74K)"),
    ("empty", ""),
];

/// Build a request with a cookie header of the given number of unrelated pairs.
fn make_cookie_header(pairs: usize) -> String {
    let mut header: Vec<String> = (0..pairs).map(|i| format!("c{i}=v{i}")).collect();
    header.push("visitor_profile=jovem".to_string());
    header.join("; ")
}

/// Benchmark the User-Agent heuristic alone.
fn bench_classify(c: &mut Criterion) {
    let mut group = c.benchmark_group("classify");

    for (name, ua) in USER_AGENTS {
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::new("ua", name), ua, |b, ua| {
            b.iter(|| classify(black_box(ua)))
        });
    }

    // Oversized input is truncated, so cost should stay flat.
    let huge = "x".repeat(64 * 1024);
    group.bench_function("ua/64k", |b| b.iter(|| classify(black_box(&huge))));

    group.finish();
}

/// Benchmark full request resolution with growing cookie headers.
fn bench_resolve_request(c: &mut Criterion) {
    let resolver = ProfileResolver::default();
    let ua = USER_AGENTS[0].1;

    let mut group = c.benchmark_group("resolve_request");

    for pairs in [0, 10, 50] {
        let cookie = make_cookie_header(pairs);

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::new("cookie_pairs", pairs), &cookie, |b, cookie| {
            b.iter(|| {
                let parts = RequestParts {
                    query: Some("utm_source=x&page=2"),
                    cookie_header: Some(cookie.as_bytes()),
                    user_agent: Some(ua.as_bytes()),
                    ..RequestParts::default()
                };
                resolver.resolve_request(black_box(&parts))
            })
        });
    }

    group.finish();
}

/// Benchmark one shared resolver across threads.
fn bench_resolver_contention(c: &mut Criterion) {
    let resolver = Arc::new(ProfileResolver::default());

    let mut group = c.benchmark_group("resolver_contention");

    for num_threads in [1, 2, 4, 8] {
        group.throughput(Throughput::Elements(num_threads as u64 * 100));
        group.bench_with_input(
            BenchmarkId::new("threads", num_threads),
            &num_threads,
            |b, &n| {
                b.iter(|| {
                    let handles: Vec<_> = (0..n)
                        .map(|i| {
                            let r = Arc::clone(&resolver);
                            let ua = USER_AGENTS[i % USER_AGENTS.len()].1;
                            thread::spawn(move || {
                                for _ in 0..100 {
                                    let parts = RequestParts {
                                        user_agent: Some(ua.as_bytes()),
                                        ..RequestParts::default()
                                    };
                                    black_box(r.resolve_request(&parts));
                                }
                            })
                        })
                        .collect();

                    for h in handles {
                        h.join().unwrap();
                    }
                })
            },
        );
    }

    group.finish();
}

/// Benchmark aggregation over sessions of increasing length.
fn bench_aggregate(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregate");

    for pages in [1, 10, 100] {
        let mut collector = TelemetryCollector::builder(Arc::new(MemoryStorage::new()))
            .clock(Arc::new(ManualClock::new(0)))
            .build();
        for i in 0..pages {
            let page = PageContext::parse(&format!("https://site.test/p{}", i % 7))
                .unwrap()
                .with_referrer("https://www.google.com/search?q=clinica");
            collector.begin_page(page);
            collector.record_scroll_percent(80);
            collector.on_click(&[ElementInfo::new("a").with_text("Saiba mais")]);
        }
        collector.end_page();

        let events = collector.events().to_vec();
        group.throughput(Throughput::Elements(events.len() as u64));
        group.bench_with_input(BenchmarkId::new("pages", pages), &events, |b, events| {
            b.iter(|| aggregate(black_box(events), None))
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_classify,
    bench_resolve_request,
    bench_resolver_contention,
    bench_aggregate,
);

criterion_main!(benches);
