//! Benchmarks for domain list lookup.
//!
//! Measures how quickly a query is checked against a routing list.

use criterion::{BenchmarkId, Criterion, Throughput, black_box};
use std::str::FromStr;

use hickory_proto::op::{Message, Query};
use hickory_proto::rr::{Name, RecordType};

use junction::matcher::{DomainList, Matcher};

fn query(domain: &str) -> Message {
    let mut message = Message::new();
    message.add_query(Query::query(Name::from_str(domain).unwrap(), RecordType::A));
    message
}

fn build_list(size: usize) -> DomainList {
    let mut domains: Vec<String> = (0..size).map(|i| format!("site{i}.example")).collect();
    domains.push("corp.internal".to_string());
    DomainList::new("bench", domains)
}

fn bench_contains(c: &mut Criterion) {
    let list = build_list(10_000);

    let mut group = c.benchmark_group("domain_list");
    group.throughput(Throughput::Elements(1));

    group.bench_function(BenchmarkId::new("contains", "exact_match"), |b| {
        b.iter(|| list.contains(black_box("corp.internal")))
    });

    group.bench_function(BenchmarkId::new("contains", "subdomain_match"), |b| {
        b.iter(|| list.contains(black_box("git.eu.corp.internal")))
    });

    group.bench_function(BenchmarkId::new("contains", "miss"), |b| {
        b.iter(|| list.contains(black_box("www.google.com")))
    });

    group.bench_function(BenchmarkId::new("contains", "deep_miss"), |b| {
        b.iter(|| list.contains(black_box("a.b.c.d.e.f.example.org")))
    });

    group.finish();
}

fn bench_matches(c: &mut Criterion) {
    let list = build_list(10_000);
    let hit = query("Git.Corp.Internal.");
    let miss = query("www.example.org.");

    let mut group = c.benchmark_group("matcher");
    group.throughput(Throughput::Elements(1));

    group.bench_function(BenchmarkId::new("matches", "hit"), |b| {
        b.iter(|| list.matches(black_box(&hit)))
    });

    group.bench_function(BenchmarkId::new("matches", "miss"), |b| {
        b.iter(|| list.matches(black_box(&miss)))
    });

    group.finish();
}

fn main() {
    let mut criterion = Criterion::default().configure_from_args();
    bench_contains(&mut criterion);
    bench_matches(&mut criterion);
    criterion.final_summary();
}
