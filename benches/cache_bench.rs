//! Benchmarks for the query cache.
//!
//! Run with: cargo bench --bench cache_bench

use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use std::net::Ipv4Addr;
use std::str::FromStr;
use std::time::Duration;

use hickory_proto::op::{Message, MessageType, Query};
use hickory_proto::rr::rdata::A;
use hickory_proto::rr::{Name, RData, Record, RecordType};

use junction::cache::{QueryCache, cache_ttl};
use junction::dns::Fingerprint;

fn create_query(id: u16, domain: &str) -> Message {
    let mut message = Message::new();
    message.set_id(id).set_recursion_desired(true);
    message.add_query(Query::query(Name::from_str(domain).unwrap(), RecordType::A));
    message
}

fn create_response(query: &Message) -> Message {
    let mut response = query.clone();
    response.set_message_type(MessageType::Response);
    let name = query.queries()[0].name().clone();
    response.add_answer(Record::from_rdata(
        name,
        300,
        RData::A(A(Ipv4Addr::new(93, 184, 216, 34))),
    ));
    response
}

fn bench_fingerprint(c: &mut Criterion) {
    let short = create_query(0x1234, "example.com.");
    let long = create_query(0x1234, "Subdomain.Example.Domain.COM.");

    c.bench_function("fingerprint_short", |b| {
        b.iter(|| Fingerprint::of(black_box(&short)))
    });

    c.bench_function("fingerprint_long_mixed_case", |b| {
        b.iter(|| Fingerprint::of(black_box(&long)))
    });
}

fn bench_cache_ttl(c: &mut Criterion) {
    let response = create_response(&create_query(1, "example.com."));

    c.bench_function("cache_ttl", |b| b.iter(|| cache_ttl(black_box(&response))));
}

fn bench_get(c: &mut Criterion) {
    let cache = QueryCache::new();
    for i in 0..1000u16 {
        let query = create_query(i, &format!("host{i}.example.com."));
        let fingerprint = Fingerprint::of(&query).unwrap();
        cache.put(fingerprint, &create_response(&query), Duration::from_secs(300));
    }

    let hit_query = create_query(0x4242, "Host500.Example.COM.");
    let miss_query = create_query(0x4242, "absent.example.com.");
    let hit = Fingerprint::of(&hit_query).unwrap();
    let miss = Fingerprint::of(&miss_query).unwrap();

    c.bench_function("cache_get_hit", |b| {
        b.iter(|| cache.get(black_box(&hit), black_box(&hit_query)))
    });

    c.bench_function("cache_get_miss", |b| {
        b.iter(|| cache.get(black_box(&miss), black_box(&miss_query)))
    });
}

fn bench_put_at_capacity(c: &mut Criterion) {
    let cache = QueryCache::with_capacity(1000);
    let entries: Vec<(Fingerprint, Message)> = (0..2000u16)
        .map(|i| {
            let query = create_query(i, &format!("host{i}.example.com."));
            (Fingerprint::of(&query).unwrap(), create_response(&query))
        })
        .collect();

    let mut group = c.benchmark_group("throughput");
    group.throughput(Throughput::Elements(1));

    group.bench_function("cache_put_evicting", |b| {
        let mut i = 0;
        b.iter(|| {
            let (fingerprint, response) = &entries[i % entries.len()];
            cache.put(fingerprint.clone(), response, Duration::from_secs(300));
            i += 1;
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_fingerprint,
    bench_cache_ttl,
    bench_get,
    bench_put_at_capacity,
);

criterion_main!(benches);
